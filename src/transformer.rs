//! The transform entry point and the reusable [`Transformer`] facade.
use crate::config::TransformerConfig;
use jsonx_expr::{Degradations, FunctionRegistry, FunctionResult, Mode, RuntimeContext};
use jsonx_template::{CompiledSpec, Engine, TransformError};
use serde_json::Value;
use std::future::Future;

/// Per-call overrides of a transformer's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    pub mode: Option<Mode>,
    /// Apply this template to the whole input instead of evaluating `root`.
    pub start: Option<String>,
}

impl TransformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_start(mut self, template: impl Into<String>) -> Self {
        self.start = Some(template.into());
        self
    }
}

/// A transform result together with the failures permissive mode dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformReport {
    pub output: Value,
    /// One message per failure replaced with an absent value, in evaluation order.
    pub degradations: Vec<String>,
}

/// Runs compiled specifications with a function table of its own.
///
/// Registrations affect only this instance. Every transform works on a
/// snapshot of the table taken when it starts, so a `Transformer` can be
/// shared (`&self`) across concurrent transforms.
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    functions: FunctionRegistry,
    config: TransformerConfig,
}

impl Transformer {
    /// A transformer with the builtin functions and default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> TransformerBuilder {
        TransformerBuilder::new()
    }

    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Registers a synchronous function, shadowing any same-named builtin.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> FunctionResult + Send + Sync + 'static,
    {
        self.functions.register_fn(name, f);
    }

    /// Registers a function whose result is awaited before the enclosing node completes.
    pub fn register_async<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FunctionResult> + Send + 'static,
    {
        self.functions.register_async(name, f);
    }

    /// Removes a function (builtin or registered). Returns whether it existed.
    pub fn unregister_fn(&mut self, name: &str) -> bool {
        self.functions.unregister(name)
    }

    pub async fn transform(&self, input: &Value, spec: &CompiledSpec) -> Result<Value, TransformError> {
        self.transform_with(input, spec, TransformOptions::default()).await
    }

    pub async fn transform_with(
        &self,
        input: &Value,
        spec: &CompiledSpec,
        options: TransformOptions,
    ) -> Result<Value, TransformError> {
        let mode = options.mode.unwrap_or(self.config.mode);
        let ctx = RuntimeContext::new(mode, self.functions.clone());
        self.execute(input, spec, &ctx, options.start.as_deref()).await
    }

    /// Like [`Transformer::transform_with`], also reporting every failure that
    /// permissive mode replaced with an absent value.
    pub async fn transform_report(
        &self,
        input: &Value,
        spec: &CompiledSpec,
        options: TransformOptions,
    ) -> Result<TransformReport, TransformError> {
        let mode = options.mode.unwrap_or(self.config.mode);
        let sink = Degradations::new();
        let ctx = RuntimeContext::new(mode, self.functions.clone()).with_degradations(sink.clone());
        let output = self.execute(input, spec, &ctx, options.start.as_deref()).await?;
        Ok(TransformReport {
            output,
            degradations: sink.take(),
        })
    }

    async fn execute(
        &self,
        input: &Value,
        spec: &CompiledSpec,
        ctx: &RuntimeContext,
        start: Option<&str>,
    ) -> Result<Value, TransformError> {
        let engine = Engine::new(spec, ctx).with_max_depth(self.config.max_depth);
        log::debug!(
            "transform: mode={}, start={:?}, templates={}",
            ctx.mode(),
            start,
            spec.meta.template_count
        );
        match start {
            Some(name) => engine.run_template(name, input).await,
            None => engine.run(input).await,
        }
    }
}

/// A builder for creating a [`Transformer`].
#[derive(Debug, Default)]
pub struct TransformerBuilder {
    functions: FunctionRegistry,
    config: TransformerConfig,
}

impl TransformerBuilder {
    /// Starts from the builtin functions and default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: TransformerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = Some(max_depth);
        self
    }

    /// Starts from `functions` instead of the builtins.
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> FunctionResult + Send + Sync + 'static,
    {
        self.functions.register_fn(name, f);
        self
    }

    pub fn with_async_function<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FunctionResult> + Send + 'static,
    {
        self.functions.register_async(name, f);
        self
    }

    pub fn build(self) -> Transformer {
        Transformer {
            functions: self.functions,
            config: self.config,
        }
    }
}

/// Transforms `input` with a fresh builtin-only context.
pub async fn transform(
    input: &Value,
    spec: &CompiledSpec,
    options: TransformOptions,
) -> Result<Value, TransformError> {
    Transformer::new().transform_with(input, spec, options).await
}
