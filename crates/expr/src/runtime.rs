//! The runtime context: active failure mode plus function table, and the
//! evaluator shared by selectors and expressions.
use crate::ast::Expression;
use crate::error::ExprError;
use crate::functions::FunctionRegistry;
use crate::parser::parse_expression;
use crate::value::{Args, BoxFuture, Datum, FunctionResult};
use jsonx_selector::{Selector, SelectorError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

/// Whole-transform failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Any failure aborts the transform.
    Strict,
    /// Failures degrade the smallest enclosing node to an absent value.
    #[default]
    Permissive,
}

impl Mode {
    pub fn is_strict(self) -> bool {
        self == Mode::Strict
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Mode::Strict),
            "permissive" => Ok(Mode::Permissive),
            other => Err(format!(
                "unknown mode '{}', expected 'strict' or 'permissive'",
                other
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Strict => "strict",
            Mode::Permissive => "permissive",
        })
    }
}

/// Where an expression is evaluated: the current node selectors resolve
/// against, and the document root absolute lookups see.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub current: &'a Value,
    pub root: &'a Value,
}

impl<'a> Frame<'a> {
    pub fn new(current: &'a Value, root: &'a Value) -> Self {
        Self { current, root }
    }

    /// A frame rooted at `document` with `document` as the current node.
    pub fn root(document: &'a Value) -> Self {
        Self::new(document, document)
    }

    /// Rebinds the current node, keeping the root.
    pub fn at(self, current: &'a Value) -> Self {
        Self {
            current,
            root: self.root,
        }
    }
}

/// Records the failures permissive mode replaced with absent values.
///
/// Clones share one log, so a handle kept by the caller sees what a
/// context holding another clone recorded.
#[derive(Debug, Clone, Default)]
pub struct Degradations {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Degradations {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, message: String) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    /// Messages recorded so far, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drains the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mode plus function table for one transform or one transformer instance.
///
/// Must not be mutated while an evaluation borrowing it is in flight; clones
/// are independent apart from a shared [`Degradations`] log.
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    mode: Mode,
    functions: FunctionRegistry,
    degradations: Option<Degradations>,
}

impl RuntimeContext {
    pub fn new(mode: Mode, functions: FunctionRegistry) -> Self {
        Self {
            mode,
            functions,
            degradations: None,
        }
    }

    /// Records every permissive-mode degradation into `sink`.
    pub fn with_degradations(mut self, sink: Degradations) -> Self {
        self.degradations = Some(sink);
        self
    }

    pub fn degradations(&self) -> Option<&Degradations> {
        self.degradations.as_ref()
    }

    /// A context seeded with the builtin functions.
    pub fn with_builtins(mode: Mode) -> Self {
        Self::new(mode, FunctionRegistry::default())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> FunctionResult + Send + Sync + 'static,
    {
        self.functions.register_fn(name, f);
    }

    pub fn register_async<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FunctionResult> + Send + 'static,
    {
        self.functions.register_async(name, f);
    }

    pub fn unregister_fn(&mut self, name: &str) -> bool {
        self.functions.unregister(name)
    }

    /// Applies the mode policy to a fallible result: strict passes it through,
    /// permissive turns an error into the absent value.
    pub fn settle<T, E: fmt::Display>(&self, result: Result<Option<T>, E>) -> Result<Option<T>, E> {
        match result {
            Err(e) if !self.mode.is_strict() => {
                log::debug!("permissive mode: {} (using absent value)", e);
                if let Some(sink) = &self.degradations {
                    sink.record(e.to_string());
                }
                Ok(None)
            }
            other => other,
        }
    }

    /// Evaluates a selector against `current` under the active mode.
    pub fn select<'v>(
        &self,
        selector: &Selector,
        current: &'v Value,
    ) -> Result<Option<&'v Value>, SelectorError> {
        let result = selector.evaluate(current).map(Some);
        log::trace!("select {} -> {:?}", selector, result);
        self.settle(result)
    }

    /// Evaluates an expression in `frame` under the active mode.
    /// `Ok(None)` is the absent value.
    pub async fn evaluate(
        &self,
        expr: &Expression,
        frame: Frame<'_>,
    ) -> Result<Option<Value>, ExprError> {
        let result = self.eval_datum(expr, frame).await.map(Datum::into_value);
        log::trace!("expr {} -> {:?}", expr, result);
        result
    }

    /// Parses and evaluates `source`. Syntax errors are returned in both modes.
    pub async fn evaluate_str(
        &self,
        source: &str,
        frame: Frame<'_>,
    ) -> Result<Option<Value>, ExprError> {
        let expr = parse_expression(source)?;
        self.evaluate(&expr, frame).await
    }

    /// Evaluates one node, settling its failure here.
    async fn eval_datum<'a>(
        &'a self,
        expr: &'a Expression,
        frame: Frame<'a>,
    ) -> Result<Datum, ExprError> {
        let result = self.eval_raw(expr, frame).await;
        self.settle(result.map(|datum| match datum {
            Datum::Absent => None,
            other => Some(other),
        }))
        .map(|datum| datum.unwrap_or(Datum::Absent))
    }

    /// Evaluates one node, propagating its own failure unchanged.
    fn eval_raw<'a>(
        &'a self,
        expr: &'a Expression,
        frame: Frame<'a>,
    ) -> BoxFuture<'a, Result<Datum, ExprError>> {
        Box::pin(async move {
            match expr {
                Expression::Literal(value) => Ok(Datum::Json(value.clone())),
                Expression::Selector(selector) => Ok(Datum::Json(
                    selector.evaluate(frame.current)?.clone(),
                )),
                Expression::Identifier(name) => Ok(self
                    .functions
                    .get(name)
                    .map(Datum::Function)
                    .unwrap_or(Datum::Absent)),
                Expression::Call { name, args } => self.call(name, args, None, frame).await,
                Expression::Pipe(steps) => self.pipe(steps, frame).await,
            }
        })
    }

    /// Invokes `name`. A piped value, when present, becomes the first argument.
    async fn call<'a>(
        &'a self,
        name: &'a str,
        args: &'a [Expression],
        piped: Option<Datum>,
        frame: Frame<'a>,
    ) -> Result<Datum, ExprError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| ExprError::UnknownFunction(name.to_string()))?;

        let mut items = Vec::with_capacity(args.len() + 1);
        items.extend(piped);
        for arg in args {
            items.push(self.eval_datum(arg, frame).await?);
        }

        let value = function
            .call(Args::new(items, frame.root))
            .resolve()
            .await
            .map_err(|e| ExprError::Function {
                function: name.to_string(),
                message: e.message,
            })?;
        Ok(Datum::Json(value))
    }

    /// A failing step fails the whole pipe; the caller settles it once.
    async fn pipe<'a>(
        &'a self,
        steps: &'a [Expression],
        frame: Frame<'a>,
    ) -> Result<Datum, ExprError> {
        let Some((first, rest)) = steps.split_first() else {
            return Ok(Datum::Absent);
        };
        let mut running = self.eval_raw(first, frame).await?;
        for step in rest {
            running = match step {
                Expression::Identifier(name) => {
                    self.call(name, &[], Some(running), frame).await?
                }
                Expression::Call { name, args } => {
                    self.call(name, args, Some(running), frame).await?
                }
                other => return Err(ExprError::InvalidPipeStep(other.to_string())),
            };
        }
        Ok(running)
    }
}
