//! Implements the "Execution" phase.
//! It walks a compiled output tree and produces the result value.

use crate::compiler::{CompiledSpec, OutputNode};
use crate::error::TransformError;
use jsonx_expr::{BoxFuture, Frame, RuntimeContext};
use jsonx_selector::Selector;
use serde_json::{Map, Value};
use std::{future, ptr};

/// Free stack required before one more node is polled in place.
const RED_ZONE: usize = 128 * 1024;
/// Size of each heap-allocated stack segment once the red zone is reached.
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Polls `fut` on a fresh heap segment whenever the current stack runs low,
/// so `apply` nesting is bounded by memory rather than by the thread stack.
fn on_growable_stack<'a, T: 'a>(mut fut: BoxFuture<'a, T>) -> BoxFuture<'a, T> {
    Box::pin(future::poll_fn(move |cx| {
        stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || fut.as_mut().poll(cx))
    }))
}

/// One `apply` dispatch on the path from the root to the node being evaluated.
struct Dispatch<'a> {
    template: &'a str,
    node: &'a Value,
    depth: usize,
    outer: Option<&'a Dispatch<'a>>,
}

impl Dispatch<'_> {
    fn depth(chain: Option<&Dispatch<'_>>) -> usize {
        chain.map_or(0, |d| d.depth)
    }

    /// Whether `template` is already being applied to this very node further
    /// up the path. Dispatch is driven by structure and selectors alone, so
    /// such a revisit would recurse forever.
    fn revisits(mut chain: Option<&Dispatch<'_>>, template: &str, node: &Value) -> bool {
        while let Some(d) = chain {
            if d.template == template && ptr::eq(d.node, node) {
                return true;
            }
            chain = d.outer;
        }
        false
    }
}

/// Evaluates one compiled specification under one runtime context.
///
/// The `apply` path travels down the recursion with each call, so concurrent
/// runs on a shared engine never see each other's nesting.
#[derive(Clone, Copy)]
pub struct Engine<'s> {
    spec: &'s CompiledSpec,
    ctx: &'s RuntimeContext,
    max_depth: Option<usize>,
}

impl<'s> Engine<'s> {
    pub fn new(spec: &'s CompiledSpec, ctx: &'s RuntimeContext) -> Self {
        Self {
            spec,
            ctx,
            max_depth: None,
        }
    }

    /// Caps the `apply` nesting depth. `None` (the default) means no cap.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Evaluates the specification's `root` against `input`.
    /// An absent result materializes as `null`.
    pub async fn run(&self, input: &Value) -> Result<Value, TransformError> {
        let out = self.evaluate(&self.spec.root, Frame::root(input)).await?;
        Ok(out.unwrap_or(Value::Null))
    }

    /// Applies the named template to the whole input instead of `root`.
    /// An unknown name fails in every mode since nothing can be produced.
    pub async fn run_template(&self, name: &str, input: &Value) -> Result<Value, TransformError> {
        let template = self
            .spec
            .template(name)
            .ok_or_else(|| TransformError::UnknownTemplate(name.to_string()))?;
        let out = self.evaluate(&template.output, Frame::root(input)).await?;
        Ok(out.unwrap_or(Value::Null))
    }

    /// Evaluates one node outside any `apply`. `Ok(None)` is the absent value.
    pub fn evaluate<'a>(
        &'a self,
        node: &'a OutputNode,
        frame: Frame<'a>,
    ) -> BoxFuture<'a, Result<Option<Value>, TransformError>> {
        self.eval(node, frame, None)
    }

    /// `chain` is the innermost `apply` dispatch enclosing `node`.
    fn eval<'a>(
        &'a self,
        node: &'a OutputNode,
        frame: Frame<'a>,
        chain: Option<&'a Dispatch<'a>>,
    ) -> BoxFuture<'a, Result<Option<Value>, TransformError>> {
        on_growable_stack(Box::pin(async move {
            match node {
                OutputNode::Literal { value } => Ok(Some(value.clone())),
                OutputNode::Selector { selector } => {
                    Ok(self.ctx.select(selector, frame.current)?.cloned())
                }
                OutputNode::Expr { ast, .. } => Ok(self.ctx.evaluate(ast, frame).await?),
                OutputNode::Apply { template, from } => {
                    self.apply(template, from.as_ref(), frame, chain).await
                }
                OutputNode::Object { entries } => {
                    let mut out = Map::with_capacity(entries.len());
                    for (key, child) in entries {
                        if let Some(value) = self.eval(child, frame, chain).await? {
                            out.insert(key.clone(), value);
                        }
                    }
                    Ok(Some(Value::Object(out)))
                }
                OutputNode::Array { items } => {
                    let mut out = Vec::with_capacity(items.len());
                    for child in items {
                        out.push(self.eval(child, frame, chain).await?.unwrap_or(Value::Null));
                    }
                    Ok(Some(Value::Array(out)))
                }
            }
        }))
    }

    async fn apply<'a>(
        &'a self,
        name: &'a str,
        from: Option<&'a Selector>,
        frame: Frame<'a>,
        outer: Option<&'a Dispatch<'a>>,
    ) -> Result<Option<Value>, TransformError> {
        let source = match from {
            Some(selector) => self.ctx.select(selector, frame.current)?,
            None => Some(frame.current),
        };
        let Some(template) = self.spec.template(name) else {
            return self
                .ctx
                .settle(Err(TransformError::UnknownTemplate(name.to_string())));
        };
        let depth = match self.enter(name, Dispatch::depth(outer)) {
            Ok(depth) => depth,
            Err(e) => return self.ctx.settle(Err(e)),
        };
        log::trace!("apply \"{}\" at depth {}", name, depth);

        match source {
            None | Some(Value::Null) => Ok(Some(Value::Array(Vec::new()))),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let value = self
                        .dispatch(name, &template.output, item, frame, depth, outer)
                        .await?;
                    out.push(value.unwrap_or(Value::Null));
                }
                Ok(Some(Value::Array(out)))
            }
            Some(single) => {
                self.dispatch(name, &template.output, single, frame, depth, outer)
                    .await
            }
        }
    }

    /// Evaluates one template output at `node`.
    async fn dispatch<'a>(
        &'a self,
        name: &'a str,
        output: &'a OutputNode,
        node: &'a Value,
        frame: Frame<'a>,
        depth: usize,
        outer: Option<&'a Dispatch<'a>>,
    ) -> Result<Option<Value>, TransformError> {
        if Dispatch::revisits(outer, name, node) {
            return self.ctx.settle(Err(TransformError::Cycle {
                template: name.to_string(),
                depth,
            }));
        }
        let here = Dispatch {
            template: name,
            node,
            depth,
            outer,
        };
        self.eval(output, frame.at(node), Some(&here)).await
    }

    /// The depth of a dispatch of `template` nested in `outer` enclosing ones.
    fn enter(&self, template: &str, outer: usize) -> Result<usize, TransformError> {
        let depth = outer + 1;
        match self.max_depth {
            Some(limit) if depth > limit => Err(TransformError::DepthExceeded {
                template: template.to_string(),
                depth,
                limit,
            }),
            _ => Ok(depth),
        }
    }
}

/// Evaluates `spec` against `input` with `ctx`.
pub async fn transform(
    input: &Value,
    spec: &CompiledSpec,
    ctx: &RuntimeContext,
) -> Result<Value, TransformError> {
    Engine::new(spec, ctx).run(input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use jsonx_expr::{ExprError, Mode};
    use jsonx_selector::SelectorError;
    use serde_json::json;

    fn ctx(mode: Mode) -> RuntimeContext {
        RuntimeContext::with_builtins(mode)
    }

    fn user_spec() -> CompiledSpec {
        compile(&json!({
            "templates": [{
                "name": "u",
                "output": { "id": "$.id", "full": { "expr": "concat($.first,' ',$.last)" } }
            }],
            "root": { "user": { "apply": "u", "from": "$.user" } }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_apply_over_single_object() {
        let input = json!({ "user": { "id": 1, "first": "Jo", "last": "Doe" } });
        let out = transform(&input, &user_spec(), &ctx(Mode::Strict)).await.unwrap();
        assert_eq!(out, json!({ "user": { "id": 1, "full": "Jo Doe" } }));
    }

    #[tokio::test]
    async fn test_null_source_yields_empty_sequence_in_both_modes() {
        let input = json!({ "user": null });
        for mode in [Mode::Strict, Mode::Permissive] {
            let out = transform(&input, &user_spec(), &ctx(mode)).await.unwrap();
            assert_eq!(out, json!({ "user": [] }), "mode {}", mode);
        }
    }

    #[tokio::test]
    async fn test_apply_over_sequence_keeps_order() {
        let spec = compile(&json!({
            "templates": [{ "name": "item", "output": { "n": "$.n" } }],
            "root": { "items": { "apply": "item", "from": "$.list" } }
        }))
        .unwrap();
        let input = json!({ "list": [{ "n": 3 }, { "n": 1 }, { "n": 2 }] });
        let out = transform(&input, &spec, &ctx(Mode::Strict)).await.unwrap();
        assert_eq!(out, json!({ "items": [{ "n": 3 }, { "n": 1 }, { "n": 2 }] }));

        let out = transform(&json!({ "list": [] }), &spec, &ctx(Mode::Strict)).await.unwrap();
        assert_eq!(out, json!({ "items": [] }));
    }

    #[tokio::test]
    async fn test_apply_without_from_uses_current_node() {
        let spec = compile(&json!({
            "templates": [{ "name": "wrap", "output": { "inner": "$.v" } }],
            "root": { "w": { "apply": "wrap" } }
        }))
        .unwrap();
        let out = transform(&json!({ "v": 7 }), &spec, &ctx(Mode::Strict)).await.unwrap();
        assert_eq!(out, json!({ "w": { "inner": 7 } }));
    }

    #[tokio::test]
    async fn test_unknown_template_is_mode_gated() {
        let spec = compile(&json!({
            "templates": [],
            "root": { "a": 1, "x": { "apply": "ghost" } }
        }))
        .unwrap();
        let input = json!({});
        let out = transform(&input, &spec, &ctx(Mode::Permissive)).await.unwrap();
        assert_eq!(out, json!({ "a": 1 }));
        let err = transform(&input, &spec, &ctx(Mode::Strict)).await.unwrap_err();
        assert_eq!(err, TransformError::UnknownTemplate("ghost".into()));
    }

    #[tokio::test]
    async fn test_permissive_failures_stay_local() {
        let spec = compile(&json!({
            "templates": [],
            "root": {
                "ok": "$.a",
                "missing": "$.nope",
                "bad": { "expr": "mystery($.a)" },
                "list": ["$.a", "$.nope"]
            }
        }))
        .unwrap();
        let input = json!({ "a": 1 });
        let out = transform(&input, &spec, &ctx(Mode::Permissive)).await.unwrap();
        assert_eq!(out, json!({ "ok": 1, "list": [1, null] }));

        let err = transform(&input, &spec, &ctx(Mode::Strict)).await.unwrap_err();
        assert!(matches!(err, TransformError::Selector(SelectorError::MissingKey { .. })));
    }

    #[tokio::test]
    async fn test_strict_expression_failure_names_the_function() {
        let spec = compile(&json!({ "templates": [], "root": { "v": { "expr": "mystery($.x)" } } })).unwrap();
        let err = transform(&json!({ "x": 1 }), &spec, &ctx(Mode::Strict)).await.unwrap_err();
        assert_eq!(err, TransformError::Expression(ExprError::UnknownFunction("mystery".into())));
    }

    #[tokio::test]
    async fn test_failing_from_is_empty_in_permissive_mode() {
        let spec = compile(&json!({
            "templates": [{ "name": "t", "output": "$" }],
            "root": { "r": { "apply": "t", "from": "$.a.b[5]" } }
        }))
        .unwrap();
        let input = json!({ "a": { "b": [1, 2] } });
        let out = transform(&input, &spec, &ctx(Mode::Permissive)).await.unwrap();
        assert_eq!(out, json!({ "r": [] }));
        let err = transform(&input, &spec, &ctx(Mode::Strict)).await.unwrap_err();
        assert!(matches!(err, TransformError::Selector(SelectorError::IndexOutOfBounds { .. })));
    }

    #[tokio::test]
    async fn test_root_is_never_rebound() {
        let spec = compile(&json!({
            "templates": [
                { "name": "outer", "output": { "inner": { "apply": "inner", "from": "$.child" } } },
                { "name": "inner", "output": {
                    "own": "$.name",
                    "top": { "expr": "root() | get('$.name')" }
                } }
            ],
            "root": { "apply": "outer", "from": "$.child" }
        }))
        .unwrap();
        let input = json!({ "name": "top", "child": { "child": { "name": "deep" } } });
        let out = transform(&input, &spec, &ctx(Mode::Strict)).await.unwrap();
        assert_eq!(out, json!({ "inner": { "own": "deep", "top": "top" } }));
    }

    fn loop_spec() -> CompiledSpec {
        compile(&json!({
            "templates": [{ "name": "loop", "output": { "next": { "apply": "loop", "from": "$.next" } } }],
            "root": { "apply": "loop" }
        }))
        .unwrap()
    }

    /// `{"next": {"next": ... null}}` nested `levels` deep.
    fn chain(levels: usize) -> Value {
        (0..levels).fold(Value::Null, |inner, _| json!({ "next": inner }))
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let spec = loop_spec();
        let input = chain(4);

        let context = ctx(Mode::Strict);
        let engine = Engine::new(&spec, &context).with_max_depth(Some(2));
        let err = engine.run(&input).await.unwrap_err();
        assert!(matches!(err, TransformError::DepthExceeded { depth: 3, limit: 2, .. }));

        let permissive = ctx(Mode::Permissive);
        let engine = Engine::new(&spec, &permissive).with_max_depth(Some(2));
        assert_eq!(engine.run(&input).await.unwrap(), json!({ "next": {} }));

        let engine = Engine::new(&spec, &context);
        let out = engine.run(&input).await.unwrap();
        assert_eq!(out, json!({ "next": { "next": { "next": { "next": [] } } } }));
    }

    #[tokio::test]
    async fn test_concurrent_runs_count_depth_separately() {
        let spec = compile(&json!({
            "templates": [{
                "name": "loop",
                "output": { "pause": { "expr": "pause()" }, "next": { "apply": "loop", "from": "$.next" } }
            }],
            "root": { "apply": "loop" }
        }))
        .unwrap();
        let mut context = ctx(Mode::Strict);
        context.register_async("pause", |_| async {
            tokio::task::yield_now().await;
            Ok(Value::Null)
        });
        let engine = Engine::new(&spec, &context).with_max_depth(Some(3));

        let (a, b) = (chain(2), chain(2));
        let (left, right) = tokio::join!(engine.run(&a), engine.run(&b));
        let expected = json!({ "pause": null, "next": { "pause": null, "next": [] } });
        assert_eq!(left.unwrap(), expected);
        assert_eq!(right.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_deep_recursion_does_not_exhaust_the_stack() {
        const LEVELS: usize = 1_000;
        let spec = loop_spec();
        let context = ctx(Mode::Strict);
        let out = Engine::new(&spec, &context).run(&chain(LEVELS)).await.unwrap();

        let mut levels = 0;
        let mut node = &out;
        while let Some(next) = node.get("next") {
            levels += 1;
            node = next;
        }
        assert_eq!(levels, LEVELS);
        assert_eq!(node, &json!([]));
    }

    #[tokio::test]
    async fn test_self_apply_on_same_node_is_a_cycle() {
        let spec = compile(&json!({
            "templates": [
                { "name": "self", "output": { "v": "$.v", "again": { "apply": "self" } } },
                { "name": "ping", "output": { "pong": { "apply": "pong" } } },
                { "name": "pong", "output": { "ping": { "apply": "ping" } } }
            ],
            "root": { "a": { "apply": "self" }, "b": { "apply": "ping", "from": "$.w" } }
        }))
        .unwrap();
        let input = json!({ "v": 1, "w": { "v": 2 } });

        let err = transform(&input, &spec, &ctx(Mode::Strict)).await.unwrap_err();
        assert_eq!(err, TransformError::Cycle { template: "self".into(), depth: 2 });

        let out = transform(&input, &spec, &ctx(Mode::Permissive)).await.unwrap();
        assert_eq!(out, json!({ "a": { "v": 1 }, "b": { "pong": {} } }));
    }

    #[tokio::test]
    async fn test_run_template_start() {
        let spec = user_spec();
        let context = ctx(Mode::Permissive);
        let engine = Engine::new(&spec, &context);
        let input = json!({ "id": 9, "first": "A", "last": "B" });
        assert_eq!(
            engine.run_template("u", &input).await.unwrap(),
            json!({ "id": 9, "full": "A B" })
        );
        assert_eq!(
            engine.run_template("nope", &input).await.unwrap_err(),
            TransformError::UnknownTemplate("nope".into())
        );
    }

    #[tokio::test]
    async fn test_absent_top_level_is_null() {
        let spec = compile(&json!({ "templates": [], "root": "$.missing" })).unwrap();
        let out = transform(&json!({}), &spec, &ctx(Mode::Permissive)).await.unwrap();
        assert_eq!(out, Value::Null);
    }
}
