//! The jsonx expression language.
//!
//! Expressions are single call or pipe chains such as
//! `concat($.first, ' ', $.last) | uppercase`, evaluated against a function
//! table held by a [`RuntimeContext`]. Selectors inside an expression resolve
//! against the current node of the enclosing template.

pub mod ast;
mod builtins;
pub mod error;
pub mod functions;
mod parser;
pub mod runtime;
pub mod value;

// --- Public API ---
pub use ast::Expression;
pub use builtins::{number, to_number, to_text, truthy};
pub use error::ExprError;
pub use functions::FunctionRegistry;
pub use parser::parse_expression;
pub use runtime::{Degradations, Frame, Mode, RuntimeContext};
pub use value::{
    Args, BoxFuture, Datum, FunctionError, FunctionRef, FunctionResult, NativeFn, Returned, native,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_parse_and_eval_simple_call() {
        let expr = parse_expression("uppercase($.name)").unwrap();
        let data = json!({ "name": "acme" });
        let ctx = RuntimeContext::default();
        let result = ctx.evaluate(&expr, Frame::root(&data)).await.unwrap();
        assert_eq!(result, Some(json!("ACME")));
    }

    #[tokio::test]
    async fn test_literal_evaluates_to_itself() {
        let ctx = RuntimeContext::default();
        let data = json!({});
        for (source, expected) in [
            ("'hi'", json!("hi")),
            ("42", json!(42)),
            ("true", json!(true)),
            ("null", json!(null)),
        ] {
            let out = ctx.evaluate_str(source, Frame::root(&data)).await.unwrap();
            assert_eq!(out, Some(expected), "source {}", source);
        }
    }

    #[tokio::test]
    async fn test_math_chain() {
        let ctx = RuntimeContext::default();
        let data = json!({ "a": 10, "b": 3 });
        let out = ctx
            .evaluate_str("round(divide($.a, $.b), 2)", Frame::root(&data))
            .await
            .unwrap();
        assert_eq!(out, Some(json!(3.33)));
    }

    #[tokio::test]
    async fn test_parse_error_is_reported_in_permissive_mode() {
        let ctx = RuntimeContext::with_builtins(Mode::Permissive);
        let data = json!({});
        let err = ctx.evaluate_str("concat(", Frame::root(&data)).await.unwrap_err();
        assert!(matches!(err, ExprError::Parse(..)));
    }

    #[test]
    fn test_expression_serializes_tagged() {
        let expr = parse_expression("trim($.a)").unwrap();
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["type"], json!("call"));
        assert_eq!(json["value"]["name"], json!("trim"));
        assert_eq!(json["value"]["args"][0]["value"], json!("$.a"));
    }
}
