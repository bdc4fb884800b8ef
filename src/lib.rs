//! jsonx maps one JSON document to another using a declarative, XSLT-like
//! template specification.
//!
//! ```no_run
//! # async fn demo() -> Result<(), jsonx::JsonxError> {
//! use serde_json::json;
//!
//! let spec = jsonx::compile(&json!({
//!     "templates": [{ "name": "user", "output": { "name": { "expr": "uppercase($.name)" } } }],
//!     "root": { "users": { "apply": "user", "from": "$.users" } }
//! }))?;
//! let out = jsonx::transform(
//!     &json!({ "users": [{ "name": "ada" }] }),
//!     &spec,
//!     jsonx::TransformOptions::default(),
//! )
//! .await?;
//! assert_eq!(out, json!({ "users": [{ "name": "ADA" }] }));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod transformer;

pub use config::TransformerConfig;
pub use error::JsonxError;
pub use transformer::{TransformOptions, TransformReport, Transformer, TransformerBuilder, transform};

pub use jsonx_expr::{
    Degradations, Expression, FunctionError, FunctionRegistry, FunctionResult, Mode, RuntimeContext,
    parse_expression,
};
pub use jsonx_schema::{SchemaError, Violation, template_spec_schema};
pub use jsonx_selector::{Selector, SelectorError, parse_selector};
pub use jsonx_template::{
    CompileError, CompiledSpec, Compiler, MatchPicker, OutputNode, Template, TransformError,
    compile, compile_str,
};
