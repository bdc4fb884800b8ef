//! Conformance checking for jsonx template specifications.
//!
//! A compact draft-07-style JSON Schema validator plus the bundled schema
//! raw specifications are checked against before compilation begins.

pub mod error;
mod spec_schema;
pub mod validator;

pub use error::{SchemaError, Violation};
pub use spec_schema::template_spec_schema;
pub use validator::{Validator, validate};
