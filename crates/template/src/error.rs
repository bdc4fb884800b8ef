use jsonx_expr::ExprError;
use jsonx_schema::SchemaError;
use jsonx_selector::SelectorError;
use thiserror::Error;

/// Failures that stop a specification from compiling. Always fatal.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Template specification failed validation: {0}")]
    Conformance(#[from] SchemaError),

    #[error("Invalid selector at {location}: {source}")]
    Selector {
        location: String,
        #[source]
        source: SelectorError,
    },

    #[error("Invalid expression at {location}: {source}")]
    Expression {
        location: String,
        #[source]
        source: ExprError,
    },

    #[error("Duplicate template name \"{name}\" at {location} (first defined at {first})")]
    DuplicateTemplate {
        name: String,
        location: String,
        first: String,
    },

    #[error("Invalid node at {location}: {message}")]
    Shape { location: String, message: String },

    #[error("Template specification is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures raised while walking a compiled specification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Expression(#[from] ExprError),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Applying template \"{template}\" would reach depth {depth}, above the limit of {limit}")]
    DepthExceeded {
        template: String,
        depth: usize,
        limit: usize,
    },

    #[error("Template \"{template}\" is applied to a node it is already applying to at depth {depth}")]
    Cycle { template: String, depth: usize },
}
