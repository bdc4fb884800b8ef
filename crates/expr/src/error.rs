use jsonx_selector::SelectorError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Expression parse error in '{0}': {1}")]
    Parse(String, String),

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Function '{function}' error: {message}")]
    Function { function: String, message: String },

    #[error("Pipe step '{0}' is not a function name or call")]
    InvalidPipeStep(String),
}
