use jsonx_template::{CompileError, TransformError};
use thiserror::Error;

/// Any failure along the load → compile → transform path.
#[derive(Error, Debug)]
pub enum JsonxError {
    #[error("Compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
