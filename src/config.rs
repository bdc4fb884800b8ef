use crate::error::JsonxError;
use jsonx_expr::Mode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Instance-wide defaults for a [`crate::Transformer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformerConfig {
    pub mode: Mode,
    /// Maximum `apply` nesting depth; `None` imposes no limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl TransformerConfig {
    /// Loads a configuration from a JSON file such as
    /// `{ "mode": "strict", "maxDepth": 64 }`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, JsonxError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            JsonxError::Config(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, JsonxError> {
        serde_json::from_str(text).map_err(|e| JsonxError::Config(e.to_string()))
    }
}
