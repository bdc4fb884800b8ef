//! The raw template specification as it is read from JSON. This is the
//! **input** representation; see `compiler` for the executable form.
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RawSpec {
    pub templates: Vec<RawTemplate>,
    pub root: Value,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RawTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Selector consulted only by the `MatchPicker`.
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_selector: Option<String>,
    pub output: Value,
}

impl RawTemplate {
    /// `templates[1] "user"`, or `templates[1]` when unnamed.
    pub(crate) fn location(&self, index: usize) -> String {
        match &self.name {
            Some(name) => format!("templates[{}] \"{}\"", index, name),
            None => format!("templates[{}]", index),
        }
    }
}
