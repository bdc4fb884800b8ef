//! Walks a parsed selector against a JSON value.
use crate::ast::{Selector, SelectorToken};
use crate::error::SelectorError;
use serde_json::Value;

/// Short type name of a JSON value, used in diagnostics.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Selector {
    /// Resolves this selector against `value`, borrowing the selected sub-value.
    ///
    /// A property step requires an object that has the key (an explicit `null`
    /// counts as present), an index step requires an array with that position
    /// populated, and a wildcard step requires an array which it passes through
    /// unchanged. The traversed data is never modified.
    pub fn evaluate<'v>(&self, value: &'v Value) -> Result<&'v Value, SelectorError> {
        let mut current = value;
        for (position, token) in self.tokens.iter().enumerate() {
            current = match (token, current) {
                (SelectorToken::Property(key), Value::Object(map)) => {
                    map.get(key).ok_or_else(|| SelectorError::MissingKey {
                        selector: self.source.clone(),
                        at: self.prefix(position),
                        key: key.clone(),
                    })?
                }
                (SelectorToken::Index(index), Value::Array(items)) => {
                    items.get(*index).ok_or_else(|| SelectorError::IndexOutOfBounds {
                        selector: self.source.clone(),
                        at: self.prefix(position),
                        index: *index,
                        len: items.len(),
                    })?
                }
                (SelectorToken::Wildcard, Value::Array(_)) => current,
                (token, other) => {
                    return Err(SelectorError::TypeMismatch {
                        selector: self.source.clone(),
                        at: self.prefix(position),
                        token: token.to_string(),
                        expected: match token {
                            SelectorToken::Property(_) => "an object",
                            SelectorToken::Index(_) | SelectorToken::Wildcard => "an array",
                        },
                        found: value_kind(other),
                    });
                }
            };
        }
        Ok(current)
    }
}
