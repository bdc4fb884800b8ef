use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// One failed constraint, located by a `$`-rooted path such as `$.templates[0].name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Document does not conform to schema ({} violation(s)): {}", .0.len(), render(.0))]
    Violations(Vec<Violation>),
}

impl SchemaError {
    pub fn violations(&self) -> &[Violation] {
        match self {
            SchemaError::Violations(list) => list,
        }
    }
}

fn render(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
