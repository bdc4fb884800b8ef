//! Defines the token sequence produced by the selector parser.
use serde::{Serialize, Serializer};
use std::fmt;

/// A single step in a selector path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorToken {
    /// An object key (e.g., `.name`).
    Property(String),
    /// An array position (e.g., `[0]`).
    Index(usize),
    /// `[*]`: asserts the current value is an array and passes it through.
    Wildcard,
}

impl fmt::Display for SelectorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorToken::Property(key) => write!(f, ".{}", key),
            SelectorToken::Index(i) => write!(f, "[{}]", i),
            SelectorToken::Wildcard => f.write_str("[*]"),
        }
    }
}

/// A parsed, immutable selector path.
///
/// The source text is kept alongside the tokens so failures and the compiled
/// form can refer back to what the template author wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub(crate) source: String,
    pub(crate) tokens: Vec<SelectorToken>,
}

impl Selector {
    /// The `$` selector, which returns its input unchanged.
    pub fn identity() -> Self {
        Self {
            source: "$".to_string(),
            tokens: Vec::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[SelectorToken] {
        &self.tokens
    }

    pub fn is_identity(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Renders the path walked up to (but excluding) the token at `upto`.
    pub(crate) fn prefix(&self, upto: usize) -> String {
        let mut out = String::from("$");
        for token in &self.tokens[..upto.min(self.tokens.len())] {
            out.push_str(&token.to_string());
        }
        out
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}
