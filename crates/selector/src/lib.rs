//! The selector path language used by jsonx templates.
//!
//! A selector such as `$.orders[0].items[*]` is parsed once into a sequence of
//! [`SelectorToken`]s and can then be evaluated against any number of JSON
//! values. Selectors compose strictly left to right; there are no filters,
//! unions or recursive descent.

pub mod ast;
pub mod engine;
pub mod error;
mod parser;

// --- Public API ---
pub use ast::{Selector, SelectorToken};
pub use engine::value_kind;
pub use error::SelectorError;
pub use parser::{is_name_char, parse_selector};

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_selector(s)
    }
}
