use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectorError {
    #[error("Invalid selector '{selector}' at position {position}: {message}")]
    Parse {
        selector: String,
        position: usize,
        message: String,
    },

    #[error("Selector '{selector}' failed at '{at}': no property '{key}'")]
    MissingKey {
        selector: String,
        at: String,
        key: String,
    },

    #[error("Selector '{selector}' failed at '{at}': index {index} out of bounds (length {len})")]
    IndexOutOfBounds {
        selector: String,
        at: String,
        index: usize,
        len: usize,
    },

    #[error("Selector '{selector}' failed at '{at}': '{token}' expects {expected}, found {found}")]
    TypeMismatch {
        selector: String,
        at: String,
        token: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl SelectorError {
    /// True for failures raised while parsing, as opposed to while walking a value.
    pub fn is_parse(&self) -> bool {
        matches!(self, SelectorError::Parse { .. })
    }
}
