//! Defines the Abstract Syntax Tree (AST) for expressions.
use jsonx_selector::Selector;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// The top-level representation of a parsed expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Expression {
    /// A literal string, number, boolean or null.
    Literal(Value),
    /// A selector, resolved against the current node.
    Selector(Selector),
    /// A bare name, resolved against the function table at evaluation time.
    Identifier(String),
    /// A call to a registered function.
    Call { name: String, args: Vec<Expression> },
    /// `a | f | g(x)`: each later step receives the running value first.
    Pipe(Vec<Expression>),
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Value::String(s)) => {
                write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
            }
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Selector(selector) => write!(f, "{}", selector),
            Expression::Identifier(name) => f.write_str(name),
            Expression::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expression::Pipe(steps) => {
                for (i, step) in steps.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", step)?;
                }
                Ok(())
            }
        }
    }
}
