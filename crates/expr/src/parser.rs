//! Parser for the expression language.
//!
//! ```text
//! Expr := Term ("|" Term)*
//! Term := Call | Selector | StringLit | NumberLit | BoolLit | NullLit | Identifier
//! Call := Name "(" (Expr ("," Expr)*)? ")"
//! ```
//!
//! Splitting on `|` and `,` goes through one scanner that tracks quote state
//! and parenthesis depth, so delimiters inside string literals or nested calls
//! never split early. Terms are then recognized with `nom`.
use crate::ast::Expression;
use crate::error::ExprError;
use jsonx_selector::parse_selector;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::alpha1,
    combinator::{all_consuming, recognize},
    number::complete::recognize_float,
    sequence::pair,
};
use serde_json::{Number, Value};

// --- Main Public Parser ---

pub fn parse_expression(input: &str) -> Result<Expression, ExprError> {
    expression(input.trim()).map_err(|message| ExprError::Parse(input.to_string(), message))
}

fn expression(text: &str) -> Result<Expression, String> {
    if text.is_empty() {
        return Err("empty expression".to_string());
    }
    let parts = split_top_level(text, '|')?;
    if parts.len() == 1 {
        return term(parts[0]);
    }
    let steps = parts
        .into_iter()
        .map(|part| {
            if part.is_empty() {
                Err("empty pipe step".to_string())
            } else {
                term(part)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Expression::Pipe(steps))
}

// --- Scanner ---

/// Splits `text` on every `delim` found outside quotes and parentheses.
/// Returned parts are trimmed.
fn split_top_level(text: &str, delim: char) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unbalanced ')' at position {}", i))?;
            }
            c if c == delim && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err("unterminated string literal".to_string());
    }
    if depth > 0 {
        return Err("missing ')'".to_string());
    }
    parts.push(text[start..].trim());
    Ok(parts)
}

/// Byte offset of the `)` closing the `(` at `open`, if any.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

// --- Terms ---

fn term(text: &str) -> Result<Expression, String> {
    if text.is_empty() {
        return Err("empty term".to_string());
    }
    if text.starts_with('\'') || text.starts_with('"') {
        return string_literal(text).map(|s| Expression::Literal(Value::String(s)));
    }
    match text {
        "true" => return Ok(Expression::Literal(Value::Bool(true))),
        "false" => return Ok(Expression::Literal(Value::Bool(false))),
        "null" => return Ok(Expression::Literal(Value::Null)),
        _ => {}
    }
    if text.starts_with('$') {
        return parse_selector(text)
            .map(Expression::Selector)
            .map_err(|e| e.to_string());
    }
    if let Some(number) = number_literal(text)? {
        return Ok(Expression::Literal(Value::Number(number)));
    }
    if let Ok((rest, name)) = identifier(text) {
        if rest.is_empty() {
            return Ok(Expression::Identifier(name.to_string()));
        }
        if rest.trim_start().starts_with('(') {
            return call(text, name);
        }
    }
    Err(format!("unrecognized term '{}'", text))
}

fn call(text: &str, name: &str) -> Result<Expression, String> {
    let open = text[name.len()..]
        .find('(')
        .map(|offset| name.len() + offset)
        .ok_or_else(|| format!("expected '(' after '{}'", name))?;
    let close =
        matching_paren(text, open).ok_or_else(|| format!("missing ')' in call to '{}'", name))?;
    if close != text.len() - 1 {
        return Err(format!(
            "unexpected text '{}' after call to '{}'",
            &text[close + 1..],
            name
        ));
    }

    let inner = text[open + 1..close].trim();
    let args = if inner.is_empty() {
        Vec::new()
    } else {
        split_top_level(inner, ',')?
            .into_iter()
            .map(|arg| {
                if arg.is_empty() {
                    Err(format!("empty argument in call to '{}'", name))
                } else {
                    expression(arg)
                }
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(Expression::Call {
        name: name.to_string(),
        args,
    })
}

/// Reads a quoted literal that must span the whole of `text`.
fn string_literal(text: &str) -> Result<String, String> {
    let mut chars = text.char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err("empty string literal".to_string());
    };
    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            let rest = &text[i + c.len_utf8()..];
            if !rest.is_empty() {
                return Err(format!("unexpected text '{}' after string literal", rest));
            }
            return Ok(out);
        } else {
            out.push(c);
        }
    }
    Err("unterminated string literal".to_string())
}

fn number_literal(text: &str) -> Result<Option<Number>, String> {
    let parsed: IResult<&str, &str> = all_consuming(recognize_float).parse(text);
    let Ok((_, digits)) = parsed else {
        return Ok(None);
    };
    if !digits.contains(['.', 'e', 'E']) {
        if let Ok(i) = digits.parse::<i64>() {
            return Ok(Some(Number::from(i)));
        }
    }
    let float: f64 = digits
        .parse()
        .map_err(|e| format!("invalid number '{}': {}", digits, e))?;
    Number::from_f64(float)
        .map(Some)
        .ok_or_else(|| format!("number '{}' is out of range", digits))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))
    .parse(input)
}
