//! A `nom`-based parser for the selector language.
//!
//! ```text
//! Selector := "$" Step*
//! Step     := "." PropName | "[" (Digits | "*") "]"
//! ```
use crate::ast::{Selector, SelectorToken};
use crate::error::SelectorError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1},
    combinator::{map, map_res, value},
    sequence::{delimited, preceded},
};

/// Characters allowed in a property name.
pub fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

// --- Main Public Parser ---

pub fn parse_selector(input: &str) -> Result<Selector, SelectorError> {
    let source = input.trim();
    let Some(mut rest) = source.strip_prefix('$') else {
        return Err(parse_error(source, 0, "selector must start with '$'"));
    };

    let mut tokens = Vec::new();
    while !rest.is_empty() {
        match step(rest) {
            Ok((remaining, token)) => {
                tokens.push(token);
                rest = remaining;
            }
            Err(_) => {
                let position = source.len() - rest.len();
                return Err(parse_error(source, position, &describe_failure(rest)));
            }
        }
    }

    Ok(Selector {
        source: source.to_string(),
        tokens,
    })
}

// --- Combinators ---

fn step(input: &str) -> IResult<&str, SelectorToken> {
    alt((property, wildcard, index)).parse(input)
}

fn property(input: &str) -> IResult<&str, SelectorToken> {
    map(preceded(char('.'), take_while1(is_name_char)), |name: &str| {
        SelectorToken::Property(name.to_string())
    })
    .parse(input)
}

fn wildcard(input: &str) -> IResult<&str, SelectorToken> {
    value(SelectorToken::Wildcard, tag("[*]")).parse(input)
}

fn index(input: &str) -> IResult<&str, SelectorToken> {
    map_res(delimited(char('['), digit1, char(']')), |digits: &str| {
        digits.parse::<usize>().map(SelectorToken::Index)
    })
    .parse(input)
}

// --- Diagnostics ---

/// Explains why no step could be parsed at the start of `rest`.
fn describe_failure(rest: &str) -> String {
    let mut chars = rest.chars();
    match chars.next() {
        Some('.') => match chars.next() {
            None => "empty property name at end of selector".to_string(),
            Some(c) => format!("empty property name before '{}'", c),
        },
        Some('[') => match rest.find(']') {
            None => "unterminated '['".to_string(),
            Some(end) if end == 1 => "empty array index".to_string(),
            Some(end) => format!(
                "unsupported bracket content [{}]; expected digits or '*'",
                &rest[1..end]
            ),
        },
        Some(c) => format!("unexpected character '{}'", c),
        None => "unexpected end of selector".to_string(),
    }
}

fn parse_error(selector: &str, position: usize, message: &str) -> SelectorError {
    SelectorError::Parse {
        selector: selector.to_string(),
        position,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<SelectorToken> {
        parse_selector(s).unwrap().tokens
    }

    #[test]
    fn test_root_only_is_identity() {
        let sel = parse_selector("$").unwrap();
        assert!(sel.is_identity());
        assert_eq!(sel.source(), "$");
    }

    #[test]
    fn test_mixed_steps() {
        assert_eq!(
            tokens("$.a.b[0][*]"),
            vec![
                SelectorToken::Property("a".into()),
                SelectorToken::Property("b".into()),
                SelectorToken::Index(0),
                SelectorToken::Wildcard,
            ]
        );
    }

    #[test]
    fn test_property_names_allow_underscore_digits_and_dollar() {
        assert_eq!(
            tokens("$.first_name.$ref.x2"),
            vec![
                SelectorToken::Property("first_name".into()),
                SelectorToken::Property("$ref".into()),
                SelectorToken::Property("x2".into()),
            ]
        );
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(tokens("  $.a  "), vec![SelectorToken::Property("a".into())]);
    }

    #[test]
    fn test_rejects_missing_dollar() {
        let err = parse_selector("a.b").unwrap_err();
        assert!(err.to_string().contains("must start with '$'"));
    }

    #[test]
    fn test_rejects_empty_property() {
        assert!(parse_selector("$.").is_err());
        assert!(parse_selector("$..a").is_err());
    }

    #[test]
    fn test_rejects_bad_brackets() {
        let unterminated = parse_selector("$.a[1").unwrap_err();
        assert!(unterminated.to_string().contains("unterminated"));

        let negative = parse_selector("$.a[-1]").unwrap_err();
        assert!(negative.to_string().contains("[-1]"));

        let named = parse_selector("$.a['x']").unwrap_err();
        assert!(named.to_string().contains("unsupported bracket content"));

        assert!(parse_selector("$.a[]").is_err());
    }

    #[test]
    fn test_rejects_unknown_character_with_position() {
        match parse_selector("$.a b") {
            Err(SelectorError::Parse { position, message, .. }) => {
                assert_eq!(position, 3);
                assert!(message.contains("' '"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
