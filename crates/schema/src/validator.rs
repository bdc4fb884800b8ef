//! A small draft-07-style validator.
//!
//! Supports `type`, `enum`, `const`, `nullable`, boolean schemas, the string,
//! number and array size keywords, `items`/`additionalItems`, `properties`,
//! `required`, `patternProperties`, `additionalProperties` and the
//! `oneOf`/`anyOf`/`allOf` combinators. All violations are collected; the walk
//! does not stop at the first one.
use crate::error::{SchemaError, Violation};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

static EMAIL: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// Checks documents against one schema.
#[derive(Debug, Clone)]
pub struct Validator<'s> {
    schema: &'s Value,
    allow_unknown_formats: bool,
}

impl<'s> Validator<'s> {
    pub fn new(schema: &'s Value) -> Self {
        Self {
            schema,
            allow_unknown_formats: false,
        }
    }

    /// Accept `format` names this validator does not recognize instead of
    /// reporting them.
    pub fn allow_unknown_formats(mut self, allow: bool) -> Self {
        self.allow_unknown_formats = allow;
        self
    }

    /// Every violation found in `data`, in document order.
    pub fn violations(&self, data: &Value) -> Vec<Violation> {
        let mut walk = Walk {
            allow_unknown_formats: self.allow_unknown_formats,
            found: Vec::new(),
        };
        walk.check(self.schema, data, "$");
        walk.found
    }

    pub fn validate(&self, data: &Value) -> Result<(), SchemaError> {
        let found = self.violations(data);
        if found.is_empty() {
            Ok(())
        } else {
            log::debug!("schema validation found {} violation(s)", found.len());
            Err(SchemaError::Violations(found))
        }
    }
}

/// Validates `data` against `schema` with default options.
pub fn validate(schema: &Value, data: &Value) -> Result<(), SchemaError> {
    Validator::new(schema).validate(data)
}

struct Walk {
    allow_unknown_formats: bool,
    found: Vec<Violation>,
}

impl Walk {
    fn report(&mut self, path: &str, message: impl Into<String>) {
        self.found.push(Violation::new(path, message));
    }

    /// Runs `schema` against `value` and reports whether it passed, without
    /// keeping the violations.
    fn passes(&mut self, schema: &Value, value: &Value, path: &str) -> bool {
        let mark = self.found.len();
        self.check(schema, value, path);
        let ok = self.found.len() == mark;
        self.found.truncate(mark);
        ok
    }

    fn check(&mut self, schema: &Value, value: &Value, path: &str) {
        let node = match schema {
            Value::Bool(true) => return,
            Value::Bool(false) => {
                self.report(path, "Schema explicitly forbids this value");
                return;
            }
            Value::Object(node) => node,
            _ => return,
        };

        if value.is_null() && node.get("nullable").and_then(Value::as_bool) == Some(true) {
            return;
        }

        if let Some(expected) = node.get("type") {
            if !self.check_type(expected, value, path) {
                return;
            }
        }

        if let Some(Value::Array(options)) = node.get("enum") {
            if !options.contains(value) {
                self.report(path, format!("Value not in enum: {}", Value::Array(options.clone())));
            }
        }
        if let Some(constant) = node.get("const") {
            if constant != value {
                self.report(path, format!("Value does not equal const {}", constant));
            }
        }

        match value {
            Value::String(s) => self.check_string(node, s, path),
            Value::Number(n) => {
                if let Some(n) = n.as_f64() {
                    self.check_number(node, n, path);
                }
            }
            Value::Array(items) => self.check_array(node, items, path),
            Value::Object(map) => self.check_object(node, map, path),
            _ => {}
        }

        self.check_combinators(node, value, path);
    }

    /// Returns false when the walk should stop at this node.
    fn check_type(&mut self, expected: &Value, value: &Value, path: &str) -> bool {
        match expected {
            Value::String(t) => {
                if !type_matches(t, value) {
                    self.report(path, format!("Type mismatch: expected {}", t));
                    return false;
                }
            }
            Value::Array(types) => {
                let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
                if !names.iter().any(|t| type_matches(t, value)) {
                    self.report(
                        path,
                        format!("Type mismatch: expected one of [{}]", names.join(", ")),
                    );
                }
            }
            _ => {}
        }
        true
    }

    fn check_string(&mut self, node: &Map<String, Value>, s: &str, path: &str) {
        let len = s.chars().count() as u64;
        if let Some(min) = node.get("minLength").and_then(Value::as_u64) {
            if len < min {
                self.report(path, format!("String shorter than minLength {}", min));
            }
        }
        if let Some(max) = node.get("maxLength").and_then(Value::as_u64) {
            if len > max {
                self.report(path, format!("String longer than maxLength {}", max));
            }
        }
        if let Some(pattern) = node.get("pattern").and_then(Value::as_str) {
            match Regex::new(pattern) {
                Ok(re) if re.is_match(s) => {}
                Ok(_) => self.report(path, format!("String does not match pattern {}", pattern)),
                Err(e) => self.report(path, format!("Invalid pattern {}: {}", pattern, e)),
            }
        }
        if let Some(format) = node.get("format").and_then(Value::as_str) {
            match format_matches(format, s) {
                Some(true) => {}
                Some(false) => {
                    self.report(path, format!("String does not match format {}", format))
                }
                None if self.allow_unknown_formats => {}
                None => self.report(path, format!("Unknown format {}", format)),
            }
        }
    }

    fn check_number(&mut self, node: &Map<String, Value>, n: f64, path: &str) {
        let bound = |key: &str| node.get(key).and_then(Value::as_f64);
        if let Some(min) = bound("minimum") {
            if n < min {
                self.report(path, format!("Number less than minimum {}", min));
            }
        }
        if let Some(max) = bound("maximum") {
            if n > max {
                self.report(path, format!("Number greater than maximum {}", max));
            }
        }
        if let Some(min) = bound("exclusiveMinimum") {
            if n <= min {
                self.report(path, format!("Number <= exclusiveMinimum {}", min));
            }
        }
        if let Some(max) = bound("exclusiveMaximum") {
            if n >= max {
                self.report(path, format!("Number >= exclusiveMaximum {}", max));
            }
        }
        if let Some(step) = bound("multipleOf") {
            let quotient = n / step;
            if step != 0.0 && (quotient - quotient.round()).abs() > 1e-9 {
                self.report(path, format!("Number is not a multipleOf {}", step));
            }
        }
    }

    fn check_array(&mut self, node: &Map<String, Value>, items: &[Value], path: &str) {
        let len = items.len() as u64;
        if let Some(min) = node.get("minItems").and_then(Value::as_u64) {
            if len < min {
                self.report(path, format!("Array has fewer items than minItems {}", min));
            }
        }
        if let Some(max) = node.get("maxItems").and_then(Value::as_u64) {
            if len > max {
                self.report(path, format!("Array has more items than maxItems {}", max));
            }
        }
        if node.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
            let mut seen = HashSet::new();
            if !items.iter().all(|item| seen.insert(item.to_string())) {
                self.report(path, "Array has duplicate items but uniqueItems is true");
            }
        }

        match node.get("items") {
            Some(Value::Array(tuple)) => {
                for (i, (schema, item)) in tuple.iter().zip(items).enumerate() {
                    self.check(schema, item, &format!("{}[{}]", path, i));
                }
                match node.get("additionalItems") {
                    Some(Value::Bool(false)) if items.len() > tuple.len() => {
                        self.report(path, "Additional array items are not allowed");
                    }
                    Some(extra @ Value::Object(_)) => {
                        for (i, item) in items.iter().enumerate().skip(tuple.len()) {
                            self.check(extra, item, &format!("{}[{}]", path, i));
                        }
                    }
                    _ => {}
                }
            }
            Some(schema) => {
                for (i, item) in items.iter().enumerate() {
                    self.check(schema, item, &format!("{}[{}]", path, i));
                }
            }
            None => {}
        }
    }

    fn check_object(&mut self, node: &Map<String, Value>, map: &Map<String, Value>, path: &str) {
        let empty = Map::new();
        let props = node.get("properties").and_then(Value::as_object).unwrap_or(&empty);
        let child = |key: &str| format!("{}.{}", path, key);

        if let Some(Value::Array(required)) = node.get("required") {
            for key in required.iter().filter_map(Value::as_str) {
                if !map.contains_key(key) {
                    self.report(&child(key), "Required property missing");
                }
            }
        }

        for (key, schema) in props {
            if let Some(value) = map.get(key) {
                self.check(schema, value, &child(key));
            }
        }

        let mut patterns = Vec::new();
        if let Some(Value::Object(pattern_props)) = node.get("patternProperties") {
            for (pattern, schema) in pattern_props {
                match Regex::new(pattern) {
                    Ok(re) => patterns.push((re, schema)),
                    Err(e) => self.report(path, format!("Invalid pattern {}: {}", pattern, e)),
                }
            }
        }
        for (re, schema) in &patterns {
            for (key, value) in map.iter().filter(|(key, _)| re.is_match(key)) {
                self.check(schema, value, &child(key));
            }
        }

        let additional = map
            .iter()
            .filter(|(key, _)| !props.contains_key(key.as_str()));
        match node.get("additionalProperties") {
            Some(Value::Bool(false)) => {
                for (key, _) in additional {
                    if !patterns.iter().any(|(re, _)| re.is_match(key)) {
                        self.report(&child(key), "Additional property not allowed");
                    }
                }
            }
            Some(schema @ Value::Object(_)) => {
                for (key, value) in additional {
                    self.check(schema, value, &child(key));
                }
            }
            _ => {}
        }
    }

    fn check_combinators(&mut self, node: &Map<String, Value>, value: &Value, path: &str) {
        if let Some(Value::Array(options)) = node.get("oneOf") {
            let matched = options
                .iter()
                .filter(|schema| self.passes(schema, value, path))
                .count();
            if matched != 1 {
                self.report(
                    path,
                    format!(
                        "Value must match exactly one schema in oneOf (matched {})",
                        matched
                    ),
                );
            }
        }
        if let Some(Value::Array(options)) = node.get("anyOf") {
            if !options.iter().any(|schema| self.passes(schema, value, path)) {
                self.report(path, "Value must match at least one schema in anyOf");
            }
        }
        if let Some(Value::Array(all)) = node.get("allOf") {
            for schema in all {
                self.check(schema, value, path);
            }
        }
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "null" => value.is_null(),
        "boolean" => value.is_boolean(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.as_f64().is_some_and(|n| n.fract() == 0.0),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => false,
    }
}

/// `None` when the format is not one this validator knows.
fn format_matches(format: &str, s: &str) -> Option<bool> {
    match format {
        "date-time" => Some(chrono::DateTime::parse_from_rfc3339(s).is_ok()),
        "email" => Some(EMAIL.as_ref().is_some_and(|re| re.is_match(s))),
        "uri" => Some(url::Url::parse(s).is_ok()),
        _ => None,
    }
}
