//! Structural template picking by `match` selector.
//!
//! Not consulted by the evaluation engine, which only dispatches through
//! explicit `apply` nodes.
use crate::compiler::{CompiledSpec, Template};
use serde_json::Value;
use std::ptr;

/// Finds the templates whose `match` selector, evaluated from the document
/// root, selects a given node.
///
/// Matching is by identity: `node` must be a reference into the same `root`
/// document, not an equal copy. A selector resolving to an array matches each
/// of its elements.
#[derive(Debug, Clone, Copy)]
pub struct MatchPicker<'s> {
    spec: &'s CompiledSpec,
}

impl<'s> MatchPicker<'s> {
    pub fn new(spec: &'s CompiledSpec) -> Self {
        Self { spec }
    }

    /// Candidate templates for `node`, in declaration order.
    pub fn candidates(&self, node: &Value, root: &Value) -> Vec<&'s Template> {
        self.spec
            .templates
            .iter()
            .filter(|template| Self::matches(template, node, root))
            .collect()
    }

    /// The first candidate, if any.
    pub fn pick(&self, node: &Value, root: &Value) -> Option<&'s Template> {
        self.spec
            .templates
            .iter()
            .find(|template| Self::matches(template, node, root))
    }

    fn matches(template: &Template, node: &Value, root: &Value) -> bool {
        let Some(selector) = &template.match_selector else {
            return false;
        };
        match selector.evaluate(root) {
            Ok(Value::Array(items)) => items.iter().any(|item| ptr::eq(item, node)),
            Ok(selected) => ptr::eq(selected, node),
            Err(_) => false,
        }
    }
}
