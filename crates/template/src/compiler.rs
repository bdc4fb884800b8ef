//! Implements the "Compilation" phase.
//! It checks a raw specification, pre-parses every selector and expression in
//! it, and produces an immutable [`CompiledSpec`].

use crate::ast::{RawSpec, RawTemplate};
use crate::error::CompileError;
use chrono::{SecondsFormat, Utc};
use itertools::Itertools;
use jsonx_expr::{Expression, parse_expression};
use jsonx_schema::{SchemaError, template_spec_schema};
use jsonx_selector::{Selector, parse_selector, value_kind};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;

// --- Executable form ---

/// A compiled template-body value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OutputNode {
    /// A scalar copied to the output verbatim.
    Literal { value: Value },
    /// A `$`-prefixed string, resolved against the current node.
    Selector { selector: Selector },
    /// `{ "expr": "..." }`
    Expr { source: String, ast: Expression },
    /// `{ "apply": name, "from"?: selector }`
    Apply {
        template: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<Selector>,
    },
    /// Entries in declaration order.
    Object {
        #[serde(serialize_with = "ordered_map")]
        entries: Vec<(String, OutputNode)>,
    },
    Array { items: Vec<OutputNode> },
}

fn ordered_map<S: Serializer>(
    entries: &[(String, OutputNode)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(entries.iter().map(|(k, v)| (k, v)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    /// Position in the raw `templates` array.
    pub index: usize,
    /// Unnamed templates are never dispatched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_selector: Option<Selector>,
    pub output: OutputNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecMeta {
    pub template_count: usize,
    pub warnings: Vec<String>,
    pub compiled_at: String,
}

/// The validated, pre-parsed, immutable form of a raw specification.
/// Safe to share across concurrent transforms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledSpec {
    pub meta: SpecMeta,
    pub templates: Vec<Template>,
    #[serde(skip)]
    template_by_name: HashMap<String, usize>,
    pub root: OutputNode,
}

impl CompiledSpec {
    /// Looks up a named template.
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.template_by_name
            .get(name)
            .and_then(|&i| self.templates.get(i))
    }

    pub fn warnings(&self) -> &[String] {
        &self.meta.warnings
    }

    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().filter_map(|t| t.name.as_deref())
    }
}

// --- Conformance seam ---

/// The structural check run on a raw specification before any parsing.
pub trait ConformanceCheck: Send + Sync {
    fn check(&self, raw: &Value) -> Result<(), SchemaError>;
}

/// Checks against the bundled template specification schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaConformance;

impl ConformanceCheck for SchemaConformance {
    fn check(&self, raw: &Value) -> Result<(), SchemaError> {
        jsonx_schema::validate(template_spec_schema(), raw)
    }
}

// --- Compiler ---

/// Compiles raw specifications into [`CompiledSpec`]s.
pub struct Compiler {
    conformance: Box<dyn ConformanceCheck>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_conformance(SchemaConformance)
    }

    pub fn with_conformance(check: impl ConformanceCheck + 'static) -> Self {
        Self {
            conformance: Box::new(check),
        }
    }

    pub fn compile(&self, raw: &Value) -> Result<CompiledSpec, CompileError> {
        self.conformance.check(raw)?;
        let spec = RawSpec::deserialize(raw).map_err(|e| CompileError::Shape {
            location: "$".to_string(),
            message: e.to_string(),
        })?;

        let template_by_name = index_names(&spec.templates)?;

        let mut pass = Pass::default();
        let templates = spec
            .templates
            .iter()
            .enumerate()
            .map(|(index, raw)| pass.template(index, raw))
            .collect::<Result<Vec<_>, _>>()?;
        let root = pass.output(&spec.root, "root")?;

        let mut warnings = pass.warnings;
        warnings.extend(
            pass.applies
                .iter()
                .unique_by(|(name, _)| name.clone())
                .filter(|(name, _)| !template_by_name.contains_key(name))
                .map(|(name, location)| {
                    format!("apply references unknown template \"{}\" (at {})", name, location)
                }),
        );
        for warning in &warnings {
            log::warn!("{}", warning);
        }

        Ok(CompiledSpec {
            meta: SpecMeta {
                template_count: templates.len(),
                warnings,
                compiled_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
            templates,
            template_by_name,
            root,
        })
    }
}

/// Compiles with the default conformance check.
pub fn compile(raw: &Value) -> Result<CompiledSpec, CompileError> {
    Compiler::new().compile(raw)
}

/// Parses JSON text and compiles it.
pub fn compile_str(text: &str) -> Result<CompiledSpec, CompileError> {
    let raw: Value = serde_json::from_str(text)?;
    compile(&raw)
}

fn index_names(templates: &[RawTemplate]) -> Result<HashMap<String, usize>, CompileError> {
    let mut by_name: HashMap<String, usize> = HashMap::with_capacity(templates.len());
    for (index, template) in templates.iter().enumerate() {
        let Some(name) = &template.name else {
            continue;
        };
        if let Some(&first) = by_name.get(name) {
            return Err(CompileError::DuplicateTemplate {
                name: name.clone(),
                location: template.location(index),
                first: templates[first].location(first),
            });
        }
        by_name.insert(name.clone(), index);
    }
    Ok(by_name)
}

/// State collected while walking one specification.
#[derive(Default)]
struct Pass {
    warnings: Vec<String>,
    /// Every apply target with the location it was found at.
    applies: Vec<(String, String)>,
}

impl Pass {
    fn template(&mut self, index: usize, raw: &RawTemplate) -> Result<Template, CompileError> {
        let location = raw.location(index);
        let match_selector = raw
            .match_selector
            .as_deref()
            .map(|source| {
                parse_selector(source).map_err(|source| CompileError::Selector {
                    location: format!("{}.match", location),
                    source,
                })
            })
            .transpose()?;
        let output = self.output(&raw.output, &format!("{}.output", location))?;
        Ok(Template {
            index,
            name: raw.name.clone(),
            match_selector,
            output,
        })
    }

    fn output(&mut self, value: &Value, location: &str) -> Result<OutputNode, CompileError> {
        match value {
            Value::String(s) if s.trim_start().starts_with('$') => {
                let selector = selector_at(s, location)?;
                Ok(OutputNode::Selector { selector })
            }
            Value::Array(items) => {
                let items = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.output(item, &format!("{}[{}]", location, i)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(OutputNode::Array { items })
            }
            Value::Object(map) => self.object(map, location),
            scalar => Ok(OutputNode::Literal {
                value: scalar.clone(),
            }),
        }
    }

    fn object(&mut self, map: &Map<String, Value>, location: &str) -> Result<OutputNode, CompileError> {
        if let Some(Value::String(source)) = map.get("expr") {
            self.note_ignored(map, &["expr"], location);
            let ast = parse_expression(source).map_err(|source| CompileError::Expression {
                location: location.to_string(),
                source,
            })?;
            return Ok(OutputNode::Expr {
                source: source.clone(),
                ast,
            });
        }

        if let Some(Value::String(template)) = map.get("apply") {
            self.note_ignored(map, &["apply", "from"], location);
            let from = match map.get("from") {
                None => None,
                Some(Value::String(s)) => Some(selector_at(s, &format!("{}.from", location))?),
                Some(other) => {
                    return Err(CompileError::Shape {
                        location: format!("{}.from", location),
                        message: format!("expected a selector string, found {}", value_kind(other)),
                    });
                }
            };
            self.applies.push((template.clone(), location.to_string()));
            return Ok(OutputNode::Apply {
                template: template.clone(),
                from,
            });
        }

        let mut entries = Vec::with_capacity(map.len());
        for (key, child) in map {
            let node = self.output(child, &format!("{}.{}", location, key))?;
            entries.push((key.clone(), node));
        }
        Ok(OutputNode::Object { entries })
    }

    fn note_ignored(&mut self, map: &Map<String, Value>, known: &[&str], location: &str) {
        let ignored = map.keys().filter(|k| !known.contains(&k.as_str())).join(", ");
        if !ignored.is_empty() {
            self.warnings.push(format!(
                "{}: keys ignored next to \"{}\": {}",
                location, known[0], ignored
            ));
        }
    }
}

fn selector_at(source: &str, location: &str) -> Result<Selector, CompileError> {
    parse_selector(source).map_err(|source| CompileError::Selector {
        location: location.to_string(),
        source,
    })
}
