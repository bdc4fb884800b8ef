//! The schema every raw template specification must satisfy before compiling.
use once_cell::sync::Lazy;
use serde_json::{Value, json};

static TEMPLATE_SPEC_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let any_json = json!({ "type": ["object", "array", "string", "number", "boolean", "null"] });
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "jsonx template specification",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "templates": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "name": { "type": "string", "minLength": 1 },
                        "match": { "type": "string", "minLength": 1 },
                        "output": any_json
                    },
                    "required": ["output"]
                }
            },
            "root": any_json
        },
        "required": ["templates", "root"]
    })
});

pub fn template_spec_schema() -> &'static Value {
    &TEMPLATE_SPEC_SCHEMA
}
