mod common;

use common::fixtures::*;
use common::{TestResult, init_logger, run, run_with};
use jsonx::{
    CompileError, JsonxError, MatchPicker, Mode, TransformError, TransformOptions, Transformer,
    TransformerConfig,
};
use serde_json::json;

fn tree_spec() -> serde_json::Value {
    json!({
        "templates": [{
            "name": "node",
            "output": { "v": "$.v", "children": { "apply": "node", "from": "$.children" } }
        }],
        "root": { "apply": "node" }
    })
}

fn tree() -> serde_json::Value {
    json!({ "v": 1, "children": [{ "v": 2, "children": [{ "v": 3, "children": [] }] }] })
}

#[test]
fn test_recursive_templates_without_limit() -> TestResult {
    init_logger();
    let out = run(&tree_spec(), &tree(), Mode::Strict)?;
    assert_eq!(out, json!({ "v": 1, "children": [{ "v": 2, "children": [{ "v": 3, "children": [] }] }] }));
    Ok(())
}

#[test]
fn test_depth_limit_from_config() -> TestResult {
    init_logger();
    let config = TransformerConfig::from_json_str(r#"{ "maxDepth": 2 }"#)?;
    let transformer = Transformer::builder().with_config(config).build();

    let out = run_with(&transformer, &tree_spec(), &tree(), Mode::Permissive)?;
    assert_eq!(out, json!({ "v": 1, "children": [{ "v": 2 }] }));

    let err = run_with(&transformer, &tree_spec(), &tree(), Mode::Strict).unwrap_err();
    assert!(matches!(
        err,
        JsonxError::Transform(TransformError::DepthExceeded { limit: 2, depth: 3, .. })
    ));
    Ok(())
}

#[test]
fn test_deep_apply_chain_without_limit() -> TestResult {
    init_logger();
    let spec = json!({
        "templates": [{ "name": "link", "output": { "n": { "apply": "link", "from": "$.next" } } }],
        "root": { "apply": "link" }
    });
    let input = (0..1_000).fold(json!(null), |inner, _| json!({ "next": inner }));
    let out = run(&spec, &input, Mode::Strict)?;

    let mut depth = 0;
    let mut node = &out;
    while let Some(inner) = node.get("n") {
        depth += 1;
        node = inner;
    }
    assert_eq!(depth, 1_000);
    Ok(())
}

#[test]
fn test_self_apply_without_from_is_a_cycle() -> TestResult {
    init_logger();
    let spec = json!({
        "templates": [{ "name": "again", "output": { "v": "$.v", "more": { "apply": "again" } } }],
        "root": { "apply": "again" }
    });
    let input = json!({ "v": 1 });
    assert_eq!(run(&spec, &input, Mode::Permissive)?, json!({ "v": 1 }));

    let err = run(&spec, &input, Mode::Strict).unwrap_err();
    assert!(matches!(
        err,
        JsonxError::Transform(TransformError::Cycle { ref template, depth: 2 }) if template == "again"
    ));
    Ok(())
}

#[test]
fn test_selector_detection() -> TestResult {
    init_logger();
    let spec = json!({
        "templates": [],
        "root": { "padded": "  $.a", "suffix": "a$", "dollar": "costs $5", "whole": "$", "empty": "" }
    });
    let input = json!({ "a": 1 });
    assert_eq!(
        run(&spec, &input, Mode::Strict)?,
        json!({ "padded": 1, "suffix": "a$", "dollar": "costs $5", "whole": { "a": 1 }, "empty": "" })
    );
    Ok(())
}

#[test]
fn test_non_string_directives_are_plain_objects() -> TestResult {
    init_logger();
    let spec = json!({
        "templates": [],
        "root": { "e": { "expr": 5 }, "a": { "apply": ["x"] } }
    });
    assert_eq!(
        run(&spec, &json!({}), Mode::Strict)?,
        json!({ "e": { "expr": 5 }, "a": { "apply": ["x"] } })
    );
    Ok(())
}

#[test]
fn test_scalar_root_and_template_outputs() -> TestResult {
    init_logger();
    let spec = json!({
        "templates": [{ "name": "n", "output": 42 }],
        "root": [{ "apply": "n" }, "plain", null, true]
    });
    assert_eq!(run(&spec, &json!({}), Mode::Strict)?, json!([42, "plain", null, true]));
    Ok(())
}

#[test]
fn test_absent_root_is_null() -> TestResult {
    init_logger();
    let spec = json!({ "templates": [], "root": "$.missing" });
    assert_eq!(run(&spec, &json!({}), Mode::Permissive)?, json!(null));
    Ok(())
}

#[test]
fn test_absent_array_elements_become_null() -> TestResult {
    init_logger();
    let spec = json!({
        "templates": [{ "name": "pick", "output": "$.v" }],
        "root": { "literal": ["$.x", "$.y"], "applied": { "apply": "pick", "from": "$.rows" } }
    });
    let input = json!({ "x": 1, "rows": [{ "v": "a" }, {}, { "v": "c" }] });
    assert_eq!(
        run(&spec, &input, Mode::Permissive)?,
        json!({ "literal": [1, null], "applied": ["a", null, "c"] })
    );
    Ok(())
}

#[test]
fn test_selector_type_mismatch() -> TestResult {
    init_logger();
    let spec = json!({ "templates": [], "root": { "v": "$.name[0]", "w": "$.list.key" } });
    let input = json!({ "name": "str", "list": [1] });
    assert_eq!(run(&spec, &input, Mode::Permissive)?, json!({}));
    let err = run(&spec, &input, Mode::Strict).unwrap_err();
    assert!(err.to_string().contains("expects"));
    Ok(())
}

#[test]
fn test_unicode_text_functions() -> TestResult {
    init_logger();
    let spec = json!({
        "templates": [],
        "root": {
            "short": { "expr": "substring($.s, 0, 3)" },
            "len": { "expr": "length($.s)" },
            "upper": { "expr": "$.s | uppercase" }
        }
    });
    let out = run(&spec, &json!({ "s": "héllo wörld" }), Mode::Strict)?;
    assert_eq!(out, json!({ "short": "hél", "len": 11, "upper": "HÉLLO WÖRLD" }));
    Ok(())
}

#[test]
fn test_expression_literals_and_root_access() -> TestResult {
    init_logger();
    let spec = json!({
        "templates": [{
            "name": "line",
            "output": {
                "label": { "expr": "concat($.name, \" (\", get(root(), '$.currency'), \")\")" },
                "big": { "expr": "gt($.price, 100)" },
                "fallback": { "expr": "default($.note, 'none')" }
            }
        }],
        "root": { "lines": { "apply": "line", "from": "$.items" } }
    });
    let input = json!({
        "currency": "EUR",
        "items": [{ "name": "Desk", "price": 250 }, { "name": "Pen", "price": 2, "note": "blue" }]
    });
    assert_eq!(
        run(&spec, &input, Mode::Permissive)?,
        json!({
            "lines": [
                { "label": "Desk (EUR)", "big": true, "fallback": "none" },
                { "label": "Pen (EUR)", "big": false, "fallback": "blue" }
            ]
        })
    );
    Ok(())
}

#[test]
fn test_unresolved_apply_compiles_with_warning() -> TestResult {
    init_logger();
    let spec = json!({ "templates": [], "root": { "a": 1, "g": { "apply": "ghost" } } });
    let compiled = jsonx::compile(&spec)?;
    assert_eq!(compiled.warnings().len(), 1);
    assert!(compiled.warnings()[0].contains("ghost"));

    assert_eq!(run(&spec, &json!({}), Mode::Permissive)?, json!({ "a": 1 }));
    let err = run(&spec, &json!({}), Mode::Strict).unwrap_err();
    assert!(matches!(err, JsonxError::Transform(TransformError::UnknownTemplate(ref n)) if n == "ghost"));
    Ok(())
}

#[test]
fn test_malformed_specs_fail_to_compile() {
    init_logger();
    let missing_root = json!({ "templates": [] });
    assert!(matches!(jsonx::compile(&missing_root), Err(CompileError::Conformance(_))));

    let stray_key = json!({ "templates": [], "root": {}, "extra": 1 });
    assert!(matches!(jsonx::compile(&stray_key), Err(CompileError::Conformance(_))));

    let bad_selector = json!({ "templates": [], "root": { "v": "$.a[" } });
    assert!(matches!(jsonx::compile(&bad_selector), Err(CompileError::Selector { .. })));

    let bad_expr = json!({ "templates": [], "root": { "v": { "expr": "concat($.a," } } });
    assert!(matches!(jsonx::compile(&bad_expr), Err(CompileError::Expression { .. })));
}

#[test]
fn test_match_picker_over_input() -> TestResult {
    init_logger();
    let spec = jsonx::compile(&json!({
        "templates": [
            { "name": "user", "match": "$.users[*]", "output": "$.name" },
            { "name": "owner", "match": "$.users[0]", "output": "$.name" }
        ],
        "root": {}
    }))?;
    let input = users(3);
    let picker = MatchPicker::new(&spec);

    let first = &input["users"][0];
    let names: Vec<_> = picker
        .candidates(first, &input)
        .iter()
        .filter_map(|t| t.name.clone())
        .collect();
    assert_eq!(names, vec!["user", "owner"]);
    assert_eq!(picker.pick(&input["users"][2], &input).and_then(|t| t.name.as_deref()), Some("user"));
    assert!(picker.pick(&input, &input).is_none());
    Ok(())
}

#[test]
fn test_shared_transformer_runs_concurrently() -> TestResult {
    init_logger();
    let transformer = Transformer::new();
    let spec = jsonx::compile(&user_spec())?;
    let a = json!({ "user": { "id": 1, "first": "A", "last": "One" } });
    let b = json!({ "user": [{ "id": 2, "first": "B", "last": "Two" }] });

    let runtime = tokio::runtime::Runtime::new()?;
    let (left, right) = runtime.block_on(async {
        tokio::join!(
            transformer.transform_with(&a, &spec, TransformOptions::new().with_mode(Mode::Strict)),
            transformer.transform_with(&b, &spec, TransformOptions::new().with_mode(Mode::Strict)),
        )
    });
    assert_eq!(left?, json!({ "user": { "id": 1, "full": "A One" } }));
    assert_eq!(right?, json!({ "user": [{ "id": 2, "full": "B Two" }] }));
    Ok(())
}
