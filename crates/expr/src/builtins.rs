//! Built-in function implementations.
//!
//! Coercion rules shared by the builtins: "null-ish" means JSON `null` or an
//! absent value; numbers are read from numbers, numeric strings and booleans;
//! integral results are emitted as JSON integers and non-finite results as
//! `null`, since JSON has no infinities.
use crate::functions::FunctionRegistry;
use crate::value::{Args, Datum, FunctionError, FunctionRef, FunctionResult, Returned, native};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};
use itertools::Itertools;
use jsonx_selector::parse_selector;
use serde_json::{Value, json};
use std::cmp::Ordering;

type SyncFn = for<'r, 's> fn(&'r Args<'s>) -> FunctionResult;

fn sync(f: SyncFn) -> crate::value::NativeFn {
    native(move |args: Args<'_>| Returned::Ready(f(&args)))
}

/// Installs every builtin into `registry`.
pub(crate) fn install(registry: &mut FunctionRegistry) {
    let table: &[(&str, SyncFn)] = &[
        // String
        ("concat", concat),
        ("join", join),
        ("uppercase", uppercase),
        ("lowercase", lowercase),
        ("trim", trim),
        ("substring", substring),
        ("split", split),
        ("replace", replace),
        ("contains", contains),
        ("startsWith", starts_with),
        ("endsWith", ends_with),
        ("toString", to_string_fn),
        ("toNumber", to_number_fn),
        // Numeric
        ("add", add),
        ("subtract", subtract),
        ("multiply", multiply),
        ("divide", divide),
        ("mod", modulo),
        ("round", round),
        ("floor", floor),
        ("ceil", ceil),
        ("abs", abs),
        ("max", max),
        ("min", min),
        ("sum", sum),
        // Logical
        ("default", default),
        ("coalesce", coalesce),
        ("equals", equals),
        ("not", not),
        ("and", and),
        ("or", or),
        ("gt", gt),
        ("gte", gte),
        ("lt", lt),
        ("lte", lte),
        ("if", if_then_else),
        // Collection
        ("length", length),
        ("first", first),
        ("last", last),
        ("keys", keys),
        ("values", values),
        ("reverse", reverse),
        ("sort", sort),
        ("unique", unique),
        ("flatten", flatten),
        // Date
        ("formatDate", format_date),
        ("now", now),
        // Type predicates
        ("isArray", is_array),
        ("isObject", is_object),
        ("isString", is_string),
        ("isNumber", is_number),
        ("isBoolean", is_boolean),
        ("isNull", is_null),
        // Frame
        ("root", root),
        ("get", get),
    ];
    for (name, f) in table {
        registry.register(*name, sync(*f));
    }

    // Higher-order functions may call deferred functions, so they defer too.
    registry.register("map", native(map));
    registry.register("filter", native(filter));
    registry.register("find", native(find));
}

// --- Coercion helpers ---

/// JavaScript-style truthiness.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form of a value, as used by `concat`/`join`.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Converts a float into a JSON number, preferring an integer representation.
pub fn number(value: f64) -> Value {
    if !value.is_finite() {
        log::debug!("non-finite numeric result {} has no JSON form; using null", value);
        return Value::Null;
    }
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        return json!(value as i64);
    }
    json!(value)
}

fn numeric_arg(args: &Args<'_>, index: usize, function: &str) -> Result<f64, FunctionError> {
    to_number(args.get(index)).ok_or_else(|| {
        FunctionError::new(format!(
            "{}: argument {} ({}) is not a number",
            function,
            index + 1,
            args.get(index)
        ))
    })
}

/// Numeric comparison when both sides are numbers, string ordering when both
/// are strings, numeric coercion otherwise.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => to_number(a)?.partial_cmp(&to_number(b)?),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Numbers found among the arguments; a single array argument is spread.
fn numbers_in(args: &Args<'_>) -> Vec<f64> {
    let spread: Vec<&Value> = match (args.len(), args.get(0)) {
        (1, Value::Array(items)) => items.iter().collect(),
        _ => args.iter().collect(),
    };
    spread
        .into_iter()
        .filter(|v| v.is_number())
        .filter_map(Value::as_f64)
        .collect()
}

// --- String ---

fn concat(args: &Args<'_>) -> FunctionResult {
    Ok(Value::String(args.iter().map(to_text).collect()))
}

fn join(args: &Args<'_>) -> FunctionResult {
    let sep = match args.get(1) {
        Value::Null => ",".to_string(),
        other => to_text(other),
    };
    Ok(match args.get(0) {
        Value::Array(items) => Value::String(items.iter().map(to_text).join(&sep)),
        _ => Value::String(String::new()),
    })
}

fn map_text(args: &Args<'_>, f: impl Fn(&str) -> String) -> FunctionResult {
    Ok(match args.get(0) {
        Value::Null => Value::Null,
        other => Value::String(f(&to_text(other))),
    })
}

fn uppercase(args: &Args<'_>) -> FunctionResult {
    map_text(args, str::to_uppercase)
}

fn lowercase(args: &Args<'_>) -> FunctionResult {
    map_text(args, str::to_lowercase)
}

fn trim(args: &Args<'_>) -> FunctionResult {
    map_text(args, |s| s.trim().to_string())
}

/// `substring(s, start, length?)`, character based and clamped to the input.
fn substring(args: &Args<'_>) -> FunctionResult {
    if args.get(0).is_null() {
        return Ok(Value::Null);
    }
    let text = to_text(args.get(0));
    let count = text.chars().count();
    let start = to_number(args.get(1)).unwrap_or(0.0).max(0.0) as usize;
    let start = start.min(count);
    let take = match args.get(2) {
        Value::Null => count - start,
        other => to_number(other).unwrap_or(0.0).max(0.0) as usize,
    };
    Ok(Value::String(text.chars().skip(start).take(take).collect()))
}

fn split(args: &Args<'_>) -> FunctionResult {
    if args.get(0).is_null() {
        return Ok(Value::Null);
    }
    let text = to_text(args.get(0));
    let sep = to_text(args.get(1));
    let parts: Vec<Value> = if sep.is_empty() {
        text.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        text.split(sep.as_str()).map(|s| Value::String(s.to_string())).collect()
    };
    Ok(Value::Array(parts))
}

fn replace(args: &Args<'_>) -> FunctionResult {
    if args.get(0).is_null() {
        return Ok(Value::Null);
    }
    let from = to_text(args.get(1));
    if from.is_empty() {
        return Err(FunctionError::new("replace: search text must not be empty"));
    }
    Ok(Value::String(
        to_text(args.get(0)).replace(&from, &to_text(args.get(2))),
    ))
}

fn contains(args: &Args<'_>) -> FunctionResult {
    let needle = args.get(1);
    Ok(Value::Bool(match args.get(0) {
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        Value::String(s) => s.contains(to_text(needle).as_str()),
        _ => false,
    }))
}

fn starts_with(args: &Args<'_>) -> FunctionResult {
    Ok(Value::Bool(match args.get(0) {
        Value::String(s) => s.starts_with(to_text(args.get(1)).as_str()),
        _ => false,
    }))
}

fn ends_with(args: &Args<'_>) -> FunctionResult {
    Ok(Value::Bool(match args.get(0) {
        Value::String(s) => s.ends_with(to_text(args.get(1)).as_str()),
        _ => false,
    }))
}

fn to_string_fn(args: &Args<'_>) -> FunctionResult {
    Ok(Value::String(to_text(args.get(0))))
}

fn to_number_fn(args: &Args<'_>) -> FunctionResult {
    Ok(to_number(args.get(0)).map(number).unwrap_or(Value::Null))
}

// --- Numeric ---

fn add(args: &Args<'_>) -> FunctionResult {
    let mut total = 0.0;
    for i in 0..args.len() {
        total += numeric_arg(args, i, "add")?;
    }
    Ok(number(total))
}

fn subtract(args: &Args<'_>) -> FunctionResult {
    Ok(number(numeric_arg(args, 0, "subtract")? - numeric_arg(args, 1, "subtract")?))
}

fn multiply(args: &Args<'_>) -> FunctionResult {
    let mut product = 1.0;
    for i in 0..args.len() {
        product *= numeric_arg(args, i, "multiply")?;
    }
    Ok(number(product))
}

/// Division by zero yields an infinite (or NaN) float, which has no JSON form
/// and therefore materializes as `null`.
fn divide(args: &Args<'_>) -> FunctionResult {
    Ok(number(numeric_arg(args, 0, "divide")? / numeric_arg(args, 1, "divide")?))
}

fn modulo(args: &Args<'_>) -> FunctionResult {
    Ok(number(numeric_arg(args, 0, "mod")? % numeric_arg(args, 1, "mod")?))
}

fn round(args: &Args<'_>) -> FunctionResult {
    let x = numeric_arg(args, 0, "round")?;
    let digits = match args.get(1) {
        Value::Null => 0,
        _ => numeric_arg(args, 1, "round")? as i32,
    };
    let factor = 10f64.powi(digits);
    Ok(number((x * factor).round() / factor))
}

fn floor(args: &Args<'_>) -> FunctionResult {
    Ok(number(numeric_arg(args, 0, "floor")?.floor()))
}

fn ceil(args: &Args<'_>) -> FunctionResult {
    Ok(number(numeric_arg(args, 0, "ceil")?.ceil()))
}

fn abs(args: &Args<'_>) -> FunctionResult {
    Ok(number(numeric_arg(args, 0, "abs")?.abs()))
}

fn max(args: &Args<'_>) -> FunctionResult {
    Ok(numbers_in(args)
        .into_iter()
        .reduce(f64::max)
        .map(number)
        .unwrap_or(Value::Null))
}

fn min(args: &Args<'_>) -> FunctionResult {
    Ok(numbers_in(args)
        .into_iter()
        .reduce(f64::min)
        .map(number)
        .unwrap_or(Value::Null))
}

fn sum(args: &Args<'_>) -> FunctionResult {
    Ok(number(numbers_in(args).into_iter().sum()))
}

// --- Logical ---

fn default(args: &Args<'_>) -> FunctionResult {
    Ok(match args.get(0) {
        Value::Null => args.get(1).clone(),
        other => other.clone(),
    })
}

fn coalesce(args: &Args<'_>) -> FunctionResult {
    Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null))
}

fn equals(args: &Args<'_>) -> FunctionResult {
    if args.len() != 2 {
        return Err(FunctionError::new(format!(
            "equals: expected 2 arguments, got {}",
            args.len()
        )));
    }
    Ok(Value::Bool(values_equal(args.get(0), args.get(1))))
}

fn not(args: &Args<'_>) -> FunctionResult {
    Ok(Value::Bool(!truthy(args.get(0))))
}

fn and(args: &Args<'_>) -> FunctionResult {
    Ok(Value::Bool(args.iter().all(truthy)))
}

fn or(args: &Args<'_>) -> FunctionResult {
    Ok(Value::Bool(args.iter().any(truthy)))
}

fn ordered(args: &Args<'_>, accept: fn(Ordering) -> bool) -> FunctionResult {
    Ok(Value::Bool(
        compare(args.get(0), args.get(1)).is_some_and(accept),
    ))
}

fn gt(args: &Args<'_>) -> FunctionResult {
    ordered(args, Ordering::is_gt)
}

fn gte(args: &Args<'_>) -> FunctionResult {
    ordered(args, Ordering::is_ge)
}

fn lt(args: &Args<'_>) -> FunctionResult {
    ordered(args, Ordering::is_lt)
}

fn lte(args: &Args<'_>) -> FunctionResult {
    ordered(args, Ordering::is_le)
}

fn if_then_else(args: &Args<'_>) -> FunctionResult {
    Ok(if truthy(args.get(0)) {
        args.get(1).clone()
    } else {
        args.get(2).clone()
    })
}

// --- Collection ---

fn length(args: &Args<'_>) -> FunctionResult {
    let len = match args.get(0) {
        Value::Array(items) => items.len(),
        Value::String(s) => s.chars().count(),
        Value::Object(map) => map.len(),
        _ => 0,
    };
    Ok(json!(len))
}

fn first(args: &Args<'_>) -> FunctionResult {
    Ok(match args.get(0) {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    })
}

fn last(args: &Args<'_>) -> FunctionResult {
    Ok(match args.get(0) {
        Value::Array(items) => items.last().cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    })
}

fn keys(args: &Args<'_>) -> FunctionResult {
    Ok(match args.get(0) {
        Value::Object(map) => map.keys().map(|k| Value::String(k.clone())).collect(),
        _ => Value::Array(Vec::new()),
    })
}

fn values(args: &Args<'_>) -> FunctionResult {
    Ok(match args.get(0) {
        Value::Object(map) => map.values().cloned().collect(),
        _ => Value::Array(Vec::new()),
    })
}

fn reverse(args: &Args<'_>) -> FunctionResult {
    Ok(match args.get(0) {
        Value::Array(items) => items.iter().rev().cloned().collect(),
        Value::String(s) => Value::String(s.chars().rev().collect()),
        _ => Value::Null,
    })
}

fn sort(args: &Args<'_>) -> FunctionResult {
    match args.get(0) {
        Value::Array(items) => {
            let mut sorted = items.clone();
            sorted.sort_by(|a, b| compare(a, b).unwrap_or(Ordering::Equal));
            Ok(Value::Array(sorted))
        }
        Value::Null => Ok(Value::Null),
        other => Err(FunctionError::new(format!(
            "sort: expected an array, got {}",
            jsonx_selector::value_kind(other)
        ))),
    }
}

fn unique(args: &Args<'_>) -> FunctionResult {
    Ok(match args.get(0) {
        Value::Array(items) => items.iter().unique_by(|v| v.to_string()).cloned().collect(),
        _ => Value::Null,
    })
}

fn flatten(args: &Args<'_>) -> FunctionResult {
    Ok(match args.get(0) {
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item {
                Value::Array(inner) => inner.clone(),
                other => vec![other.clone()],
            })
            .collect(),
        _ => Value::Null,
    })
}

/// Shared argument handling for `map`/`filter`/`find`.
fn sequence_and_function(
    args: &Args<'_>,
    function: &str,
) -> Result<(Vec<Value>, FunctionRef), FunctionError> {
    let items = match args.get(0) {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => {
            return Err(FunctionError::new(format!(
                "{}: expected an array, got {}",
                function,
                jsonx_selector::value_kind(other)
            )));
        }
    };
    let callee = args.function(1).cloned().ok_or_else(|| {
        FunctionError::new(format!(
            "{}: second argument must name a function",
            function
        ))
    })?;
    Ok((items, callee))
}

async fn apply_each(callee: &FunctionRef, item: Value, root: &Value) -> FunctionResult {
    callee
        .call(Args::new(vec![Datum::Json(item)], root))
        .resolve()
        .await
        .map_err(|e| FunctionError::new(format!("{}: {}", callee.name(), e.message)))
}

fn map(args: Args<'_>) -> Returned<'_> {
    let (items, callee) = match sequence_and_function(&args, "map") {
        Ok(parts) => parts,
        Err(e) => return Returned::Ready(Err(e)),
    };
    let root = args.root();
    Returned::Deferred(Box::pin(async move {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(apply_each(&callee, item, root).await?);
        }
        Ok(Value::Array(out))
    }))
}

fn filter(args: Args<'_>) -> Returned<'_> {
    let (items, callee) = match sequence_and_function(&args, "filter") {
        Ok(parts) => parts,
        Err(e) => return Returned::Ready(Err(e)),
    };
    let root = args.root();
    Returned::Deferred(Box::pin(async move {
        let mut kept = Vec::new();
        for item in items {
            if truthy(&apply_each(&callee, item.clone(), root).await?) {
                kept.push(item);
            }
        }
        Ok(Value::Array(kept))
    }))
}

fn find(args: Args<'_>) -> Returned<'_> {
    let (items, callee) = match sequence_and_function(&args, "find") {
        Ok(parts) => parts,
        Err(e) => return Returned::Ready(Err(e)),
    };
    let root = args.root();
    Returned::Deferred(Box::pin(async move {
        for item in items {
            if truthy(&apply_each(&callee, item.clone(), root).await?) {
                return Ok(item);
            }
        }
        Ok(Value::Null)
    }))
}

// --- Date ---

/// Reads RFC 3339 strings, `YYYY-MM-DD[THH:MM:SS]` and epoch milliseconds.
fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_f64()? as i64),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
                    return Some(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

/// Expands `YYYY MM DD hh mm ss` tokens; everything else is copied verbatim.
fn render_date(instant: &DateTime<Utc>, layout: &str) -> String {
    let tokens: [(&str, String); 6] = [
        ("YYYY", format!("{:04}", instant.year())),
        ("MM", format!("{:02}", instant.month())),
        ("DD", format!("{:02}", instant.day())),
        ("hh", format!("{:02}", instant.hour())),
        ("mm", format!("{:02}", instant.minute())),
        ("ss", format!("{:02}", instant.second())),
    ];
    let mut out = String::with_capacity(layout.len() + 4);
    let mut rest = layout;
    'scan: while !rest.is_empty() {
        for (token, rendered) in &tokens {
            if let Some(after) = rest.strip_prefix(*token) {
                out.push_str(rendered);
                rest = after;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

fn format_date(args: &Args<'_>) -> FunctionResult {
    let Some(instant) = parse_instant(args.get(0)) else {
        return Ok(Value::Null);
    };
    let layout = match args.get(1) {
        Value::Null => "YYYY-MM-DD".to_string(),
        other => to_text(other),
    };
    Ok(Value::String(render_date(&instant, &layout)))
}

fn now(_args: &Args<'_>) -> FunctionResult {
    Ok(Value::String(
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    ))
}

// --- Type predicates ---

fn is_array(args: &Args<'_>) -> FunctionResult {
    Ok(Value::Bool(args.get(0).is_array()))
}

fn is_object(args: &Args<'_>) -> FunctionResult {
    Ok(Value::Bool(args.get(0).is_object()))
}

fn is_string(args: &Args<'_>) -> FunctionResult {
    Ok(Value::Bool(args.get(0).is_string()))
}

fn is_number(args: &Args<'_>) -> FunctionResult {
    Ok(Value::Bool(args.get(0).is_number()))
}

fn is_boolean(args: &Args<'_>) -> FunctionResult {
    Ok(Value::Bool(args.get(0).is_boolean()))
}

fn is_null(args: &Args<'_>) -> FunctionResult {
    Ok(Value::Bool(args.get(0).is_null()))
}

// --- Frame ---

fn root(args: &Args<'_>) -> FunctionResult {
    Ok(args.root().clone())
}

/// `get(value, '$.path')`: applies a selector string at call time.
fn get(args: &Args<'_>) -> FunctionResult {
    let source = match args.get(1) {
        Value::String(s) => s,
        other => {
            return Err(FunctionError::new(format!(
                "get: selector must be a string, got {}",
                jsonx_selector::value_kind(other)
            )));
        }
    };
    let selector = parse_selector(source).map_err(|e| FunctionError::new(e.to_string()))?;
    selector
        .evaluate(args.get(0))
        .cloned()
        .map_err(|e| FunctionError::new(e.to_string()))
}
