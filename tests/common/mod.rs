pub mod fixtures;

use jsonx::{JsonxError, Mode, TransformOptions, Transformer};
use serde_json::Value;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Compiles `spec` and runs it over `input` with a builtin-only transformer.
pub fn run(spec: &Value, input: &Value, mode: Mode) -> Result<Value, JsonxError> {
    run_with(&Transformer::new(), spec, input, mode)
}

/// Compiles `spec` and runs it over `input` with `transformer`.
pub fn run_with(
    transformer: &Transformer,
    spec: &Value,
    input: &Value,
    mode: Mode,
) -> Result<Value, JsonxError> {
    let compiled = jsonx::compile(spec)?;
    let options = TransformOptions::new().with_mode(mode);
    let result = tokio::runtime::Runtime::new()?
        .block_on(async { transformer.transform_with(input, &compiled, options).await })?;
    Ok(result)
}
