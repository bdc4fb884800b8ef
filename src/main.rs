use clap::{Args, Parser, Subcommand};
use jsonx::{CompiledSpec, JsonxError, Mode, TransformOptions, Transformer, TransformerConfig};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Declarative JSON-to-JSON transforms.
#[derive(Parser, Debug)]
#[command(name = "jsonx", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transform an input document with a template specification.
    Transform {
        #[command(flatten)]
        files: TransformFiles,
        /// Write the result here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Abort on the first failure instead of degrading to absent values.
        #[arg(long)]
        strict: bool,
        /// Apply this template to the whole input instead of `root`.
        #[arg(long)]
        start: Option<String>,
        /// JSON transformer configuration (`mode`, `maxDepth`).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Check that a template specification compiles.
    Validate {
        #[arg(short, long)]
        template: PathBuf,
    },
    /// Print the compiled form of a template specification.
    Compile {
        #[arg(short, long)]
        template: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the template, the input, the compiled form and the strict-mode result.
    Debug {
        #[command(flatten)]
        files: TransformFiles,
    },
}

#[derive(Args, Debug)]
struct TransformFiles {
    #[arg(short, long)]
    template: PathBuf,
    #[arg(short, long)]
    input: PathBuf,
}

fn read_json(path: &Path) -> Result<Value, JsonxError> {
    let text = fs::read_to_string(path).map_err(|e| {
        JsonxError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read '{}': {}", path.display(), e),
        ))
    })?;
    Ok(serde_json::from_str(&text)?)
}

fn load_spec(path: &Path) -> Result<CompiledSpec, JsonxError> {
    Ok(jsonx::compile(&read_json(path)?)?)
}

fn emit(value: &impl serde::Serialize, output: Option<&Path>) -> Result<(), JsonxError> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, text + "\n")?;
            log::info!("wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

async fn run(command: Command) -> Result<(), JsonxError> {
    match command {
        Command::Transform {
            files,
            output,
            strict,
            start,
            config,
        } => {
            let mut config = match config {
                Some(path) => TransformerConfig::from_file(path)?,
                None => TransformerConfig::default(),
            };
            if strict {
                config.mode = Mode::Strict;
            }
            let spec = load_spec(&files.template)?;
            let input = read_json(&files.input)?;
            let transformer = Transformer::builder().with_config(config).build();
            let options = TransformOptions {
                mode: None,
                start,
            };
            let report = transformer.transform_report(&input, &spec, options).await?;
            for dropped in &report.degradations {
                log::warn!("dropped: {}", dropped);
            }
            emit(&report.output, output.as_deref())
        }
        Command::Validate { template } => {
            let spec = load_spec(&template)?;
            println!(
                "OK: {} template(s), {} warning(s)",
                spec.meta.template_count,
                spec.warnings().len()
            );
            for warning in spec.warnings() {
                println!("warning: {}", warning);
            }
            Ok(())
        }
        Command::Compile { template, output } => {
            let spec = load_spec(&template)?;
            emit(&spec, output.as_deref())
        }
        Command::Debug { files } => {
            let raw = read_json(&files.template)?;
            let input = read_json(&files.input)?;
            println!("=== template ===\n{}", serde_json::to_string_pretty(&raw)?);
            println!("=== input ===\n{}", serde_json::to_string_pretty(&input)?);
            let spec = jsonx::compile(&raw)?;
            println!("=== compiled ===\n{}", serde_json::to_string_pretty(&spec)?);
            let options = TransformOptions::new().with_mode(Mode::Strict);
            match Transformer::new().transform_with(&input, &spec, options).await {
                Ok(result) => println!("=== result ===\n{}", serde_json::to_string_pretty(&result)?),
                Err(e) => println!("=== failure ===\n{}", e),
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
