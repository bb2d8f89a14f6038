//! Mediakit CLI: inspect media and run transformation pipelines from the shell.
//!
//! Configuration comes from the environment (see `MediaConfig::from_env`).

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use mediakit_cli::{init_tracing, parse_stage_spec, truncate_string};
use mediakit_core::{ErrorMetadata, LogLevel, MediaConfig, MediaError, MediaFormat};
use mediakit_processing::{ExportService, MediaCodec, OperationRegistry, Pipeline, PipelineWorker};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "mediakit", about = "Media transformation pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available operations and their parameters
    Operations {
        /// Print a compact table instead of JSON
        #[arg(long)]
        table: bool,
    },
    /// Decode a file and print its properties
    Probe {
        /// Path to the media file
        file: PathBuf,
    },
    /// Run a pipeline on a file and write the result
    Apply {
        /// Path to the input file
        input: PathBuf,
        /// Stage as name[:key=value,...]; repeat in application order
        #[arg(long = "op", value_name = "STAGE")]
        ops: Vec<String>,
        /// Where to write the result
        #[arg(long, short)]
        output: PathBuf,
        /// Output format (defaults to the output file extension)
        #[arg(long)]
        format: Option<String>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn format_of(path: &Path, explicit: Option<&str>) -> anyhow::Result<MediaFormat> {
    match explicit {
        Some(name) => MediaFormat::parse(name).map_err(|e| anyhow!(e)),
        None => MediaFormat::from_path(path)
            .with_context(|| format!("Cannot tell the format of {}", path.display())),
    }
}

/// Log a core error with its code and hint, then hand it to anyhow
fn report(err: impl Into<MediaError>) -> anyhow::Error {
    let err = err.into();
    match err.log_level() {
        LogLevel::Error => tracing::error!(code = err.error_code(), error = %err, "Request failed"),
        LogLevel::Warn => tracing::warn!(code = err.error_code(), error = %err, "Request failed"),
        LogLevel::Debug => tracing::debug!(code = err.error_code(), error = %err, "Request failed"),
    }
    if let Some(action) = err.suggested_action() {
        eprintln!("hint: {}", action);
    }
    anyhow!(err.user_message())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = MediaConfig::from_env().context("Invalid media configuration")?;
    init_tracing(config.is_production());

    let cli = Cli::parse();
    let registry = Arc::new(OperationRegistry::with_builtins(&config)?);
    let codec = MediaCodec::new(&config);

    match cli.command {
        Commands::Operations { table } => {
            let operations = registry.describe_all();
            if table {
                println!("{:<20} {:<14} {:<40} PARAMETERS", "NAME", "APPLIES TO", "SUMMARY");
                for op in &operations {
                    let params: Vec<&str> = op.parameters.iter().map(|p| p.name).collect();
                    println!(
                        "{:<20} {:<14} {:<40} {}",
                        op.name.to_string(),
                        op.applies_to.to_string(),
                        truncate_string(op.summary, 40),
                        params.join(", ")
                    );
                }
            } else {
                print_json(&operations)?;
            }
        }
        Commands::Probe { file } => {
            let format = format_of(&file, None)?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let asset = tokio::task::spawn_blocking(move || codec.decode(&bytes, format))
                .await?
                .map_err(report)?;
            print_json(&asset.summary())?;
        }
        Commands::Apply {
            input,
            ops,
            output,
            format,
        } => {
            let input_format = format_of(&input, None)?;
            let output_format = format_of(&output, format.as_deref())?;

            let bytes = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let decoder = codec.clone();
            let asset = tokio::task::spawn_blocking(move || decoder.decode(&bytes, input_format))
                .await?
                .map_err(report)?;

            let mut pipeline = Pipeline::new(registry.clone(), asset.kind());
            for op in &ops {
                let stage = parse_stage_spec(op)?;
                pipeline
                    .add_stage_str(&stage.name, &stage.params)
                    .map_err(report)
                    .with_context(|| format!("Invalid stage '{}'", op))?;
            }
            tracing::info!(
                input = %input.display(),
                stages = pipeline.len(),
                output_kind = %pipeline.output_kind(),
                "Pipeline ready"
            );

            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, stopping after the current stage");
                    interrupt.cancel();
                }
            });

            let job = PipelineWorker::new(1).spawn_with_token(pipeline, asset, cancel);
            let result = job.wait().await?.into_result().map_err(report)?;

            let exporter = ExportService::new(codec);
            let target = output.clone();
            let written = tokio::task::spawn_blocking(move || -> anyhow::Result<u64> {
                let export = exporter.export(&result, output_format).map_err(report)?;
                let mut file = std::fs::File::create(&target)
                    .with_context(|| format!("Failed to create {}", target.display()))?;
                Ok(export.write_to(&mut file)?)
            })
            .await??;

            tracing::info!(output = %output.display(), size_bytes = written, "Result written");
        }
    }

    Ok(())
}
