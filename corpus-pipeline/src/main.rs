use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

mod config;
mod decode;
mod discover;
mod enrich;
mod observability;
mod pipeline;

use config::AppConfig;
use pipeline::{PipelineController, RunSummary};

#[derive(Parser)]
#[command(name = "corpusprep")]
#[command(about = "Prepare domain text corpora for model training")]
#[command(version = "0.1.0")]
struct Cli {
    /// Input file or directory
    #[arg(long, short = 'i', required_unless_present = "list_formats")]
    input: Option<PathBuf>,

    /// Output corpus path (default: <output_dir>/corpus.json)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Recurse into subdirectories
    #[arg(long, short = 'r')]
    recursive: bool,

    /// Configuration file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Batch size (overrides the config file)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Worker count (overrides the config file)
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// Describe the configured pipeline without processing anything
    #[arg(long)]
    report_only: bool,

    /// List supported input formats and exit
    #[arg(long)]
    list_formats: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.apply_overrides(cli.batch_size, cli.workers) {
        eprintln!("❌ {}", e);
        return ExitCode::FAILURE;
    }

    observability::logging::init_logging(&config.global.log_level);
    if let Err(e) = observability::metrics::init() {
        info!("Metrics disabled: {}", e);
    }

    if cli.list_formats {
        println!("Supported input formats:");
        for data_type in config.supported_data_types() {
            println!("  .{}", data_type.as_str());
        }
        return ExitCode::SUCCESS;
    }

    match run(cli, config).await {
        Ok(Some(summary)) => {
            println!("🎉 Corpus ready: {}", summary.corpus_path.display());
            println!(
                "   {} chunks, {} QA pairs, {} item failures (report: {})",
                summary.total_chunks,
                summary.total_qa_pairs,
                summary.item_failures,
                summary.report_path.display()
            );
            // Item-level failures do not fail the process; fatal errors do.
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ Pipeline aborted: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns None for the modes that stop before processing.
async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<Option<RunSummary>> {
    let mut controller =
        PipelineController::new(config.clone()).context("failed to initialize pipeline")?;

    if cli.report_only {
        let description = controller.describe();
        println!("{}", serde_json::to_string_pretty(&description)?);
        return Ok(None);
    }

    let input = cli.input.expect("clap enforces --input");
    let inputs = discover::resolve_inputs(&input, cli.recursive, &config.supported_data_types())?;
    info!("📥 Resolved {} input files from {}", inputs.len(), input.display());

    let output_path = cli
        .output
        .unwrap_or_else(|| PathBuf::from(&config.global.output_dir).join("corpus.json"));

    let summary = controller.run(&inputs, &output_path).await?;
    Ok(Some(summary))
}
