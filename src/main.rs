//! sentinel-namer CLI: name every file in a JSON manifest

use clap::Parser;
use sentinel_namer::config::load_dotenv;
use sentinel_namer::{init_tracing, BatchFile, BatchOptions, NamerConfig, NamingPipeline};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sentinel-namer")]
#[command(version)]
#[command(about = "Suggest file names with AI, falling back gracefully when providers fail", long_about = None)]
struct Cli {
    /// JSON array of files: [{"id", "kind", "name"?, "extractedText"?, "imageRef"?, "options"?}]
    manifest: PathBuf,

    /// Config file (defaults to $SENTINEL_NAMER_CONFIG, then built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upper bound on files processed at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Release files back to back instead of pacing them
    #[arg(long)]
    no_pacing: bool,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => {
            load_dotenv();
            NamerConfig::load(path)?
        }
        None => NamerConfig::from_env()?,
    };

    let manifest = tokio::fs::read_to_string(&cli.manifest)
        .await
        .map_err(|e| format!("failed to read {}: {}", cli.manifest.display(), e))?;
    let files: Vec<BatchFile> = serde_json::from_str(&manifest)
        .map_err(|e| format!("invalid manifest {}: {}", cli.manifest.display(), e))?;

    let pipeline = NamingPipeline::from_config(config)?;
    let options = BatchOptions {
        max_concurrency: cli.concurrency,
        pace_releases: !cli.no_pacing,
    };

    let outcomes = pipeline
        .process_batch(files, &options, |progress| {
            tracing::info!(
                file = %progress.file_id,
                method = progress.outcome.method_used.as_str(),
                "[Batch] {}/{} ({:.0}%)",
                progress.current,
                progress.total,
                progress.percentage
            );
        })
        .await;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&outcomes)?
    } else {
        serde_json::to_string(&outcomes)?
    };
    println!("{}", json);
    Ok(())
}
