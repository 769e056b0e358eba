//! tagmetry - dataset analysis CLI
//!
//! Thin wrapper over the analysis engine: parses arguments into an
//! `AnalysisRequest`, streams progress to the log, and maps the outcome to
//! exit codes (0 success, 1 analysis error, 2 bad arguments - the latter
//! handled by clap).

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tagmetry_analysis::run_analysis;
use tagmetry_common::api::AnalysisRequest;
use tagmetry_common::events::{FnSink, JobState};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Tagmetry - local tag-health analytics for image datasets"
)]
struct Args {
    /// Dataset root directory to analyze
    input_dir: PathBuf,

    /// Artifact directory (default: <input_dir>/tagmetry-out)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Recommendation ruleset file, JSON or YAML
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Skip exact/near duplicate detection
    #[arg(long)]
    skip_duplicates: bool,

    /// Skip tag normalization and metrics
    #[arg(long)]
    skip_metrics: bool,

    /// Skip recommendation evaluation
    #[arg(long)]
    skip_recommendations: bool,

    /// Log verbosely
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting tagmetry analysis");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Dataset: {}", args.input_dir.display());

    let request = AnalysisRequest {
        input_dir: args.input_dir,
        output_dir: args.output_dir,
        rules_path: args.rules,
        enable_duplicate_detection: !args.skip_duplicates,
        enable_tag_metrics: !args.skip_metrics,
        enable_recommendations: !args.skip_recommendations,
    };

    // Ctrl-C trips the cancellation token; the engine unwinds cooperatively.
    let cancel_token = CancellationToken::new();
    {
        let cancel_token = cancel_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling analysis");
                cancel_token.cancel();
            }
        });
    }

    let sink = Arc::new(FnSink(|update: tagmetry_common::events::ProgressUpdate| {
        info!(
            stage = %update.stage,
            percent = update.percent,
            "{}",
            update.message
        );
    }));

    let outcome = run_analysis(request, sink, cancel_token).await;

    match outcome.state {
        JobState::Completed => {
            for (name, path) in &outcome.outputs {
                info!(artifact = name, path = %path, "Artifact");
            }
            info!("Analysis completed");
            Ok(ExitCode::SUCCESS)
        }
        JobState::Cancelled => {
            warn!("Analysis cancelled");
            Ok(ExitCode::from(1))
        }
        JobState::Failed => {
            eprintln!(
                "tagmetry: analysis failed: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            );
            Ok(ExitCode::from(1))
        }
    }
}
