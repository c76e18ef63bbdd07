//! Staysense - main entry point
//!
//! CLI over the pipeline stages: ingest, process, train, the full
//! sequence, or the prediction form.

use clap::{Parser, Subcommand};
use staysense::config::AppConfig;
use staysense::ingestion::DataIngestion;
use staysense::model::ModelTrainer;
use staysense::processing::ProcessingPipeline;
use staysense::serving::{run_server, ServingContext};
use staysense::storage::FsBlobStore;
use staysense::tracking::RunStore;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "staysense", about = "Hotel booking cancellation prediction")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Root directory of the filesystem-backed object store
    #[arg(long, default_value = "object-store")]
    store_root: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the raw dataset and split it into train/test sets
    Ingest,
    /// Fit the preprocessor, select features, persist processed data
    Process,
    /// Tune, fit, evaluate, and publish the classifier
    Train,
    /// Run ingest, process, and train in sequence
    Pipeline,
    /// Serve the prediction form over the published artifacts
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "staysense=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config)?;
    let store = FsBlobStore::new(&cli.store_root);

    match cli.command {
        Commands::Ingest => {
            run_ingest(&config, &store)?;
        }
        Commands::Process => {
            run_process(&config)?;
        }
        Commands::Train => {
            run_train(&config, &store)?;
        }
        Commands::Pipeline => {
            run_ingest(&config, &store)?;
            run_process(&config)?;
            run_train(&config, &store)?;
        }
        Commands::Serve => {
            let ctx = Arc::new(ServingContext::load(&config)?);
            run_server(config.serving.clone(), ctx).await?;
        }
    }

    Ok(())
}

fn run_ingest(config: &AppConfig, store: &FsBlobStore) -> anyhow::Result<()> {
    let report = DataIngestion::new(config.ingestion.clone()).run(store)?;
    info!(
        total = report.total_rows,
        train = report.train_rows,
        test = report.test_rows,
        "ingestion complete"
    );
    Ok(())
}

fn run_process(config: &AppConfig) -> anyhow::Result<()> {
    let report = ProcessingPipeline::new(config.processing.clone()).run(
        &config.ingestion.train_path(),
        &config.ingestion.test_path(),
    )?;
    info!(
        width = report.transformed_width,
        selected = report.selected_columns.len(),
        "processing complete"
    );
    Ok(())
}

fn run_train(config: &AppConfig, store: &FsBlobStore) -> anyhow::Result<()> {
    let run_store = RunStore::new(&config.training.runs_dir);
    let outcome = ModelTrainer::new(config.training.clone()).run(
        &config.processing.proc_train_file,
        &config.processing.proc_test_file,
        store,
        &run_store,
    )?;
    info!(
        run_id = %outcome.run_id,
        accuracy = outcome.metrics.accuracy,
        f1 = outcome.metrics.f1_score,
        model = %outcome.model_path,
        "training complete"
    );
    Ok(())
}
