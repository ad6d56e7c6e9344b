//! psq-ingest - LIMS batch resolution and pesticide residue computation
//!
//! Subcommands:
//! - `process`: resolve batches, read the raw-results workbook, compute and
//!   optionally export per-sample reports
//! - `fetch`: resolve batches and print the sample records
//! - `search`: list recent samples whose batch text matches

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use psq_common::config::{load_or_default, resolve_config_path};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use psq_ingest::config::{LimsOverrides, LimsSettings};
use psq_ingest::lims::sample_builder::DEFAULT_SEARCH_PAGE_SIZE;
use psq_ingest::lims::{BatchResolver, LimsClient, SampleRecordBuilder, WeightExtractor};
use psq_ingest::workflow::WorkflowRequest;
use psq_ingest::{BatchProcessWorkflow, WorkflowEvent};

/// Command-line arguments for psq-ingest
#[derive(Parser, Debug)]
#[command(name = "psq-ingest")]
#[command(about = "Resolve LIMS batches and compute pesticide residue results")]
#[command(version)]
struct Args {
    /// Config file (default: $PSQ_CONFIG, then <config_dir>/psq/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// LIMS base URL, e.g. https://lab.qbench.net/qbench
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// LIMS API client id
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// LIMS API client secret
    #[arg(long, global = true)]
    client_secret: Option<String>,

    /// Maximum sample ids taken from each batch (0 = no cap)
    #[arg(long, global = true)]
    max_samples: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute residue results for one or more batches
    Process {
        /// Batch identifier (repeatable)
        #[arg(short, long = "batch", required = true, num_args = 1..)]
        batches: Vec<String>,

        /// Workbook containing the "raw results" worksheet
        #[arg(short, long)]
        workbook: PathBuf,

        /// Directory for per-sample reports (default: output_dir from config)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the sample records of one or more batches as JSON
    Fetch {
        #[arg(short, long = "batch", required = true, num_args = 1..)]
        batches: Vec<String>,
    },

    /// Search recent samples by batch number text
    Search {
        #[arg(long)]
        batch_number: String,

        /// Samples listed before filtering
        #[arg(long, default_value_t = DEFAULT_SEARCH_PAGE_SIZE)]
        page_size: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let toml_config = load_or_default(config_path.as_deref()).context("Failed to load config file")?;

    let level = args.log_level.clone().unwrap_or_else(|| toml_config.logging.level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting psq-ingest v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("PSQ_GIT_HASH"),
        env!("PSQ_BUILD_TIMESTAMP"),
        env!("PSQ_BUILD_PROFILE")
    );
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    let overrides = LimsOverrides {
        base_url: args.base_url.clone(),
        client_id: args.client_id.clone(),
        client_secret: args.client_secret.clone(),
        page_size: args.max_samples,
    };
    let settings = LimsSettings::resolve(&overrides, &toml_config.lims)?;
    let client = LimsClient::new(&settings)?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            ctrl_c_token.cancel();
        }
    });

    match args.command {
        Command::Process { batches, workbook, out } => {
            let output_dir = out.or(toml_config.output_dir);
            run_process(client, settings, cancel, WorkflowRequest {
                batches,
                workbook,
                output_dir,
            })
            .await
        }
        Command::Fetch { batches } => run_fetch(&client, &settings, &batches, &cancel).await,
        Command::Search { batch_number, page_size } => {
            run_search(&client, &settings, &batch_number, page_size).await
        }
    }
}

async fn run_process(
    client: LimsClient,
    settings: LimsSettings,
    cancel: CancellationToken,
    request: WorkflowRequest,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::channel::<WorkflowEvent>(100);
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                WorkflowEvent::BatchResolved { diagnostic } => eprintln!("{}", diagnostic),
                WorkflowEvent::ReadingWorkbook { path } => eprintln!("Reading {}", path),
                WorkflowEvent::Computing { readings } => eprintln!("Processing {} readings", readings),
                WorkflowEvent::Exporting { samples } => eprintln!("Exporting {} reports", samples),
                WorkflowEvent::Started { .. } | WorkflowEvent::Completed { .. } => {}
            }
        }
    });

    let workflow = BatchProcessWorkflow::new(client, settings)
        .with_events(event_tx)
        .with_cancellation(cancel);
    let outcome = workflow.run(&request).await;
    drop(workflow);
    let _ = printer.await;
    let outcome = outcome?;

    println!("sample\tcomponent\tstatus\tdil");
    for row in &outcome.display_rows {
        println!("{}\t{}\t{}\t{}", row.sample, row.component, row.status, row.dil);
    }
    eprintln!("{} samples processed", outcome.sample_count);
    for path in &outcome.exported {
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

async fn run_fetch(
    client: &LimsClient,
    settings: &LimsSettings,
    batches: &[String],
    cancel: &CancellationToken,
) -> Result<()> {
    let resolver = BatchResolver::new(client, settings.page_size);
    let builder = SampleRecordBuilder::new(client, WeightExtractor::new(settings.reference_mass));

    let mut report = Vec::with_capacity(batches.len());
    for batch_id in batches {
        let batch = builder
            .fetch_batch_samples(&resolver, batch_id, cancel)
            .await
            .with_context(|| format!("Batch {}", batch_id))?;
        eprintln!("{}", batch.diagnostic);
        for failure in &batch.failures {
            eprintln!("  {}", failure);
        }
        report.push(serde_json::json!({
            "batch_id": batch.batch_id,
            "diagnostic": batch.diagnostic,
            "records": batch.records,
        }));
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_search(client: &LimsClient, settings: &LimsSettings, batch_number: &str, page_size: usize) -> Result<()> {
    let builder = SampleRecordBuilder::new(client, WeightExtractor::new(settings.reference_mass));
    let (matches, diagnostic) = builder.search_samples_by_batch(batch_number, page_size).await?;

    eprintln!("{}", diagnostic);
    println!("{}", serde_json::to_string_pretty(&matches)?);
    Ok(())
}
