//! CLI entry point for the road roughness job.
//!
//! One invocation processes one city over one lookback window: passes are
//! read from the pass store (or a local CSV), turned into segment baselines,
//! vehicle calibrations and graded segment scores, and written back to the
//! document store unless `--dry-run` is given.

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use road_roughness::analyzers::analyzer::{RunOptions, analyze_city};
use road_roughness::config::{PipelineConfig, parse_days};
use road_roughness::fetch::BasicClient;
use road_roughness::fetch::auth::ApiKey;
use road_roughness::infra::csv_passes::CsvPassStore;
use road_roughness::infra::firestore::{FirestoreClient, FirestoreSettings};
use road_roughness::output::print_json;
use road_roughness::services::document_store::DocumentStore;
use road_roughness::services::pass_store::PassStore;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "road_roughness")]
#[command(about = "Computes per-city road roughness baselines, calibrations and grades", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the roughness pipeline for one city
    Run {
        /// City whose passes are processed
        #[arg(value_name = "CITY_ID")]
        city_id: String,

        /// Lookback window in days (default 30; invalid values fall back to it)
        #[arg(long, value_name = "N", allow_hyphen_values = true)]
        days: Option<String>,

        /// Document store project (defaults to GOOGLE_CLOUD_PROJECT)
        #[arg(long, value_name = "ID")]
        project: Option<String>,

        /// Compute and log everything but write nothing
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Run date used for dated documents (defaults to today, UTC)
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,

        /// Read passes from a local CSV instead of the pass store
        #[arg(long, value_name = "CSV")]
        input: Option<String>,

        /// JSON file with pipeline tunables
        #[arg(long, value_name = "PATH")]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/road_roughness.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("road_roughness.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            city_id,
            days,
            project,
            dry_run,
            date,
            input,
            config,
        } => {
            let args = RunArgs {
                city_id,
                days,
                project,
                dry_run,
                date,
                input,
                config,
            };
            if let Err(e) = run(args).await {
                error!(error = %format!("{e:#}"), "Run failed");
                return Err(e);
            }
        }
    }

    Ok(())
}

struct RunArgs {
    city_id: String,
    days: Option<String>,
    project: Option<String>,
    dry_run: bool,
    date: Option<NaiveDate>,
    input: Option<String>,
    config: Option<String>,
}

async fn run(args: RunArgs) -> Result<()> {
    let base = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(raw) = args.days.as_deref() {
        if parse_days(Some(raw)).is_none() {
            warn!(days = raw, default = base.lookback_days, "Invalid --days, using default");
        }
    }
    let config = base.with_days_arg(args.days.as_deref());

    let mut options = RunOptions::new(&args.city_id, Utc::now(), config);
    if let Some(date) = args.date {
        options.run_date = date.format("%Y-%m-%d").to_string();
    }

    // The document store is needed to read passes (no --input) or to write.
    let firestore = if args.input.is_none() || !args.dry_run {
        Some(connect_firestore(args.project, &options.config)?)
    } else {
        None
    };

    let csv_store;
    let passes: &dyn PassStore = match (&args.input, &firestore) {
        (Some(path), _) => {
            csv_store = CsvPassStore::load(path)?;
            info!(path = %path, rows = csv_store.len(), "Reading passes from CSV");
            &csv_store
        }
        (None, Some(store)) => store,
        (None, None) => bail!("no pass source configured"),
    };

    let sink: Option<&dyn DocumentStore> = if args.dry_run {
        None
    } else {
        Some(firestore.as_ref().context("no document store configured")?)
    };

    info!(
        city_id = %options.city_id,
        run_date = %options.run_date,
        lookback_days = options.config.lookback_days,
        dry_run = args.dry_run,
        "Starting roughness run"
    );

    let summary = analyze_city(passes, sink, &options).await?;
    print_json(&summary)?;

    info!(city_id = %options.city_id, "Run complete");
    Ok(())
}

fn connect_firestore(
    project: Option<String>,
    config: &PipelineConfig,
) -> Result<FirestoreClient<ApiKey<BasicClient>>> {
    let project_id = project
        .or_else(|| std::env::var("GOOGLE_CLOUD_PROJECT").ok())
        .filter(|p| !p.trim().is_empty())
        .context("a project is required: pass --project or set GOOGLE_CLOUD_PROJECT")?;

    let settings = FirestoreSettings {
        project_id,
        emulator_host: std::env::var("FIRESTORE_EMULATOR_HOST").ok(),
        access_token: std::env::var("FIRESTORE_ACCESS_TOKEN").ok(),
        pass_collection: config.pass_collection.clone(),
        page_size: config.page_size,
    };

    Ok(FirestoreClient::connect(settings).context("connecting to the document store")?)
}
