//! hazard-report - geologic hazard report data aggregation
//!
//! A CLI tool that intersects an area of interest with every configured
//! hazard map layer, gathers the related report tables, and writes a
//! Markdown or JSON hazard report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, config, network or service failure)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod progress;
mod query;
mod report;

use analysis::Orchestrator;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE};
use error::ReportError;
use models::{AreaOfInterest, Report, ReportMetadata};
use progress::ProgressTracker;
use query::{Fetcher, HttpTransport};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("hazard-report v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_report(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Report generation failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .hazard-report.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the service URL, tables, sources, and retries.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete report workflow.
async fn run_report(args: Args) -> Result<()> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    // Step 1: Read the area of interest
    let aoi_path = args.aoi.clone().unwrap_or_default();
    let aoi = read_aoi(&aoi_path)?;
    println!("📍 Area of interest: {}", aoi.description);

    // Step 2: Build the fetcher
    let transport = HttpTransport::new(config.fetch.timeout())?;
    let fetcher = Fetcher::new(transport, config.fetch.retry_policy());

    println!("🌐 Querying hazard layers...");
    println!("   Service: {}", config.service.base_url);
    println!("   Layers: {}", config.sources.len());
    println!(
        "   Attempts: {} ({}ms apart)",
        config.fetch.max_attempts, config.fetch.retry_delay_ms
    );

    // Step 3: Aggregate
    let progress = if config.general.show_progress {
        ProgressTracker::with_progress_bar()
    } else {
        ProgressTracker::new()
    };

    let orchestrator = Orchestrator::new(&fetcher, &config.service.base_url, &config.tables);
    let result = orchestrator.run(&config.sources, &aoi, &progress).await;
    progress.finish();

    if !progress.is_finished() {
        for (id, complete) in progress.snapshot() {
            if !complete {
                warn!("Unfinished task: {}", id);
            }
        }
    }

    let data = match result {
        Ok(data) => data,
        Err(ReportError::Query(e)) => {
            error!("Failing query: {}", e.url());
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    // Step 4: Build the report
    println!("\n📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let metadata = ReportMetadata {
        aoi_description: aoi.description.clone(),
        generated_at: Utc::now(),
        sources_queried: config.sources.len(),
        sources_with_results: data.sources_with_results.len(),
        hazards_found: data.hazard_code_to_units.len(),
        duration_seconds: duration,
    };
    let report = Report { metadata, data };

    // Step 5: Save the report
    let output_path = PathBuf::from(&config.general.output);
    report::write_report(&report, args.format, &output_path)?;

    // Print summary
    println!("\n📊 Report Summary:");
    println!(
        "   Layers with mapped hazards: {} of {}",
        report.metadata.sources_with_results, report.metadata.sources_queried
    );
    println!("   Hazards found: {}", report.metadata.hazards_found);
    println!("   Hazard groups: {}", report.data.group_order.len());
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Report complete! Saved to: {}",
        output_path.display()
    );

    Ok(())
}

/// Read and parse the area of interest file.
fn read_aoi(path: &Path) -> Result<AreaOfInterest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read AOI file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse AOI file: {}", path.display()))
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
