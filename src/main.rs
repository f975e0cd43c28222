//! fundharvest - concurrent company report harvester
//!
//! A CLI tool that fetches financial report tables for many tickers at
//! once, bounding every report fetch with a deadline, and writes the
//! merged result as JSON or Markdown.
//!
//! Exit codes:
//!   0 - Success (empty tables are allowed unless --fail-on-empty is set)
//!   1 - Runtime error (bad config, invalid URL, output not writable, etc.)
//!   2 - Empty tables found with --fail-on-empty

mod analysis;
mod cli;
mod config;
mod fetcher;
mod harvest;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use fetcher::{FetcherConfig, HtmlReportFetcher, ReportFetcher};
use harvest::{HarvestConfig, Orchestrator};
use models::{ReportKind, RunMetadata, Subject};
use report::FileSink;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

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

    // Load configuration; `[general] verbose` feeds the log level
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("fundharvest v{}", env!("CARGO_PKG_VERSION"));
    source.log();
    debug!("Arguments: {:?}", args);

    match run_harvest(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Harvest failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .fundharvest.toml.
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
    println!("   Edit it to customize the source site, deadlines, pool caps and reports.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` takes precedence over the -v/-q flags when set.
fn init_logging(level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
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

/// Run the complete harvest workflow. Returns exit code (0 or 2).
async fn run_harvest(args: Args, config: Config) -> Result<i32> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let subjects = args.subjects()?;
    if subjects.is_empty() {
        anyhow::bail!("No tickers to harvest");
    }
    let kinds = config.report_kinds();

    // Handle --dry-run: list planned fetches and exit
    if args.dry_run {
        return Ok(handle_dry_run(&subjects, &kinds, &config));
    }

    let fetcher = HtmlReportFetcher::new(FetcherConfig::from(&config))
        .context("Failed to set up report fetcher")?;
    let fetcher: Arc<dyn ReportFetcher> = Arc::new(fetcher);

    let harvest_config = HarvestConfig {
        show_progress: args.show_progress(),
        ..HarvestConfig::from(&config)
    };

    println!("🌾 Harvesting reports...");
    println!("   Source: {}", config.fetch.base_url);
    println!(
        "   Tickers: {} | Reports: {}",
        subjects.len(),
        kinds.len()
    );
    println!("   Deadline: {}s per report\n", config.fetch.task_timeout_seconds);

    let run_date = Utc::now();
    let start_time = Instant::now();
    let aggregate = Orchestrator::new(fetcher, harvest_config)
        .run(&subjects, &kinds)
        .await;
    let duration = start_time.elapsed().as_secs_f64();

    let summary = analysis::HarvestSummary::from_aggregate(&aggregate);
    let metadata = RunMetadata {
        run_date,
        source: config.fetch.base_url.clone(),
        subjects_requested: subjects.len(),
        report_kinds: kinds.clone(),
        tables_with_data: summary.tables_with_data,
        empty_tables: summary.empty_tables,
        duration_seconds: duration,
    };

    // Persist the aggregate
    let output_path = output_path(&config, &args);
    FileSink::new(args.format)
        .persist(&aggregate, &metadata, &output_path)
        .context("Failed to persist harvest")?;

    // Print summary
    println!("\n📊 Harvest Summary:");
    for line in analysis::generate_summary_text(&summary).lines() {
        println!("   {}", line);
    }
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Harvest complete! Saved to: {}",
        output_path.display()
    );

    if args.fail_on_empty && summary.empty_tables > 0 {
        for (subject, kind) in analysis::empty_pairs(&aggregate) {
            warn!(subject = %subject, report = %kind, "empty table");
        }
        eprintln!(
            "\n⛔ {} empty table(s) found. Failing (exit code 2).",
            summary.empty_tables
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: print the planned fetches, exit without network access.
fn handle_dry_run(subjects: &[Subject], kinds: &[ReportKind], config: &Config) -> i32 {
    println!("\n🔍 Dry run: planned fetches (no network calls)...\n");
    println!("   Source: {}", config.fetch.base_url);
    println!(
        "   Statements: {}",
        if config.fetch.consolidated {
            "consolidated"
        } else {
            "standalone"
        }
    );
    println!("   Deadline: {}s per report\n", config.fetch.task_timeout_seconds);

    for subject in subjects {
        let kinds: Vec<_> = kinds.iter().map(|k| k.as_str()).collect();
        println!("     📄 {}: {}", subject, kinds.join(", "));
    }

    println!(
        "\n   Total: {} fetches across {} tickers",
        subjects.len() * kinds.len(),
        subjects.len()
    );
    println!("\n✅ Dry run complete. No requests were made.");
    0
}

/// Output path from config, switching the default name to `.md` for Markdown.
fn output_path(config: &Config, args: &Args) -> PathBuf {
    let path = PathBuf::from(&config.general.output);
    if args.output.is_none()
        && args.format == OutputFormat::Markdown
        && path.extension().is_some_and(|ext| ext == "json")
    {
        return path.with_extension("md");
    }
    path
}

/// Where the configuration came from, logged once the subscriber is up.
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile,
    Defaults,
    Unreadable(String),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE),
            ConfigSource::Defaults => debug!("No config file found, using defaults"),
            ConfigSource::Unreadable(e) => warn!("Failed to load config: {}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigSource::Defaults)),
        Err(e) => Ok((Config::default(), ConfigSource::Unreadable(format!("{:#}", e)))),
    }
}
