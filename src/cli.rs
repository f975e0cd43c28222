//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::MAX_TIMEOUT_SECONDS;
use crate::models::{ReportKind, Subject};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// fundharvest - concurrent harvester of company financial reports
///
/// Fetches every requested report section for every ticker in parallel,
/// with a per-report deadline. Failed or slow reports come back as empty
/// tables; the run always covers every ticker.
///
/// Examples:
///   fundharvest TCS INFY
///   fundharvest --tickers-file nifty50.txt --reports profit-loss,quarters
///   fundharvest TCS --format markdown -o tcs.md
///   fundharvest TCS INFY --dry-run
///   fundharvest --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Ticker symbols to harvest
    #[arg(value_name = "TICKER")]
    pub tickers: Vec<String>,

    /// File with one ticker per line ('#' starts a comment)
    #[arg(short = 'f', long, value_name = "FILE")]
    pub tickers_file: Option<PathBuf>,

    /// Report kinds to fetch (comma-separated)
    ///
    /// Example: --reports profit-loss,balance-sheet,quarters
    #[arg(short, long, value_name = "KINDS", value_delimiter = ',')]
    pub reports: Option<Vec<ReportKind>>,

    /// Output file path
    ///
    /// Default: from config or fundharvest.json
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (json, markdown)
    #[arg(long, default_value = "json", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .fundharvest.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Deadline for each report fetch, in seconds
    ///
    /// Also used as the HTTP request timeout. Default: from config or 2s.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Site root serving company pages
    #[arg(long, value_name = "URL", env = "FUNDHARVEST_BASE_URL")]
    pub base_url: Option<String>,

    /// Fetch standalone instead of consolidated statements
    #[arg(long)]
    pub standalone: bool,

    /// Maximum tickers harvested at once (default: all of them)
    #[arg(long, value_name = "NUM")]
    pub subject_concurrency: Option<usize>,

    /// Maximum reports fetched at once per ticker (default: all of them)
    #[arg(long, value_name = "NUM")]
    pub report_concurrency: Option<usize>,

    /// Print the planned (ticker, report) fetches and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .fundharvest.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Exit with code 2 if any report table is empty
    #[arg(long)]
    pub fail_on_empty: bool,
}

/// Output format for the harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Nested JSON maps (default)
    #[default]
    Json,
    /// Markdown tables
    Markdown,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.tickers.is_empty() && self.tickers_file.is_none() {
            return Err("At least one ticker (or --tickers-file) is required".to_string());
        }

        if let Some(ref path) = self.tickers_file {
            if !path.is_file() {
                return Err(format!("Tickers file does not exist: {}", path.display()));
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err("Timeout must be a positive number of seconds".to_string());
            }
            if timeout > MAX_TIMEOUT_SECONDS {
                return Err(format!("Timeout must be at most {} seconds", MAX_TIMEOUT_SECONDS));
            }
        }

        if self.subject_concurrency == Some(0) || self.report_concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if matches!(self.reports, Some(ref kinds) if kinds.is_empty()) {
            return Err("At least one report kind is required".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `[general] verbose`; -q still wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Whether to draw the progress bar.
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.no_progress
    }

    /// Tickers from the command line followed by the tickers file,
    /// trimmed and de-duplicated.
    pub fn subjects(&self) -> Result<Vec<Subject>> {
        let mut all = self.tickers.clone();

        if let Some(ref path) = self.tickers_file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read tickers file: {}", path.display()))?;
            all.extend(parse_ticker_list(&content));
        }

        Ok(dedup_subjects(all))
    }
}

/// Parse a ticker list: one per line, blank lines and `#` comments ignored.
pub fn parse_ticker_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Trim tickers and drop blanks and repeats, keeping first occurrences.
pub fn dedup_subjects(tickers: Vec<String>) -> Vec<Subject> {
    let mut subjects: Vec<Subject> = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        let ticker = ticker.trim();
        if !ticker.is_empty() && !subjects.iter().any(|s| s == ticker) {
            subjects.push(ticker.to_string());
        }
    }
    subjects
}
