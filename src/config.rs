//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.fundharvest.toml` files.

use crate::models::ReportKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".fundharvest.toml";

/// Longest accepted deadline or request timeout, in seconds (one day).
pub const MAX_TIMEOUT_SECONDS: f64 = 86_400.0;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Fetcher settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Worker pool settings.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Report selection.
    #[serde(default)]
    pub reports: ReportsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "fundharvest.json".to_string()
}

/// Report page fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Site root serving company pages.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Fetch consolidated statements (false = standalone).
    #[serde(default = "default_true")]
    pub consolidated: bool,

    /// Deadline for one report task, in seconds.
    #[serde(default = "default_timeout")]
    pub task_timeout_seconds: f64,

    /// HTTP client timeout for one page request, in seconds.
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: f64,

    /// User-Agent header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            consolidated: true,
            task_timeout_seconds: default_timeout(),
            request_timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.screener.in".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> f64 {
    2.0
}

fn default_user_agent() -> String {
    format!("fundharvest/{}", env!("CARGO_PKG_VERSION"))
}

/// Worker pool caps. Unset means one slot per subject / per report kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum subjects harvested at once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_concurrency: Option<usize>,

    /// Maximum reports fetched at once for one subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_concurrency: Option<usize>,
}

/// Which reports to harvest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Report kinds, in the order they are listed in output metadata.
    #[serde(default = "default_kinds")]
    pub kinds: Vec<ReportKind>,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            kinds: default_kinds(),
        }
    }
}

fn default_kinds() -> Vec<ReportKind> {
    ReportKind::DEFAULT.to_vec()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if let Some(ref base_url) = args.base_url {
            self.fetch.base_url = base_url.clone();
        }

        // --timeout sets both the task deadline and the HTTP timeout
        if let Some(timeout) = args.timeout {
            self.fetch.task_timeout_seconds = timeout;
            self.fetch.request_timeout_seconds = timeout;
        }

        if args.standalone {
            self.fetch.consolidated = false;
        }

        if let Some(n) = args.subject_concurrency {
            self.pool.subject_concurrency = Some(n);
        }
        if let Some(n) = args.report_concurrency {
            self.pool.report_concurrency = Some(n);
        }

        if let Some(ref kinds) = args.reports {
            self.reports.kinds = kinds.clone();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), String> {
        for (name, secs) in [
            ("task_timeout_seconds", self.fetch.task_timeout_seconds),
            ("request_timeout_seconds", self.fetch.request_timeout_seconds),
        ] {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(format!("{} must be a positive number of seconds", name));
            }
            if secs > MAX_TIMEOUT_SECONDS {
                return Err(format!("{} must be at most {} seconds", name, MAX_TIMEOUT_SECONDS));
            }
        }

        if self.pool.subject_concurrency == Some(0) || self.pool.report_concurrency == Some(0) {
            return Err("Pool concurrency caps must be at least 1".to_string());
        }

        let url = &self.fetch.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err("Base URL must start with 'http://' or 'https://'".to_string());
        }

        Ok(())
    }

    /// Report kinds with duplicates removed, first occurrence kept.
    pub fn report_kinds(&self) -> Vec<ReportKind> {
        let mut kinds = Vec::with_capacity(self.reports.kinds.len());
        for &kind in &self.reports.kinds {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
