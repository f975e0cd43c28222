//! Output sinks.
//!
//! Serializes a finished aggregate as JSON or Markdown and writes it to
//! disk. Persistence is the only failure that ends a run with an error.

pub mod generator;

pub use generator::{generate_json_report, generate_markdown_report};

use crate::cli::OutputFormat;
use crate::models::{Aggregate, RunMetadata};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Why the aggregate could not be persisted.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to serialize aggregate: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes the aggregate to a file in one output format.
#[derive(Debug, Clone, Copy)]
pub struct FileSink {
    format: OutputFormat,
}

impl FileSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render the aggregate in this sink's format.
    pub fn render(
        &self,
        aggregate: &Aggregate,
        metadata: &RunMetadata,
    ) -> Result<String, SinkError> {
        match self.format {
            OutputFormat::Json => generate_json_report(aggregate),
            OutputFormat::Markdown => Ok(generate_markdown_report(aggregate, metadata)),
        }
    }

    /// Render and write to `path`, creating parent directories as needed.
    pub fn persist(
        &self,
        aggregate: &Aggregate,
        metadata: &RunMetadata,
        path: &Path,
    ) -> Result<(), SinkError> {
        let content = self.render(aggregate, metadata)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SinkError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        std::fs::write(path, content).map_err(|source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Wrote {} subjects to {}", aggregate.len(), path.display());
        Ok(())
    }
}
