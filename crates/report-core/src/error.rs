use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the component report tool.
#[derive(Error, Debug)]
pub enum ReportError {
    /// A report file could not be created or written.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A remote API call failed or answered with a non-success status.
    #[error("{source_name} request failed for {file_id}{}: {message}", status_suffix(.status))]
    Api {
        source_name: String,
        file_id: String,
        status: Option<u16>,
        message: String,
    },

    /// The reporting period string is not one of the recognised forms.
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// No file identifiers were supplied on the command line.
    #[error("No file IDs provided. Please provide at least one file ID.")]
    NoFileIds,

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReportError {
    /// Build an [`ReportError::Api`] for `source_name` / `file_id`.
    pub fn api(
        source_name: impl Into<String>,
        file_id: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        ReportError::Api {
            source_name: source_name.into(),
            file_id: file_id.into(),
            status,
            message: message.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {})", code),
        None => String::new(),
    }
}

/// Convenience alias used throughout the report crates.
pub type Result<T> = std::result::Result<T, ReportError>;
