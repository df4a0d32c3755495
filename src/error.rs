// ⚠️ Error types - shared by both pipelines
// Library code returns SurveyError; the binaries wrap it in anyhow with context.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurveyError {
    /// Row 0 of the survey sheet has no cell equal to the site name
    #[error("No surveys found for site {site} for requested species")]
    SiteNotFound { site: String },

    /// Species is not one of the configured stores
    #[error("unknown species {0}")]
    UnknownSpecies(String),

    /// Non-blank survey cell that is not a recognizable date
    #[error("invalid survey date {value:?} at row {row}, column {column}")]
    InvalidDate {
        row: usize,
        column: usize,
        value: String,
    },

    /// Could not open the sighting store
    #[error("failed to connect to sighting store {path}: {source}")]
    StoreConnection {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query against an open store failed
    #[error("sighting store query failed: {0}")]
    Store(#[from] rusqlite::Error),

    /// Photo directory must be created fresh for each harvest
    #[error("Failed to create new empty directory {0} to collect photos")]
    OutputDirectoryExists(PathBuf),

    /// Cohort encoding needs integral size classes
    #[error("size {size} recorded for {individual} on {date} is not a reconciled size class")]
    UnreconciledSize {
        individual: String,
        date: NaiveDate,
        size: f64,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for library operations
pub type Result<T> = std::result::Result<T, SurveyError>;
