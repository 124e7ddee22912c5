use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a pipeline stage.
///
/// Unparseable dates and counts are not errors; the loader coerces them to
/// `None` and reports how many it saw.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The source dataset is missing or unreadable.
    #[error("Failed to read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A stage ran before the stage that populates its input.
    #[error("Stage '{stage}' requires {requires}; run that step first")]
    Precondition {
        stage: &'static str,
        requires: &'static str,
    },

    /// A directory could not be created or a file could not be written.
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
