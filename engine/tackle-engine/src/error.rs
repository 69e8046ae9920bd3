//! Error types for the tackle opportunity pipeline

use thiserror::Error;

use crate::types::DefenderKey;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building the opportunity table
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A join or aggregation gained or lost rows
    #[error("Integrity failure in {stage}: expected {expected} rows, found {actual}")]
    Integrity { stage: &'static str, expected: usize, actual: usize },

    /// Player referenced by tracking data is missing from the player table
    #[error("Player {nfl_id} is not present in the player attribute table")]
    UnknownPlayer { nfl_id: i64 },

    /// Height string is not of the form "F-I"
    #[error("Player {nfl_id} has malformed height {raw:?}, expected feet-inches like \"6-2\"")]
    HeightFormat { nfl_id: i64, raw: String },

    /// More than one outcome row for the same defender on the same play
    #[error("Duplicate outcome row for {key}")]
    DuplicateOutcome { key: DefenderKey },

    /// A tracking partition failed to process
    #[error("Partition {partition} failed: {source}")]
    Partition {
        partition: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse errors
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl PipelineError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an error with the partition it came from
    pub fn partition(partition: impl Into<String>, source: PipelineError) -> Self {
        Self::Partition { partition: partition.into(), source: Box::new(source) }
    }

    /// Check a row count survived a join unchanged
    pub fn check_rows(stage: &'static str, expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::Integrity { stage, expected, actual })
        }
    }
}
