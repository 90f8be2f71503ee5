use thiserror::Error;

/// Failure taxonomy for the import/report pipeline.
///
/// Decode failures are fatal to a single file, never to the process.
/// `InvalidAggregationSpec` is a programmer error and is surfaced
/// immediately rather than silently returning zero buckets. Per-row
/// extraction failures never appear here at all: they are logged,
/// counted, and skipped at the row level.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to decode {name}: {reason}")]
    Decode { name: String, reason: String },

    #[error("invalid aggregation spec: unknown field `{field}`")]
    InvalidAggregationSpec { field: String },

    #[error("import `{id}` not found")]
    ImportNotFound { id: String },

    #[error("no current import is set")]
    NoCurrentImport,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub fn decode(name: &str, reason: impl ToString) -> Self {
        PipelineError::Decode {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
