use thiserror::Error;

/// Error taxonomy for the shot-prediction pipeline.
///
/// Everything here is fatal to the stage that raises it; the only
/// non-error degradation in the pipeline (skipping metrics when no labeled
/// rows exist) is handled with a warning at the call site instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    // Schema errors
    #[error("required column '{0}' is missing from the input snapshot")]
    MissingColumn(String),

    #[error("column '{column}' has {count} row(s) with missing values")]
    IncompleteFeature { column: String, count: usize },

    #[error("label column '{column}' has {observed} observed class(es); a stratified split needs both")]
    SingleClassLabel { column: String, observed: usize },

    // Model artifact errors
    #[error("model artifact rejected: {0}")]
    InvalidArtifact(String),

    #[error("training produced no usable candidate model")]
    NoCandidate,

    // Wrapped I/O and codec errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] polars::error::PolarsError),

    #[error("model serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
