use thiserror::Error;

/// Errors that can occur in boxsqel.
#[derive(Error, Debug)]
pub enum Error {
    /// Tensor backend error (shape/dtype mismatches, device failures).
    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),
    /// IO error while persisting or loading snapshots.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A normal-form pool required by the model is absent from the dataset.
    #[error("missing axiom pool: {0}")]
    MissingPool(String),
    /// A pool that must be non-empty (nf1-nf4, negatives, class ids) is empty.
    #[error("empty axiom pool: {0}")]
    EmptyPool(String),
}

/// Result type alias for boxsqel.
pub type Result<T> = std::result::Result<T, Error>;
