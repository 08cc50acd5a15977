use thiserror::Error;

/// Errors raised by the document store.
#[derive(Debug, Error)]
pub enum DbError {
    /// A unique field already holds the value being written.
    #[error("duplicate value for unique field `{field}`")]
    Duplicate { field: &'static str },

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}
