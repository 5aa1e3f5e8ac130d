use thiserror::Error;

/// Errors surfaced by the retrieval, ingestion, and generation pipelines.
///
/// A retrieved document missing its role tags is deliberately not an error:
/// the retrieval engine excludes and reports such hits while the rest of the
/// request proceeds.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("store connection failed: {0}")]
    Connection(String),
    #[error("target not found: {0}")]
    TargetNotFound(String),
    #[error("embedding field '{field}' does not exist in any document in collection '{collection}'")]
    FieldNotIndexed { field: String, collection: String },
    #[error("no documents to upload after deduplication")]
    EmptyBatch,
    #[error("provider error: {0}")]
    Provider(String),
    #[error("store error: {0}")]
    Store(String),
}

impl RagError {
    pub fn provider<E: std::fmt::Display>(err: E) -> Self {
        RagError::Provider(err.to_string())
    }

    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        RagError::Store(err.to_string())
    }
}
