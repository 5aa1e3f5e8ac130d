use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::RagError;

/// Capability: turn text into embedding vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// embed a single text
    async fn embed(&self, text: &str, model_id: &str) -> Result<Vec<f32>, RagError>;

    /// embed a batch, order-preserving and 1:1 with the input
    async fn embed_batch(&self, texts: &[String], model_id: &str)
        -> Result<Vec<Vec<f32>>, RagError>;
}

/// Capability: chat completion (non-streaming).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, request: ChatRequest, model_id: &str) -> Result<String, RagError>;
}
