//! Ingestion pipeline: embed, tag, deduplicate, bulk insert.

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::errors::RagError;
use crate::llm::EmbeddingProvider;
use crate::roles::TaggedText;
use crate::store::{RetrievalStore, StoredDocument};

/// Pipeline that embeds roled texts and loads them into the bound collection.
///
/// Deduplication is by exact text equality against what the store already
/// holds. The dedup-then-insert window is not atomic across concurrent
/// ingesters; a race can admit duplicate texts.
pub struct IngestPipeline {
    store: Arc<dyn RetrievalStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    embedding_model: String,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn RetrievalStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            embedding_model: embedding_model.into(),
        }
    }

    /// Embed and insert a batch, returning how many documents were written.
    ///
    /// With `dedup`, items whose text exactly matches an already-stored text
    /// are dropped first. An insert that would write nothing fails with
    /// [`RagError::EmptyBatch`] instead of silently succeeding.
    pub async fn ingest(&self, batch: Vec<TaggedText>, dedup: bool) -> Result<usize, RagError> {
        let texts: Vec<String> = batch.iter().map(|item| item.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts, &self.embedding_model).await?;
        if embeddings.len() != batch.len() {
            return Err(RagError::Provider(format!(
                "embedding count mismatch: {} inputs, {} vectors",
                batch.len(),
                embeddings.len()
            )));
        }

        let mut pending: Vec<StoredDocument> = batch
            .into_iter()
            .zip(embeddings)
            .map(|(item, embedding)| StoredDocument {
                text: item.text,
                embedding,
                roles: item.roles,
            })
            .collect();

        if dedup {
            let existing: HashSet<String> =
                self.store.existing_texts().await?.into_iter().collect();
            pending.retain(|document| !existing.contains(&document.text));
        }

        if pending.is_empty() {
            return Err(RagError::EmptyBatch);
        }

        let inserted = pending.len();
        self.store.insert_many(pending).await?;
        tracing::debug!("inserted {} documents", inserted);
        Ok(inserted)
    }
}
