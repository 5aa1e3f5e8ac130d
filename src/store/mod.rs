//! Store abstraction over the vector-indexed document store.
//!
//! The retrieval engine and ingestion pipeline run against the
//! [`RetrievalStore`] trait; the production implementation is the MongoDB
//! Atlas adapter in the `mongo` module.

mod mongo;

pub use mongo::{BoundCollection, MongoVectorStore};

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::errors::RagError;
use crate::roles::Role;

/// A document as persisted in the store. The store assigns `_id` on insert.
#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub text: String,
    pub embedding: Vec<f32>,
    pub roles: Vec<Role>,
}

/// One similarity-search hit, projected to the requested fields.
#[derive(Debug, Clone)]
pub struct RetrievedHit {
    pub id: String,
    pub text: String,
    /// Absent when the stored document was never tagged. The retrieval
    /// engine excludes and reports these hits instead of failing.
    pub roles: Option<Vec<String>>,
    /// Relevance score as reported by the underlying search engine.
    pub score: f64,
    /// Extra projected fields, keyed by the caller-requested names.
    pub extra: HashMap<String, serde_json::Value>,
}

/// Parameters for one nearest-neighbor query.
#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub num_candidates: u32,
    pub limit: u32,
    pub extra_fields: Vec<String>,
}

/// Outcome of a role-replacement update.
#[derive(Debug, Clone, Copy)]
pub struct RoleUpdate {
    pub matched: u64,
    pub modified: u64,
}

/// The narrow store surface the pipelines need.
#[async_trait]
pub trait RetrievalStore: Send + Sync {
    /// Bulk-insert documents. Deduplication is the ingestion pipeline's
    /// concern, layered above this call.
    async fn insert_many(&self, documents: Vec<StoredDocument>) -> Result<(), RagError>;

    /// Nearest-neighbor search returning hits in descending relevance order
    /// as reported by the underlying engine. No secondary sort is applied.
    async fn vector_query(&self, query: &VectorQuery) -> Result<Vec<RetrievedHit>, RagError>;

    /// Replace the full role set of one document by id. Zero matched
    /// documents is reported through the result, not treated as fatal.
    async fn update_roles(&self, id: &str, roles: &[Role]) -> Result<RoleUpdate, RagError>;

    /// All stored document texts in the bound collection.
    async fn existing_texts(&self) -> Result<Vec<String>, RagError>;
}
