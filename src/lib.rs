//! Role-gated retrieval-augmented generation.
//!
//! A retrieval layer over a vector-indexed document store that enforces
//! per-document access roles before any retrieved text reaches a
//! language-model prompt: nearest-neighbor search, a privilege-union
//! authorization filter, deduplicated ingestion, and an optional external
//! safety gate ahead of generation.

pub mod core;
pub mod ingest;
pub mod llm;
pub mod rag;
pub mod retrieval;
pub mod roles;
pub mod safety;
pub mod store;

pub use crate::core::config::{AppConfig, SearchTarget};
pub use crate::core::errors::RagError;
pub use crate::ingest::IngestPipeline;
pub use crate::rag::{GenerationOptions, RagOutcome, RagService};
pub use crate::retrieval::{RbacRetriever, RetrievalOptions, RetrievalOutcome};
pub use crate::roles::{Role, RoleRegistry, TaggedText};
pub use crate::store::{MongoVectorStore, RetrievalStore, RetrievedHit, StoredDocument};
