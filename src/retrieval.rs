//! RBAC retrieval engine: vector search followed by a privilege-union filter.

use std::sync::Arc;

use crate::core::errors::RagError;
use crate::roles::Role;
use crate::store::{RetrievalStore, RetrievedHit, VectorQuery};

/// Knobs for one retrieval request.
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Internal candidates requested from the nearest-neighbor engine.
    /// Must be at least `limit`.
    pub num_candidates: u32,
    /// Hits returned, by descending relevance.
    pub limit: u32,
    /// Extra stored fields to project into each hit.
    pub extra_fields: Vec<String>,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            num_candidates: 50,
            limit: 5,
            extra_fields: Vec::new(),
        }
    }
}

/// Authorized hits plus the ids of hits that carried no role tags at all.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub hits: Vec<RetrievedHit>,
    pub missing_roles: Vec<String>,
}

/// Engine enforcing document-level role checks after vector search.
pub struct RbacRetriever {
    store: Arc<dyn RetrievalStore>,
}

impl RbacRetriever {
    pub fn new(store: Arc<dyn RetrievalStore>) -> Self {
        Self { store }
    }

    /// Run the two-stage request: nearest-neighbor candidates, then the
    /// authorization filter.
    ///
    /// A hit survives when any one of the caller's roles appears in its
    /// tags — the union of privileges grants access, not the intersection.
    /// Filtering preserves the relevance order of the candidates. Hits
    /// missing the roles field entirely are excluded and reported through
    /// [`RetrievalOutcome::missing_roles`] rather than failing the request.
    pub async fn retrieve(
        &self,
        privileges: &[Role],
        query_vector: Vec<f32>,
        options: &RetrievalOptions,
    ) -> Result<RetrievalOutcome, RagError> {
        let query = VectorQuery {
            vector: query_vector,
            num_candidates: options.num_candidates,
            limit: options.limit,
            extra_fields: options.extra_fields.clone(),
        };
        let candidates = self.store.vector_query(&query).await?;

        let mut hits = Vec::new();
        let mut missing_roles = Vec::new();
        for hit in candidates {
            match &hit.roles {
                None => missing_roles.push(hit.id.clone()),
                Some(tags) => {
                    let authorized = privileges
                        .iter()
                        .any(|role| tags.iter().any(|tag| tag == role.as_str()));
                    if authorized {
                        hits.push(hit);
                    }
                }
            }
        }

        if !missing_roles.is_empty() {
            tracing::warn!(
                "{} of the top-{} documents are missing the required 'roles' field: {:?}",
                missing_roles.len(),
                options.limit,
                missing_roles
            );
        }

        Ok(RetrievalOutcome { hits, missing_roles })
    }
}
