//! MongoDB Atlas adapter for the retrieval store.
//!
//! Similarity search runs through the `$vectorSearch` aggregation stage over
//! a pre-provisioned search index; this module only targets the configured
//! `{database, collection, index, embedding field}` and never provisions
//! schema or indexes itself.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, to_document, Bson, Document};
use mongodb::{Client, Collection};

use super::{RetrievalStore, RetrievedHit, RoleUpdate, StoredDocument, VectorQuery};
use crate::core::config::SearchTarget;
use crate::core::errors::RagError;
use crate::roles::Role;

/// Connected MongoDB client, not yet pointed at a collection.
pub struct MongoVectorStore {
    client: Client,
}

impl MongoVectorStore {
    /// Establish a client handle for the given connection string.
    pub async fn connect(uri: &str) -> Result<Self, RagError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|err| RagError::Connection(err.to_string()))?;
        Ok(Self { client })
    }

    /// Verify the target database and collection exist and fix them as the
    /// query/ingest target. Search and ingest only run on the returned
    /// handle, so nothing can touch an unbound target.
    pub async fn bind_target(&self, target: &SearchTarget) -> Result<BoundCollection, RagError> {
        let databases = self
            .client
            .list_database_names()
            .await
            .map_err(RagError::store)?;
        if !databases.iter().any(|name| name == &target.database) {
            return Err(RagError::TargetNotFound(format!(
                "database '{}' does not exist",
                target.database
            )));
        }

        let db = self.client.database(&target.database);
        let collections = db.list_collection_names().await.map_err(RagError::store)?;
        if !collections.iter().any(|name| name == &target.collection) {
            return Err(RagError::TargetNotFound(format!(
                "collection '{}' does not exist in database '{}'",
                target.collection, target.database
            )));
        }

        Ok(BoundCollection {
            collection: db.collection::<Document>(&target.collection),
            target: target.clone(),
        })
    }

    /// Enumerate store-level role definitions across databases.
    ///
    /// Operator-facing listing; databases the `rolesInfo` command fails on
    /// are logged and skipped.
    pub async fn database_roles(&self) -> Result<Vec<(String, String)>, RagError> {
        let databases = self
            .client
            .list_database_names()
            .await
            .map_err(RagError::store)?;

        let mut found = Vec::new();
        for db_name in databases {
            if db_name == "local" {
                continue;
            }
            let db = self.client.database(&db_name);
            match db
                .run_command(doc! { "rolesInfo": 1, "showBuiltinRoles": true })
                .await
            {
                Ok(reply) => {
                    if let Ok(roles) = reply.get_array("roles") {
                        for role in roles.iter().filter_map(Bson::as_document) {
                            let name = role.get_str("role").unwrap_or_default();
                            let role_db = role.get_str("db").unwrap_or(&db_name);
                            found.push((role_db.to_string(), name.to_string()));
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!("could not retrieve roles for database '{}': {}", db_name, err);
                }
            }
        }
        Ok(found)
    }
}

/// A store handle fixed on one search target.
pub struct BoundCollection {
    collection: Collection<Document>,
    target: SearchTarget,
}

impl BoundCollection {
    fn embedding_to_bson(vector: &[f32]) -> Bson {
        Bson::Array(vector.iter().map(|v| Bson::Double(f64::from(*v))).collect())
    }

    fn projection_for(extra_fields: &[String]) -> Document {
        let mut projection = doc! {
            "_id": 1,
            "roles": 1,
            "text": 1,
            "search_score": { "$meta": "vectorSearchScore" },
        };
        for field in extra_fields {
            projection.insert(field, 1);
        }
        projection
    }

    fn hit_from_document(document: &Document, extra_fields: &[String]) -> RetrievedHit {
        let id = document
            .get_object_id("_id")
            .map(|oid| oid.to_hex())
            .unwrap_or_default();
        let text = document.get_str("text").unwrap_or_default().to_string();
        let roles = document.get_array("roles").ok().map(|values| {
            values
                .iter()
                .filter_map(|value| value.as_str().map(str::to_string))
                .collect()
        });
        let score = document.get_f64("search_score").unwrap_or_default();

        let mut extra = HashMap::new();
        for field in extra_fields {
            if let Some(value) = document.get(field) {
                extra.insert(field.clone(), serde_json::Value::from(value.clone()));
            }
        }

        RetrievedHit {
            id,
            text,
            roles,
            score,
            extra,
        }
    }
}

#[async_trait]
impl RetrievalStore for BoundCollection {
    async fn insert_many(&self, documents: Vec<StoredDocument>) -> Result<(), RagError> {
        let documents = documents
            .iter()
            .map(|document| to_document(document))
            .collect::<Result<Vec<_>, _>>()
            .map_err(RagError::store)?;
        self.collection
            .insert_many(documents)
            .await
            .map_err(RagError::store)?;
        Ok(())
    }

    async fn vector_query(&self, query: &VectorQuery) -> Result<Vec<RetrievedHit>, RagError> {
        // Pre-flight: the embedding field must have been populated at least
        // once, otherwise `$vectorSearch` silently matches nothing.
        let field = self.target.embedding_field.as_str();
        let mut exists_filter = Document::new();
        exists_filter.insert(field, doc! { "$exists": true });
        let probe = self
            .collection
            .find_one(exists_filter)
            .await
            .map_err(RagError::store)?;
        if probe.is_none() {
            return Err(RagError::FieldNotIndexed {
                field: self.target.embedding_field.clone(),
                collection: self.target.collection.clone(),
            });
        }

        let pipeline = vec![
            doc! {
                "$vectorSearch": {
                    "index": &self.target.index,
                    "path": field,
                    "queryVector": Self::embedding_to_bson(&query.vector),
                    "numCandidates": query.num_candidates,
                    "limit": query.limit,
                }
            },
            doc! { "$project": Self::projection_for(&query.extra_fields) },
        ];

        let mut cursor = self
            .collection
            .aggregate(pipeline)
            .await
            .map_err(RagError::store)?;

        let mut hits = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(RagError::store)? {
            hits.push(Self::hit_from_document(&document, &query.extra_fields));
        }
        Ok(hits)
    }

    async fn update_roles(&self, id: &str, roles: &[Role]) -> Result<RoleUpdate, RagError> {
        let object_id = ObjectId::parse_str(id)
            .map_err(|err| RagError::Validation(format!("invalid document id '{id}': {err}")))?;
        let values: Vec<Bson> = roles
            .iter()
            .map(|role| Bson::String(role.as_str().to_string()))
            .collect();

        let result = self
            .collection
            .update_one(doc! { "_id": object_id }, doc! { "$set": { "roles": values } })
            .await
            .map_err(RagError::store)?;

        Ok(RoleUpdate {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn existing_texts(&self) -> Result<Vec<String>, RagError> {
        let mut cursor = self
            .collection
            .find(doc! {})
            .projection(doc! { "text": 1 })
            .await
            .map_err(RagError::store)?;

        let mut texts = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(RagError::store)? {
            if let Ok(text) = document.get_str("text") {
                texts.push(text.to_string());
            }
        }
        Ok(texts)
    }
}
