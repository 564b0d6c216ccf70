//! In-memory similarity index using cosine similarity.
//!
//! [`InMemoryVectorIndex`] is a zero-dependency backend suitable for
//! development and testing. Collections are nested `HashMap`s protected by a
//! `tokio::sync::RwLock`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{RagError, Result};
use crate::index::{IndexMatch, IndexQuery, IndexRecord, VectorIndex};

const BACKEND: &str = "in-memory";

/// An in-memory [`VectorIndex`] using cosine similarity for search.
///
/// Distances are reported as `1 - cosine`, so the core's `score = 1 - distance`
/// normalization recovers the cosine similarity. Text queries are rejected:
/// this backend has no server-side embedder.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    collections: RwLock<HashMap<String, HashMap<String, IndexRecord>>>,
}

impl InMemoryVectorIndex {
    /// Create a new empty in-memory index.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, collection: &str, records: &[IndexRecord]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.entry(collection.to_string()).or_default();
        for record in records {
            if record.vector.is_none() {
                return Err(RagError::IndexError {
                    backend: BACKEND.to_string(),
                    message: format!(
                        "record '{}' has no vector; this backend does not embed",
                        record.id
                    ),
                });
            }
            store.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &IndexQuery,
        k: usize,
    ) -> Result<Vec<IndexMatch>> {
        let embedding = match query {
            IndexQuery::Vector(embedding) => embedding,
            IndexQuery::Text(_) => {
                return Err(RagError::IndexError {
                    backend: BACKEND.to_string(),
                    message: "text queries require a backend-side embedder".to_string(),
                });
            }
        };

        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| RagError::IndexError {
            backend: BACKEND.to_string(),
            message: format!("collection '{collection}' does not exist"),
        })?;

        let mut matches: Vec<IndexMatch> = store
            .values()
            .map(|record| {
                let vector = record.vector.as_deref().unwrap_or_default();
                IndexMatch {
                    document: record.text.clone(),
                    metadata: record.metadata.clone(),
                    distance: 1.0 - cosine_similarity(vector, embedding),
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(k);
        Ok(matches)
    }

    async fn exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }
}
