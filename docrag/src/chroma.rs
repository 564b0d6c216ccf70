//! Chroma-compatible HTTP similarity index backend.
//!
//! Provides [`ChromaVectorIndex`], a [`VectorIndex`] over the Chroma REST
//! API. Collections are created lazily on first upsert with cosine distance;
//! chunk metadata is stored as the collection's metadata payload and text
//! queries are embedded server-side by Chroma's collection embedder.
//!
//! This module is only available when the `chroma` feature is enabled.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::document::ChunkWireMetadata;
use crate::error::{RagError, Result};
use crate::index::{IndexMatch, IndexQuery, IndexRecord, VectorIndex};

const BACKEND: &str = "chroma";
const DEFAULT_URL: &str = "http://localhost:8000";

/// A [`VectorIndex`] backed by a Chroma server.
pub struct ChromaVectorIndex {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<String>>,
    #[serde(default)]
    metadatas: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    distances: Vec<Vec<f32>>,
}

fn index_error(message: impl Into<String>) -> RagError {
    RagError::IndexError { backend: BACKEND.into(), message: message.into() }
}

impl ChromaVectorIndex {
    /// Create a new index client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a new index client for `http://localhost:8000`.
    pub fn default_url() -> Self {
        Self::new(DEFAULT_URL)
    }

    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionInfo> {
        let body = json!({
            "name": name,
            "metadata": { "hnsw:space": "cosine" },
            "get_or_create": true,
        });
        let response = self
            .client
            .post(format!("{}/api/v1/collections", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| index_error(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            error!(backend = BACKEND, %status, collection = name, "collection create failed");
            return Err(index_error(format!("collection create returned {status}")));
        }
        response.json().await.map_err(|e| index_error(format!("failed to parse response: {e}")))
    }

    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let response = self
            .client
            .get(format!("{}/api/v1/collections/{name}", self.base_url))
            .send()
            .await
            .map_err(|e| index_error(format!("request failed: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            // Chroma reports an unknown collection as a client error.
            if response.status().is_client_error() {
                return Ok(None);
            }
            return Err(index_error(format!(
                "collection lookup returned {}",
                response.status()
            )));
        }
        let info = response
            .json()
            .await
            .map_err(|e| index_error(format!("failed to parse response: {e}")))?;
        Ok(Some(info))
    }
}

#[async_trait]
impl VectorIndex for ChromaVectorIndex {
    async fn upsert(&self, collection: &str, records: &[IndexRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let info = self.get_or_create_collection(collection).await?;

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let documents: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        let metadatas: Vec<serde_json::Value> = records
            .iter()
            .map(|r| serde_json::to_value(&r.metadata))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| index_error(format!("failed to encode metadata: {e}")))?;

        let mut body = json!({
            "ids": ids,
            "documents": documents,
            "metadatas": metadatas,
        });
        // Vectors are optional; without them Chroma embeds server-side.
        if records.iter().all(|r| r.vector.is_some()) {
            let embeddings: Vec<&Vec<f32>> =
                records.iter().filter_map(|r| r.vector.as_ref()).collect();
            body["embeddings"] = json!(embeddings);
        }

        let response = self
            .client
            .post(format!("{}/api/v1/collections/{}/upsert", self.base_url, info.id))
            .json(&body)
            .send()
            .await
            .map_err(|e| index_error(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            error!(backend = BACKEND, %status, collection, "upsert failed");
            return Err(index_error(format!("upsert returned {status}")));
        }
        debug!(backend = BACKEND, collection, count = records.len(), "upserted records");
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &IndexQuery,
        k: usize,
    ) -> Result<Vec<IndexMatch>> {
        let info = self
            .get_collection(collection)
            .await?
            .ok_or_else(|| index_error(format!("collection '{collection}' does not exist")))?;

        let mut body = json!({
            "n_results": k,
            "include": ["documents", "metadatas", "distances"],
        });
        match query {
            IndexQuery::Text(text) => body["query_texts"] = json!([text]),
            IndexQuery::Vector(vector) => body["query_embeddings"] = json!([vector]),
        }

        let response = self
            .client
            .post(format!("{}/api/v1/collections/{}/query", self.base_url, info.id))
            .json(&body)
            .send()
            .await
            .map_err(|e| index_error(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            error!(backend = BACKEND, %status, collection, "query failed");
            return Err(index_error(format!("query returned {status}")));
        }
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| index_error(format!("failed to parse response: {e}")))?;

        // One inner slot per query; a single query was issued.
        let documents = parsed.documents.into_iter().next().unwrap_or_default();
        let metadatas = parsed.metadatas.into_iter().next().unwrap_or_default();
        let distances = parsed.distances.into_iter().next().unwrap_or_default();

        let matches = documents
            .into_iter()
            .enumerate()
            .map(|(i, document)| {
                let metadata = match metadatas.get(i) {
                    Some(value) => {
                        serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                            warn!(backend = BACKEND, error = %e, "malformed chunk metadata payload");
                            ChunkWireMetadata::default()
                        })
                    }
                    None => ChunkWireMetadata::default(),
                };
                IndexMatch {
                    document,
                    metadata,
                    distance: distances.get(i).copied().unwrap_or(1.0),
                }
            })
            .collect();
        Ok(matches)
    }

    async fn exists(&self, collection: &str) -> Result<bool> {
        Ok(self.get_collection(collection).await?.is_some())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/api/v1/collections/{collection}", self.base_url))
            .send()
            .await
            .map_err(|e| index_error(format!("request failed: {e}")))?;
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND
        {
            return Err(index_error(format!("delete returned {}", response.status())));
        }
        Ok(())
    }
}
