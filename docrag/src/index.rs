//! Similarity index trait for storing and searching chunk records.

use async_trait::async_trait;

use crate::document::ChunkWireMetadata;
use crate::error::Result;

/// One chunk as stored in the similarity index.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    /// Chunk ID, unique within the collection.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// Embedding vector; `None` when the backend embeds server-side.
    pub vector: Option<Vec<f32>>,
    /// Wire metadata stored alongside the text.
    pub metadata: ChunkWireMetadata,
}

/// A nearest-neighbor query, by raw text or by precomputed vector.
///
/// Text queries require a backend that embeds server-side; the retrieval
/// layer issues vector queries whenever an embedding provider is configured.
#[derive(Debug, Clone)]
pub enum IndexQuery {
    /// Query by raw text, embedded by the backend.
    Text(String),
    /// Query by a precomputed embedding vector.
    Vector(Vec<f32>),
}

/// One result slot of a similarity query.
#[derive(Debug, Clone)]
pub struct IndexMatch {
    /// The stored chunk text.
    pub document: String,
    /// The stored wire metadata.
    pub metadata: ChunkWireMetadata,
    /// Distance to the query; lower is more similar.
    pub distance: f32,
}

/// A similarity index holding per-document collections of chunk records.
///
/// Implementations manage named collections and answer nearest-neighbor
/// queries over them. The connection handle must support concurrent
/// independent queries; multi-document retrieval fans out one query per
/// collection.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert records into a collection, creating the collection on first use.
    async fn upsert(&self, collection: &str, records: &[IndexRecord]) -> Result<()>;

    /// Return the `k` nearest records, ordered by ascending distance.
    async fn query(&self, collection: &str, query: &IndexQuery, k: usize)
        -> Result<Vec<IndexMatch>>;

    /// Whether a collection with this name exists.
    async fn exists(&self, collection: &str) -> Result<bool>;

    /// Delete a collection and all its records.
    async fn delete_collection(&self, collection: &str) -> Result<()>;
}
