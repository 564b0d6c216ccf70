//! Retrieval orchestration over the similarity index.
//!
//! [`Retriever`] queries one collection per document, normalizes raw
//! distances into similarity scores, merges and ranks results across
//! documents, and isolates per-document failures so one bad collection never
//! aborts a multi-document call.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::document::{
    ChunkNavigation, DocumentSource, RetrievalOutput, RetrievedChunk, RetrievedMetadata,
};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::{IndexMatch, IndexQuery, VectorIndex};

/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;
/// Default minimum similarity score for [`filter_by_relevance`].
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.7;

/// Name of the index collection holding a document's chunks.
pub fn collection_name(document_id: &str) -> String {
    format!("doc_{document_id}_chunks")
}

/// Keep only chunks with `score >= threshold`.
///
/// An independent, optional post-filter; never embedded inside the core
/// retrieval call.
pub fn filter_by_relevance(chunks: Vec<RetrievedChunk>, threshold: f32) -> Vec<RetrievedChunk> {
    chunks.into_iter().filter(|chunk| chunk.score >= threshold).collect()
}

/// Queries the similarity index and ranks the results.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl Retriever {
    /// Create a retriever that issues text queries (backend-side embedding).
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index, embedder: None }
    }

    /// Embed query text locally and issue vector queries instead.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Retrieve the `top_k` most relevant chunks of one document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for an empty query and
    /// [`RagError::CollectionNotFound`] when no collection exists for
    /// `document_id`.
    pub async fn retrieve(
        &self,
        document_id: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<RetrievalOutput> {
        if query_text.trim().is_empty() {
            return Err(RagError::InvalidInput("query text must not be empty".into()));
        }

        let collection = collection_name(document_id);
        if !self.index.exists(&collection).await? {
            return Err(RagError::CollectionNotFound { document_id: document_id.to_string() });
        }

        let query = self.index_query(query_text).await?;
        let matches = self.index.query(&collection, &query, top_k).await?;
        let retrieved_chunks = format_matches(document_id, matches);
        info!(document_id, count = retrieved_chunks.len(), "retrieved chunks");

        Ok(RetrievalOutput {
            document_ids: vec![document_id.to_string()],
            query: query_text.to_string(),
            count: retrieved_chunks.len(),
            sources: aggregate_sources(&retrieved_chunks),
            retrieved_chunks,
        })
    }

    /// Retrieve across multiple documents, merging and ranking the results.
    ///
    /// Per-document queries are issued concurrently. A failure for one
    /// document is logged and that document skipped; it never aborts the
    /// overall call. After all queries settle, chunks are sorted by `score`
    /// descending and truncated to `top_k`. An empty `document_ids` yields an
    /// empty result, not an error.
    pub async fn retrieve_multi(
        &self,
        document_ids: &[String],
        query_text: &str,
        top_k: usize,
    ) -> Result<RetrievalOutput> {
        if query_text.trim().is_empty() {
            return Err(RagError::InvalidInput("query text must not be empty".into()));
        }

        let empty = RetrievalOutput {
            document_ids: document_ids.to_vec(),
            query: query_text.to_string(),
            retrieved_chunks: Vec::new(),
            count: 0,
            sources: Vec::new(),
        };
        if document_ids.is_empty() {
            return Ok(empty);
        }

        let queries = document_ids
            .iter()
            .map(|document_id| async move {
                (document_id, self.retrieve(document_id, query_text, top_k).await)
            })
            .collect::<Vec<_>>();

        let mut all_chunks = Vec::new();
        for (document_id, outcome) in join_all(queries).await {
            match outcome {
                Ok(output) => all_chunks.extend(output.retrieved_chunks),
                Err(err) => {
                    warn!(
                        document_id = %document_id,
                        error = %err,
                        "skipping document after retrieval failure"
                    );
                }
            }
        }

        all_chunks.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
        });
        all_chunks.truncate(top_k);
        info!(
            document_count = document_ids.len(),
            count = all_chunks.len(),
            "retrieved chunks across documents"
        );

        Ok(RetrievalOutput {
            count: all_chunks.len(),
            sources: aggregate_sources(&all_chunks),
            retrieved_chunks: all_chunks,
            ..empty
        })
    }

    async fn index_query(&self, query_text: &str) -> Result<IndexQuery> {
        match &self.embedder {
            Some(embedder) => Ok(IndexQuery::Vector(embedder.embed(query_text).await?)),
            None => Ok(IndexQuery::Text(query_text.to_string())),
        }
    }
}

/// Turn raw index matches into scored chunks.
///
/// The similarity score is normalized here, at the boundary where raw
/// distances enter the core: `score = 1 - distance` on every call path.
fn format_matches(document_id: &str, matches: Vec<IndexMatch>) -> Vec<RetrievedChunk> {
    matches
        .into_iter()
        .map(|m| {
            let navigation = parse_navigation(&m.metadata.navigation);
            let owner = if m.metadata.document_id.is_empty() {
                document_id.to_string()
            } else {
                m.metadata.document_id.clone()
            };
            RetrievedChunk {
                score: 1.0 - m.distance,
                relevance_score: m.distance,
                document_id: owner,
                chunk_index: m.metadata.chunk_index,
                tokens: m.metadata.tokens,
                metadata: RetrievedMetadata {
                    document_id: m.metadata.document_id,
                    filename: m.metadata.filename,
                    chunk_index: m.metadata.chunk_index,
                    tokens: m.metadata.tokens,
                    is_split: m.metadata.is_split,
                    is_combined: m.metadata.is_combined,
                    navigation,
                    extra: m.metadata.extra,
                },
                content: m.document,
            }
        })
        .collect()
}

/// Parse the JSON-stringified navigation payload; malformed payloads are
/// logged and dropped, never raised.
fn parse_navigation(raw: &str) -> Option<ChunkNavigation> {
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(navigation) => Some(navigation),
        Err(err) => {
            warn!(error = %err, "failed to parse navigation metadata");
            None
        }
    }
}

/// Aggregate retrieved chunks per document, in first-seen order.
fn aggregate_sources(chunks: &[RetrievedChunk]) -> Vec<DocumentSource> {
    let mut sources: Vec<DocumentSource> = Vec::new();
    for chunk in chunks {
        match sources.iter_mut().find(|s| s.document_id == chunk.document_id) {
            Some(source) => source.chunks_found += 1,
            None => sources.push(DocumentSource {
                document_id: chunk.document_id.clone(),
                filename: chunk.metadata.filename.clone(),
                chunks_found: 1,
            }),
        }
    }
    sources
}
