//! Tests for retrieval orchestration: ranking, normalization, and
//! per-document failure isolation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use docrag::{
    collection_name, filter_by_relevance, ChunkNavigation, ChunkWireMetadata, IndexMatch,
    IndexQuery, IndexRecord, RagError, Result, Retriever, VectorIndex,
};

/// An index with canned matches per collection; listed failure collections
/// error on query.
#[derive(Default)]
struct FakeIndex {
    collections: HashMap<String, Vec<IndexMatch>>,
    failing: Vec<String>,
}

impl FakeIndex {
    fn with_document(mut self, document_id: &str, matches: Vec<IndexMatch>) -> Self {
        self.collections.insert(collection_name(document_id), matches);
        self
    }

    fn with_failing_document(mut self, document_id: &str) -> Self {
        let name = collection_name(document_id);
        self.failing.push(name.clone());
        self.collections.insert(name, Vec::new());
        self
    }
}

#[async_trait]
impl VectorIndex for FakeIndex {
    async fn upsert(&self, _collection: &str, _records: &[IndexRecord]) -> Result<()> {
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        _query: &IndexQuery,
        k: usize,
    ) -> Result<Vec<IndexMatch>> {
        if self.failing.iter().any(|c| c == collection) {
            return Err(RagError::IndexError {
                backend: "fake".into(),
                message: "simulated outage".into(),
            });
        }
        let mut matches = self.collections.get(collection).cloned().unwrap_or_default();
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(k);
        Ok(matches)
    }

    async fn exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.contains_key(collection))
    }

    async fn delete_collection(&self, _collection: &str) -> Result<()> {
        Ok(())
    }
}

fn index_match(document_id: &str, chunk_index: usize, distance: f32) -> IndexMatch {
    let navigation = ChunkNavigation { is_first: chunk_index == 0, ..Default::default() };
    IndexMatch {
        document: format!("chunk {chunk_index} of {document_id}"),
        metadata: ChunkWireMetadata {
            document_id: document_id.into(),
            filename: format!("{document_id}.pdf"),
            chunk_index,
            tokens: 25,
            navigation: serde_json::to_string(&navigation).unwrap(),
            ..Default::default()
        },
        distance,
    }
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn single_document_retrieval_normalizes_scores() {
    let index = FakeIndex::default()
        .with_document("a", vec![index_match("a", 0, 0.2), index_match("a", 1, 0.4)]);
    let retriever = Retriever::new(Arc::new(index));

    let output = retriever.retrieve("a", "what changed?", 5).await.unwrap();

    assert_eq!(output.count, 2);
    assert_eq!(output.document_ids, ids(&["a"]));
    let first = &output.retrieved_chunks[0];
    assert!((first.score - 0.8).abs() < 1e-6);
    assert!((first.relevance_score - 0.2).abs() < 1e-6);
    assert!(first.metadata.navigation.as_ref().is_some_and(|n| n.is_first));
    assert_eq!(output.sources.len(), 1);
    assert_eq!(output.sources[0].chunks_found, 2);
}

#[tokio::test]
async fn missing_collection_is_a_typed_error() {
    let retriever = Retriever::new(Arc::new(FakeIndex::default()));
    let err = retriever.retrieve("ghost", "anything", 5).await.unwrap_err();
    assert!(matches!(err, RagError::CollectionNotFound { document_id } if document_id == "ghost"));
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let retriever = Retriever::new(Arc::new(FakeIndex::default()));
    let err = retriever.retrieve("a", "  ", 5).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidInput(_)));
    let err = retriever.retrieve_multi(&ids(&["a"]), "", 5).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidInput(_)));
}

#[tokio::test]
async fn multi_document_failure_is_isolated() {
    let index = FakeIndex::default()
        .with_failing_document("a")
        .with_document("b", vec![index_match("b", 0, 0.3), index_match("b", 1, 0.5)]);
    let retriever = Retriever::new(Arc::new(index));

    let output = retriever.retrieve_multi(&ids(&["a", "b"]), "query", 5).await.unwrap();

    assert_eq!(output.count, 2);
    assert!(output.retrieved_chunks.iter().all(|c| c.document_id == "b"));
    assert_eq!(output.document_ids, ids(&["a", "b"]));
}

#[tokio::test]
async fn multi_document_results_are_ranked_and_truncated() {
    let index = FakeIndex::default()
        .with_document("a", vec![index_match("a", 0, 0.40), index_match("a", 1, 0.10)])
        .with_document("b", vec![index_match("b", 0, 0.25), index_match("b", 1, 0.55)]);
    let retriever = Retriever::new(Arc::new(index));

    let output = retriever.retrieve_multi(&ids(&["a", "b"]), "query", 3).await.unwrap();

    assert_eq!(output.count, 3);
    let scores: Vec<f32> = output.retrieved_chunks.iter().map(|c| c.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    // The worst match (distance 0.55) fell off the top-k cut.
    assert!(output.retrieved_chunks.iter().all(|c| c.relevance_score < 0.55));
}

#[tokio::test]
async fn empty_document_set_yields_empty_result() {
    let retriever = Retriever::new(Arc::new(FakeIndex::default()));
    let output = retriever.retrieve_multi(&[], "query", 5).await.unwrap();
    assert_eq!(output.count, 0);
    assert!(output.retrieved_chunks.is_empty());
    assert!(output.sources.is_empty());
}

#[tokio::test]
async fn malformed_navigation_is_tolerated() {
    let mut broken = index_match("a", 0, 0.2);
    broken.metadata.navigation = "{not valid json".into();
    let index = FakeIndex::default().with_document("a", vec![broken]);
    let retriever = Retriever::new(Arc::new(index));

    let output = retriever.retrieve("a", "query", 5).await.unwrap();

    assert_eq!(output.count, 1);
    assert!(output.retrieved_chunks[0].metadata.navigation.is_none());
}

#[tokio::test]
async fn relevance_filter_is_an_independent_post_step() {
    let index = FakeIndex::default().with_document(
        "a",
        vec![index_match("a", 0, 0.1), index_match("a", 1, 0.5), index_match("a", 2, 0.9)],
    );
    let retriever = Retriever::new(Arc::new(index));

    let output = retriever.retrieve("a", "query", 5).await.unwrap();
    assert_eq!(output.count, 3);

    let kept = filter_by_relevance(output.retrieved_chunks, 0.7);
    assert_eq!(kept.len(), 1);
    assert!((kept[0].score - 0.9).abs() < 1e-6);
}
