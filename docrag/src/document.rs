//! Data types for chunks, retrieval results, context resolution and citations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Navigation links between the chunks of one document.
///
/// Forms a doubly linked ordering over a document's chunk sequence. Chunks
/// never reference chunks of another document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkNavigation {
    /// Whether this is the first chunk of the document.
    pub is_first: bool,
    /// Whether this is the last chunk of the document.
    pub is_last: bool,
    /// ID of the preceding chunk, if any.
    pub previous_chunk: Option<String>,
    /// ID of the following chunk, if any.
    pub next_chunk: Option<String>,
}

/// How a chunk relates to the paragraph(s) it was derived from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceMetadata {
    /// Index of the source paragraph in the extracted paragraph sequence.
    pub original_index: usize,
    /// Whether the chunk is one part of an oversized paragraph that was split.
    pub is_split: bool,
    /// Whether the chunk absorbed one or more following paragraphs.
    pub is_combined: bool,
    /// 1-based part number when `is_split` is set.
    pub split_part: Option<u32>,
    /// Number of paragraphs merged into this chunk (1 when not combined).
    pub combined_count: u32,
}

/// Overlap text prepended to a chunk, drawn from the preceding chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlapInfo {
    /// The overlap text itself.
    pub text: String,
    /// Token estimate of the overlap text.
    pub tokens: u32,
    /// ID of the chunk the overlap was drawn from.
    pub from_chunk: String,
}

/// A bounded, independently retrievable span of document text.
///
/// Produced by segmentation and persisted (text + metadata) to the
/// similarity index. Chunks are never mutated after creation; re-ingesting
/// a document supersedes its previous chunk set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Chunk ID, unique within one document's chunk set and stable across
    /// re-derivation from identical input and configuration.
    pub id: String,
    /// Final chunk text, including any prepended overlap.
    pub text: String,
    /// Token estimate of `text`.
    pub tokens: u32,
    /// Token estimate of the source paragraph before overlap was added.
    pub original_tokens: u32,
    /// Position of this chunk in the document's chunk sequence.
    pub chunk_index: usize,
    /// Overlap drawn from the preceding chunk, if one was applied.
    pub overlap: Option<OverlapInfo>,
    /// Split/combine provenance.
    pub source: SourceMetadata,
    /// Links to neighboring chunks.
    pub navigation: ChunkNavigation,
    /// Caller-supplied metadata merged onto every chunk of the document.
    pub global_metadata: HashMap<String, String>,
}

/// Statistics reported alongside a segmentation result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SegmentStats {
    /// Character count of the raw input text.
    pub original_length: usize,
    /// Character count after whitespace normalization.
    pub cleaned_length: usize,
    /// Number of paragraphs extracted before optimization.
    pub paragraph_count: usize,
    /// Number of chunks produced.
    pub chunk_count: usize,
}

/// Output of one segmentation call.
#[derive(Debug, Clone)]
pub struct Segmented {
    /// The ordered chunk sequence.
    pub chunks: Vec<Chunk>,
    /// Processing statistics.
    pub stats: SegmentStats,
}

/// Chunk metadata as stored in the similarity index.
///
/// This is the wire shape: field names are camelCase and `navigation` is a
/// JSON-stringified [`ChunkNavigation`], an artifact of schema-less index
/// APIs. It is serialized and deserialized only at the index-collaborator
/// boundary; core logic works with the structured types instead. Consumers
/// must be able to round-trip this record without loss.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkWireMetadata {
    /// Owning document ID.
    pub document_id: String,
    /// Original file name of the document.
    pub filename: String,
    /// Position of the chunk in the document's chunk sequence.
    pub chunk_index: usize,
    /// Token estimate of the chunk text.
    pub tokens: u32,
    /// Index of the source paragraph.
    pub original_index: usize,
    /// Whether the chunk came from splitting an oversized paragraph.
    pub is_split: bool,
    /// Whether the chunk absorbed following paragraphs.
    pub is_combined: bool,
    /// JSON-stringified [`ChunkNavigation`].
    pub navigation: String,
    /// Caller-supplied metadata keys (e.g. `page`, `title`).
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

/// Structured metadata attached to a retrieved chunk.
///
/// The wire record with `navigation` parsed back into structured form.
/// A malformed navigation payload parses to `None` (logged, never an error).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievedMetadata {
    /// Owning document ID.
    pub document_id: String,
    /// Original file name of the document.
    pub filename: String,
    /// Position of the chunk in the document's chunk sequence.
    pub chunk_index: usize,
    /// Token estimate of the chunk text.
    pub tokens: u32,
    /// Whether the chunk came from splitting an oversized paragraph.
    pub is_split: bool,
    /// Whether the chunk absorbed following paragraphs.
    pub is_combined: bool,
    /// Navigation links, when the stored payload parsed cleanly.
    pub navigation: Option<ChunkNavigation>,
    /// Caller-supplied metadata keys.
    pub extra: HashMap<String, String>,
}

/// A chunk enriched with a query-relative score.
///
/// `score = 1 - distance` wherever a distance metric is used, so ordering
/// by `score` descending is equivalent to ordering by distance ascending.
/// `score` (higher is better) is the single ranking field on every call path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// The chunk text.
    pub content: String,
    /// Structured chunk metadata.
    pub metadata: RetrievedMetadata,
    /// Similarity score; higher is more relevant.
    pub score: f32,
    /// Raw distance as reported by the index; lower is more relevant.
    pub relevance_score: f32,
    /// Owning document ID.
    pub document_id: String,
    /// Position of the chunk in the document's chunk sequence.
    pub chunk_index: usize,
    /// Token estimate of the chunk text.
    pub tokens: u32,
}

/// Per-document summary of where retrieved chunks came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSource {
    /// The document ID.
    pub document_id: String,
    /// Original file name of the document.
    pub filename: String,
    /// How many retrieved chunks belong to this document.
    pub chunks_found: usize,
}

/// Output of a retrieval call (single- or multi-document).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOutput {
    /// The document IDs that were queried.
    pub document_ids: Vec<String>,
    /// The query text.
    pub query: String,
    /// Retrieved chunks, ordered by `score` descending.
    pub retrieved_chunks: Vec<RetrievedChunk>,
    /// Number of retrieved chunks.
    pub count: usize,
    /// Per-document aggregation of the retrieved chunks, in first-seen order.
    pub sources: Vec<DocumentSource>,
}

/// Which branch of the resolution cascade produced a document set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    /// The caller explicitly attached documents.
    Explicit,
    /// Documents referenced by recent messages of the conversation.
    ConversationContext,
    /// The query lexically referenced an earlier document.
    ReferenceDetected,
    /// No documents are in scope; the query is general.
    NoDocuments,
}

/// Output of the document context resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextResolution {
    /// Deduplicated document IDs, in first-seen order. May be empty.
    pub document_ids: Vec<String>,
    /// The cascade branch that produced `document_ids`.
    pub source: ContextSource,
    /// Whether conversation context contributed to the resolution.
    pub context_used: bool,
}

impl ContextResolution {
    /// Resolution for explicitly attached documents.
    pub fn explicit(document_ids: &[String]) -> Self {
        Self {
            document_ids: dedupe_preserving_order(document_ids),
            source: ContextSource::Explicit,
            context_used: false,
        }
    }

    /// Resolution with no documents in scope.
    pub fn no_documents() -> Self {
        Self {
            document_ids: Vec::new(),
            source: ContextSource::NoDocuments,
            context_used: false,
        }
    }
}

/// Deduplicate IDs while preserving first-seen order.
pub(crate) fn dedupe_preserving_order(ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.iter().filter(|id| seen.insert(id.as_str())).cloned().collect()
}

/// A structured pointer from an in-prompt chunk back to its source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    /// 1-based position of the chunk in the prompt body.
    pub id: usize,
    /// Position of the chunk in its document's chunk sequence.
    pub chunk_index: usize,
    /// Owning document ID.
    pub document_id: String,
    /// Original file name of the document.
    pub file_name: String,
    /// Page reference, or `"N/A"` when unknown.
    pub page: String,
    /// Similarity score formatted to 4 decimals.
    pub relevance_score: String,
    /// First 100 characters of the chunk text.
    pub preview: String,
}

/// A prompt together with the citations for the chunks it includes.
///
/// `citations[i]` corresponds to the i-th chunk actually included in the
/// prompt body, not to chunks dropped by the context budget.
#[derive(Debug, Clone)]
pub struct PromptAssemblyResult {
    /// The assembled prompt.
    pub prompt: String,
    /// Citations in prompt-inclusion order.
    pub citations: Vec<Citation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_metadata_round_trips_camel_case() {
        let nav = ChunkNavigation {
            is_first: true,
            is_last: false,
            previous_chunk: None,
            next_chunk: Some("para_1".into()),
        };
        let wire = ChunkWireMetadata {
            document_id: "doc-1".into(),
            filename: "report.pdf".into(),
            chunk_index: 0,
            tokens: 42,
            original_index: 0,
            is_split: false,
            is_combined: true,
            navigation: serde_json::to_string(&nav).unwrap(),
            extra: HashMap::from([("page".into(), "3".into())]),
        };

        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["documentId"], "doc-1");
        assert_eq!(json["chunkIndex"], 0);
        assert_eq!(json["isCombined"], true);
        assert_eq!(json["page"], "3");

        let back: ChunkWireMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, wire);
        let nav_back: ChunkNavigation = serde_json::from_str(&back.navigation).unwrap();
        assert_eq!(nav_back, nav);
    }

    #[test]
    fn dedupe_keeps_first_seen_order() {
        let ids = vec!["b".to_string(), "a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(dedupe_preserving_order(&ids), vec!["b", "a", "c"]);
    }
}
