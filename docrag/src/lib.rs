//! # docrag
//!
//! Retrieval-augmented generation core for document chat applications:
//! turns raw document text into retrievable chunks, decides which documents
//! a conversational query should search, fetches and ranks matching
//! passages from a similarity index, and assembles a length-bounded prompt
//! for a language model.
//!
//! ## Components
//!
//! - [`ParagraphSegmenter`] — splits document text into bounded,
//!   overlap-linked chunks along paragraph and sentence boundaries.
//! - [`ContextResolver`] — picks the document set for a query via a priority
//!   cascade over explicit attachment, recent-conversation context, and
//!   lexical reference detection.
//! - [`Retriever`] — queries one index collection per document, normalizes
//!   distances into similarity scores, and merges and ranks results with
//!   per-document failure isolation.
//! - [`PromptAssembler`] — builds instruction + context + history prompts
//!   under a hard character budget, with citations mirroring the chunks
//!   actually included.
//! - [`RagPipeline`] — wires the components together behind
//!   constructor-injected collaborator traits ([`EmbeddingProvider`],
//!   [`VectorIndex`], [`HistoryStore`], [`GenerativeModel`]).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docrag::{IngestRequest, InMemoryVectorIndex, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .index(Arc::new(InMemoryVectorIndex::new()))
//!     .embedder(Arc::new(my_embedder))
//!     .build()?;
//!
//! pipeline.ingest(&IngestRequest { /* … */ }).await?;
//! let results = pipeline.query_document("doc-1", "what changed?", None).await?;
//! ```
//!
//! ## Feature flags
//!
//! - `openai` — [`OpenAiEmbeddings`](openai::OpenAiEmbeddings) over the
//!   OpenAI embeddings API.
//! - `chroma` — [`ChromaVectorIndex`](chroma::ChromaVectorIndex) over the
//!   Chroma REST API.
//! - `gemini` — [`GeminiGenerator`](gemini::GeminiGenerator) over the Gemini
//!   `generateContent` API.

pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod history;
pub mod index;
pub mod inmemory;
pub mod pipeline;
pub mod prompt;
pub mod resolver;
pub mod retrieval;
pub mod segmenter;

#[cfg(feature = "chroma")]
pub mod chroma;
#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "openai")]
pub mod openai;

pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Chunk, ChunkNavigation, ChunkWireMetadata, Citation, ContextResolution, ContextSource,
    DocumentSource, OverlapInfo, PromptAssemblyResult, RetrievalOutput, RetrievedChunk,
    RetrievedMetadata, SegmentStats, Segmented, SourceMetadata,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::{Generation, GenerationOptions, GenerativeModel};
pub use history::{ChatRole, ChatTurn, HistoryStore, InMemoryHistoryStore, RecordedMessage};
pub use index::{IndexMatch, IndexQuery, IndexRecord, VectorIndex};
pub use inmemory::InMemoryVectorIndex;
pub use pipeline::{
    Answer, AnswerOptions, AnswerRequest, IngestRequest, RagPipeline, RagPipelineBuilder,
};
pub use prompt::{
    AnalysisKind, InstructionTemplate, PromptAssembler, PromptOptions, SummaryStyle,
};
pub use resolver::{detect_document_reference, ContextResolver};
pub use retrieval::{collection_name, filter_by_relevance, Retriever};
pub use segmenter::{estimate_tokens, ParagraphSegmenter, Segmenter, SegmenterConfig};
