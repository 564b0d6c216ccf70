//! RAG pipeline orchestrator.
//!
//! [`RagPipeline`] wires the four core components together and exposes the
//! entry points the application layer consumes: document ingestion,
//! single- and multi-document retrieval, and context-grounded answer
//! generation. Collaborators (similarity index, embedding provider, history
//! store, generative model) are constructor-injected `Arc<dyn Trait>`
//! handles whose lifecycle is owned by the application entry point; the core
//! never instantiates its own network clients.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docrag::{InMemoryVectorIndex, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .index(Arc::new(InMemoryVectorIndex::new()))
//!     .embedder(Arc::new(my_embedder))
//!     .model(Arc::new(my_model))
//!     .build()?;
//!
//! let chunks = pipeline.ingest(&request).await?;
//! let answer = pipeline.answer(&question).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::RagConfig;
use crate::document::{
    Chunk, ChunkWireMetadata, Citation, ContextResolution, RetrievalOutput,
};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{GenerationOptions, GenerativeModel};
use crate::history::{ChatTurn, HistoryStore};
use crate::index::{IndexRecord, VectorIndex};
use crate::prompt::{InstructionTemplate, PromptAssembler, PromptOptions};
use crate::resolver::ContextResolver;
use crate::retrieval::{collection_name, filter_by_relevance, Retriever};
use crate::segmenter::{ParagraphSegmenter, Segmenter};

/// Wire metadata keys owned by the typed fields of [`ChunkWireMetadata`].
const RESERVED_METADATA_KEYS: [&str; 8] = [
    "documentId",
    "filename",
    "chunkIndex",
    "tokens",
    "originalIndex",
    "isSplit",
    "isCombined",
    "navigation",
];

/// A document to be ingested.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Identifier of the document; also determines the collection name.
    pub document_id: String,
    /// Original file name, stored with every chunk.
    pub filename: String,
    /// The raw extracted document text.
    pub text: String,
    /// Additional metadata merged onto every chunk (e.g. `page`, `title`).
    pub metadata: HashMap<String, String>,
}

/// Options for one [`RagPipeline::answer`] call.
#[derive(Debug, Clone, Default)]
pub struct AnswerOptions {
    /// Instruction preset for the prompt.
    pub template: InstructionTemplate,
    /// Override the configured number of retrieved chunks.
    pub top_k: Option<usize>,
    /// Override the configured context character budget.
    pub max_context_length: Option<usize>,
    /// Drop chunks below the configured relevance threshold before prompting.
    pub apply_relevance_filter: bool,
    /// Sampling parameters for the generative model.
    pub generation: GenerationOptions,
}

/// A question to answer with retrieved context.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    /// The querying user.
    pub user_id: String,
    /// The question text.
    pub query: String,
    /// Explicitly attached document IDs; may be empty.
    pub document_ids: Vec<String>,
    /// Conversation to draw context and history from, if any.
    pub conversation_id: Option<String>,
    /// Prompt and generation options.
    pub options: AnswerOptions,
}

/// A generated answer with its provenance.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The generated answer text.
    pub text: String,
    /// Name of the model that produced the answer.
    pub model_name: String,
    /// Total tokens consumed, when the backend reports it.
    pub tokens_used: Option<u32>,
    /// Citations for the chunks included in the prompt, in prompt order.
    pub citations: Vec<Citation>,
    /// How the document scope was resolved.
    pub resolution: ContextResolution,
    /// Number of chunks handed to prompt assembly.
    pub chunks_used: usize,
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    segmenter: Arc<dyn Segmenter>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    index: Arc<dyn VectorIndex>,
    history: Option<Arc<dyn HistoryStore>>,
    model: Option<Arc<dyn GenerativeModel>>,
    retriever: Retriever,
    resolver: Option<ContextResolver>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Ingest a document: segment, embed, and store its chunk sequence.
    ///
    /// Returns the produced chunks for persistence by the caller. The chunk
    /// texts are embedded when an embedding provider is configured;
    /// otherwise the index backend is expected to embed server-side.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for empty text, or a collaborator
    /// error when embedding or the index upsert fails.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<Vec<Chunk>> {
        let segmented = self.segmenter.segment(&request.text, &request.metadata)?;
        if segmented.chunks.is_empty() {
            info!(document_id = %request.document_id, chunk_count = 0, "ingested document (empty)");
            return Ok(segmented.chunks);
        }

        let vectors = match &self.embedder {
            Some(embedder) => {
                let texts: Vec<&str> =
                    segmented.chunks.iter().map(|c| c.text.as_str()).collect();
                let vectors = embedder.embed_batch(&texts).await.map_err(|e| {
                    error!(document_id = %request.document_id, error = %e, "embedding failed during ingestion");
                    e
                })?;
                if vectors.len() != segmented.chunks.len() {
                    return Err(RagError::PipelineError(format!(
                        "embedding provider returned {} vectors for {} chunks",
                        vectors.len(),
                        segmented.chunks.len()
                    )));
                }
                Some(vectors)
            }
            None => None,
        };

        let mut records = Vec::with_capacity(segmented.chunks.len());
        for (i, chunk) in segmented.chunks.iter().enumerate() {
            records.push(IndexRecord {
                id: chunk.id.clone(),
                text: chunk.text.clone(),
                vector: vectors.as_ref().map(|v| v[i].clone()),
                metadata: wire_metadata(request, chunk)?,
            });
        }

        let collection = collection_name(&request.document_id);
        self.index.upsert(&collection, &records).await.map_err(|e| {
            error!(document_id = %request.document_id, error = %e, "upsert failed during ingestion");
            e
        })?;

        info!(
            document_id = %request.document_id,
            chunk_count = segmented.chunks.len(),
            paragraph_count = segmented.stats.paragraph_count,
            "ingested document"
        );
        Ok(segmented.chunks)
    }

    /// Retrieve the most relevant chunks of one document.
    pub async fn query_document(
        &self,
        document_id: &str,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<RetrievalOutput> {
        self.retriever.retrieve(document_id, query, top_k.unwrap_or(self.config.top_k)).await
    }

    /// Retrieve across multiple documents, merged and ranked.
    pub async fn query_documents(
        &self,
        document_ids: &[String],
        query: &str,
        top_k: Option<usize>,
    ) -> Result<RetrievalOutput> {
        self.retriever
            .retrieve_multi(document_ids, query, top_k.unwrap_or(self.config.top_k))
            .await
    }

    /// Answer a question with retrieved context: resolve the document scope,
    /// retrieve and rank chunks, assemble a prompt (conversational when
    /// history is available), and generate.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for an empty query,
    /// [`RagError::ConfigError`] when no generative model is configured, and
    /// [`RagError::PipelineError`] when zero chunks were retrievable: no
    /// partial prompt is ever sent to the model, and the caller decides
    /// between answering without context and refusing.
    pub async fn answer(&self, request: &AnswerRequest) -> Result<Answer> {
        if request.query.trim().is_empty() {
            return Err(RagError::InvalidInput("query text must not be empty".into()));
        }
        let model = self.model.as_ref().ok_or_else(|| {
            RagError::ConfigError("no generative model configured".to_string())
        })?;

        let resolution = match &self.resolver {
            Some(resolver) => {
                resolver
                    .resolve(
                        &request.user_id,
                        &request.query,
                        &request.document_ids,
                        request.conversation_id.as_deref(),
                    )
                    .await
            }
            None if !request.document_ids.is_empty() => {
                ContextResolution::explicit(&request.document_ids)
            }
            None => ContextResolution::no_documents(),
        };

        let top_k = request.options.top_k.unwrap_or(self.config.top_k);
        let output =
            self.retriever.retrieve_multi(&resolution.document_ids, &request.query, top_k).await?;
        let mut chunks = output.retrieved_chunks;
        if request.options.apply_relevance_filter {
            chunks = filter_by_relevance(chunks, self.config.relevance_threshold);
        }
        if chunks.is_empty() {
            error!(
                user_id = %request.user_id,
                source = ?resolution.source,
                "no context chunks available for generation"
            );
            return Err(RagError::PipelineError(
                "no context chunks were retrieved; answer without context or refuse at the call \
                 site"
                    .to_string(),
            ));
        }

        let assembler = PromptAssembler::new(PromptOptions {
            include_metadata: true,
            max_context_length: request
                .options
                .max_context_length
                .unwrap_or(self.config.max_context_length),
            template: request.options.template,
        });

        let history_turns = self.recent_turns(request).await;
        let assembled = if history_turns.is_empty() {
            assembler.assemble(&request.query, &chunks)
        } else {
            assembler.assemble_conversational(&request.query, &chunks, &history_turns)
        };

        let generation = model.generate(&assembled.prompt, &request.options.generation).await?;
        info!(
            user_id = %request.user_id,
            chunks_used = chunks.len(),
            model = %generation.model_name,
            "generated answer"
        );

        Ok(Answer {
            text: generation.text,
            model_name: generation.model_name,
            tokens_used: generation.tokens_used,
            citations: assembled.citations,
            resolution,
            chunks_used: chunks.len(),
        })
    }

    /// Fetch recent conversation turns; failures degrade to no history.
    async fn recent_turns(&self, request: &AnswerRequest) -> Vec<ChatTurn> {
        let (Some(conversation_id), Some(history)) =
            (request.conversation_id.as_deref(), &self.history)
        else {
            return Vec::new();
        };
        match history
            .find_recent_turns(conversation_id, &request.user_id, self.config.history_turns)
            .await
        {
            Ok(turns) => turns,
            Err(err) => {
                warn!(
                    conversation_id,
                    error = %err,
                    "history lookup failed; answering without conversation history"
                );
                Vec::new()
            }
        }
    }
}

/// Build the wire metadata record stored with one chunk.
fn wire_metadata(request: &IngestRequest, chunk: &Chunk) -> Result<ChunkWireMetadata> {
    let navigation = serde_json::to_string(&chunk.navigation).map_err(|e| {
        RagError::PipelineError(format!("failed to encode navigation metadata: {e}"))
    })?;
    let mut extra = chunk.global_metadata.clone();
    extra.retain(|key, _| !RESERVED_METADATA_KEYS.contains(&key.as_str()));
    Ok(ChunkWireMetadata {
        document_id: request.document_id.clone(),
        filename: request.filename.clone(),
        chunk_index: chunk.chunk_index,
        tokens: chunk.tokens,
        original_index: chunk.source.original_index,
        is_split: chunk.source.is_split,
        is_combined: chunk.source.is_combined,
        navigation,
        extra,
    })
}

/// Builder for constructing a [`RagPipeline`].
///
/// Only the similarity index is required; the segmenter defaults to
/// [`ParagraphSegmenter`] with the configured thresholds. The resolver is
/// available only when a history store is provided.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    segmenter: Option<Arc<dyn Segmenter>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
    history: Option<Arc<dyn HistoryStore>>,
    model: Option<Arc<dyn GenerativeModel>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the segmentation strategy.
    pub fn segmenter(mut self, segmenter: Arc<dyn Segmenter>) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    /// Set the embedding provider.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the similarity index backend.
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the conversation history store.
    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// Set the generative model.
    pub fn model(mut self, model: Arc<dyn GenerativeModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Build the [`RagPipeline`], validating that required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if no index was provided.
    pub fn build(self) -> Result<RagPipeline> {
        let index = self
            .index
            .ok_or_else(|| RagError::ConfigError("index is required".to_string()))?;
        let config = self.config.unwrap_or_default();
        let segmenter = self
            .segmenter
            .unwrap_or_else(|| Arc::new(ParagraphSegmenter::new(config.segmenter.clone())));

        let mut retriever = Retriever::new(index.clone());
        if let Some(embedder) = &self.embedder {
            retriever = retriever.with_embedder(embedder.clone());
        }
        let resolver = self.history.as_ref().map(|history| {
            ContextResolver::new(history.clone())
                .with_lookback(config.context_lookback, config.reference_lookback)
        });

        Ok(RagPipeline {
            config,
            segmenter,
            embedder: self.embedder,
            index,
            history: self.history,
            model: self.model,
            retriever,
            resolver,
        })
    }
}
