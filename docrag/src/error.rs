//! Error types for the `docrag` crate.

use thiserror::Error;

/// Errors that can occur in the RAG core.
#[derive(Debug, Error)]
pub enum RagError {
    /// Malformed or missing required input (empty document text, empty query).
    ///
    /// Surfaced to the caller immediately and never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No index collection exists for the requested document.
    ///
    /// Surfaced by single-document retrieval; multi-document retrieval
    /// catches it per document and skips that document instead.
    #[error("Collection not found for document: {document_id}")]
    CollectionNotFound {
        /// The document whose collection is missing.
        document_id: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the similarity index backend.
    #[error("Index error ({backend}): {message}")]
    IndexError {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the conversation history store.
    #[error("History store error: {0}")]
    HistoryError(String),

    /// An error occurred during answer generation.
    #[error("Generation error ({model}): {message}")]
    GenerationError {
        /// The model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
