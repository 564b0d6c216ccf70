//! Document context resolution for conversational queries.
//!
//! Decides, per query, which document set should be searched, using a
//! priority cascade: explicit attachment, recent-conversation context,
//! lexical reference detection, then no documents. The resolver never fails;
//! collaborator errors degrade the affected branch to an empty result and
//! the cascade continues.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::document::{dedupe_preserving_order, ContextResolution, ContextSource};
use crate::history::HistoryStore;

/// Messages consulted for conversation context.
pub const DEFAULT_CONTEXT_LOOKBACK: usize = 3;
/// Messages consulted after a lexical reference was detected.
pub const DEFAULT_REFERENCE_LOOKBACK: usize = 5;

/// Lexical patterns catching anaphoric references to an earlier document.
static REFERENCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(this|that|the|it|its)\b.*\b(document|file|pdf|report|paper)\b",
        r"(?i)\b(what|tell me|explain|describe)\b.*\b(about|in)\b.*\b(it|this|that)\b",
        r"(?i)\b(continue|more|further|additional)\b.*\b(details|information|info)\b",
        r"(?i)\b(above|previous|earlier|mentioned)\b",
        r"(?i)^(and|also|additionally|furthermore|moreover)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid reference pattern"))
    .collect()
});

/// Whether the query text lexically references a previously discussed
/// document. Any single pattern match is sufficient; matching is
/// case-insensitive.
pub fn detect_document_reference(query_text: &str) -> bool {
    REFERENCE_PATTERNS.iter().any(|pattern| pattern.is_match(query_text))
}

/// Resolves which documents are in scope for a query.
#[derive(Clone)]
pub struct ContextResolver {
    history: Arc<dyn HistoryStore>,
    context_lookback: usize,
    reference_lookback: usize,
}

impl ContextResolver {
    /// Create a resolver with the default lookback windows (3 and 5 messages).
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self {
            history,
            context_lookback: DEFAULT_CONTEXT_LOOKBACK,
            reference_lookback: DEFAULT_REFERENCE_LOOKBACK,
        }
    }

    /// Override the lookback windows.
    pub fn with_lookback(mut self, context: usize, reference: usize) -> Self {
        self.context_lookback = context;
        self.reference_lookback = reference;
        self
    }

    /// Resolve the active document set for a query.
    ///
    /// Branches are evaluated in priority order and short-circuit: once a
    /// branch produces a non-empty set, no later lookup is issued.
    pub async fn resolve(
        &self,
        user_id: &str,
        query_text: &str,
        explicit_document_ids: &[String],
        conversation_id: Option<&str>,
    ) -> ContextResolution {
        if !explicit_document_ids.is_empty() {
            debug!(count = explicit_document_ids.len(), "using explicitly attached documents");
            return ContextResolution::explicit(explicit_document_ids);
        }

        if let Some(conversation_id) = conversation_id {
            let document_ids =
                self.recent_documents(conversation_id, user_id, self.context_lookback).await;
            if !document_ids.is_empty() {
                debug!(
                    conversation_id,
                    count = document_ids.len(),
                    "using conversation context documents"
                );
                return ContextResolution {
                    document_ids,
                    source: ContextSource::ConversationContext,
                    context_used: true,
                };
            }
        }

        if detect_document_reference(query_text) {
            if let Some(conversation_id) = conversation_id {
                let document_ids = self
                    .recent_documents(conversation_id, user_id, self.reference_lookback)
                    .await;
                if !document_ids.is_empty() {
                    debug!(
                        conversation_id,
                        count = document_ids.len(),
                        "detected document reference, using recent documents"
                    );
                    return ContextResolution {
                        document_ids,
                        source: ContextSource::ReferenceDetected,
                        context_used: true,
                    };
                }
            }
        }

        debug!("no documents available for context");
        ContextResolution::no_documents()
    }

    /// Union-and-deduplicate the document IDs referenced by the last `limit`
    /// messages. A history failure degrades to an empty set.
    async fn recent_documents(
        &self,
        conversation_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Vec<String> {
        match self.history.find_recent_document_refs(conversation_id, user_id, limit).await {
            Ok(refs) => {
                let all: Vec<String> = refs.into_iter().flatten().collect();
                dedupe_preserving_order(&all)
            }
            Err(err) => {
                warn!(
                    conversation_id,
                    error = %err,
                    "history lookup failed; continuing without conversation context"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pronoun_noun_references() {
        assert!(detect_document_reference("what does this document say?"));
        assert!(detect_document_reference("summarize the PDF please"));
        assert!(detect_document_reference("Tell me more about it, what is in this?"));
    }

    #[test]
    fn detects_continuations_and_backrefs() {
        assert!(detect_document_reference("continue with more details"));
        assert!(detect_document_reference("as mentioned before"));
        assert!(detect_document_reference("And the second point?"));
        assert!(detect_document_reference("what about it?"));
    }

    #[test]
    fn ignores_standalone_queries() {
        assert!(!detect_document_reference("how tall is Mount Everest?"));
        assert!(!detect_document_reference("compute 2 + 2"));
    }
}
