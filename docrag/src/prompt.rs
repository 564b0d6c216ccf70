//! Prompt assembly under a hard character budget.
//!
//! [`PromptAssembler`] turns ranked chunks (and optionally conversation
//! history) into one instruction + context + question prompt, together with
//! a citation list that mirrors exactly the chunks included in the prompt
//! body.

use tracing::warn;

use crate::document::{Citation, PromptAssemblyResult, RetrievedChunk};
use crate::history::{ChatRole, ChatTurn};

/// Default character budget for the rendered context section.
pub const DEFAULT_MAX_CONTEXT_LENGTH: usize = 4000;
/// Conversation turns included in a conversational prompt.
const HISTORY_TURNS: usize = 5;
/// Rendered in place of the context section when nothing fits.
const NO_CONTEXT_SENTINEL: &str = "No relevant context found.";

/// Named instruction presets.
///
/// A closed set; unrecognized names fall back to
/// [`InstructionTemplate::Default`] rather than failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstructionTemplate {
    /// Balanced document-assistant instructions.
    #[default]
    Default,
    /// Answer strictly from the provided context.
    Strict,
    /// Context as a knowledge base, general knowledge allowed.
    Creative,
    /// Cite chunks explicitly in the answer.
    Citation,
    /// Thorough, comprehensive answers.
    Detailed,
    /// Brief, direct answers.
    Concise,
}

impl InstructionTemplate {
    /// Look up a template by name, falling back to `Default`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "strict" => Self::Strict,
            "creative" => Self::Creative,
            "citation" => Self::Citation,
            "detailed" => Self::Detailed,
            "concise" => Self::Concise,
            _ => Self::Default,
        }
    }

    /// The instruction text for this template.
    pub fn text(&self) -> &'static str {
        match self {
            Self::Default => {
                "You are an intelligent assistant helping users understand documents. Use the \
                 context information below to answer the question accurately and concisely. If \
                 the context doesn't contain enough information to answer the question fully, \
                 acknowledge what you don't know and provide what information you can based on \
                 the context."
            }
            Self::Strict => {
                "You are an assistant that answers questions strictly based on the provided \
                 context. Only use information from the context below. If the context does not \
                 contain the answer, respond with \"I cannot answer this question based on the \
                 provided documents.\""
            }
            Self::Creative => {
                "You are a helpful assistant. Use the context below as a knowledge base, but \
                 feel free to provide comprehensive answers that go beyond the context when \
                 helpful. Always indicate when you're using information from the context versus \
                 general knowledge."
            }
            Self::Citation => {
                "You are an assistant that provides well-cited answers. Use the context \
                 information below to answer questions, and always cite which part of the \
                 context you're using (e.g., \"According to Chunk #1...\" or \"As mentioned in \
                 Chunk #3...\"). Include source references in your answer."
            }
            Self::Detailed => {
                "You are a thorough assistant that provides detailed, comprehensive answers. \
                 Use all relevant information from the context below. Break down complex topics \
                 into understandable explanations and provide examples where applicable."
            }
            Self::Concise => {
                "You are a concise assistant. Provide brief, direct answers based strictly on \
                 the context below. Keep responses short and to the point, typically 2-3 \
                 sentences unless more detail is absolutely necessary."
            }
        }
    }
}

/// Summary style for [`PromptAssembler::build_summarization`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummaryStyle {
    /// A brief 2-3 paragraph summary.
    #[default]
    Brief,
    /// A comprehensive summary of all topics.
    Detailed,
    /// A bullet-point summary.
    Bullets,
}

impl SummaryStyle {
    fn instruction(&self) -> &'static str {
        match self {
            Self::Brief => "Provide a brief summary (2-3 paragraphs) of the main points.",
            Self::Detailed => {
                "Provide a comprehensive, detailed summary covering all major topics and \
                 subtopics."
            }
            Self::Bullets => "Provide a bullet-point summary of the key points and takeaways.",
        }
    }
}

/// Analysis flavor for [`PromptAssembler::build_analysis`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnalysisKind {
    /// General insight extraction.
    #[default]
    General,
    /// Compare and contrast.
    Comparison,
    /// Extract specific requested information.
    Extraction,
    /// Tone and sentiment.
    Sentiment,
}

impl AnalysisKind {
    fn instruction(&self) -> &'static str {
        match self {
            Self::General => "Analyze the content and provide insights.",
            Self::Comparison => "Compare and contrast the different aspects mentioned.",
            Self::Extraction => "Extract and list the specific information requested.",
            Self::Sentiment => "Analyze the tone and sentiment of the content.",
        }
    }
}

/// Prompt customization options.
#[derive(Debug, Clone)]
pub struct PromptOptions {
    /// Render a metadata header above each chunk.
    pub include_metadata: bool,
    /// Hard character budget for the rendered context section.
    pub max_context_length: usize,
    /// Instruction preset.
    pub template: InstructionTemplate,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            max_context_length: DEFAULT_MAX_CONTEXT_LENGTH,
            template: InstructionTemplate::Default,
        }
    }
}

/// Builds instruction + context + history prompts from ranked chunks.
///
/// Chunks are consumed in their given order (already rank-sorted by the
/// retrieval layer) and included first-fit: assembly stops at the first
/// chunk whose rendered text would exceed the budget, and already-included
/// chunks are never evicted for a later one.
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    options: PromptOptions,
}

impl PromptAssembler {
    /// Create an assembler with the given options.
    pub fn new(options: PromptOptions) -> Self {
        Self { options }
    }

    /// Return a reference to the assembler options.
    pub fn options(&self) -> &PromptOptions {
        &self.options
    }

    /// Build a plain RAG prompt.
    pub fn build(&self, query: &str, chunks: &[RetrievedChunk]) -> String {
        let (context, _) = self.build_context(chunks);
        format!(
            "{instruction}\n\nContext Information:\n{context}\n\nQuestion: {query}\n\nAnswer:",
            instruction = self.options.template.text(),
        )
    }

    /// Build a conversational prompt with a history section between the
    /// context and the current question. Only the last 5 turns are included.
    pub fn build_conversational(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
        chat_history: &[ChatTurn],
    ) -> String {
        let (context, _) = self.build_context(chunks);
        let history_section = if chat_history.is_empty() {
            String::new()
        } else {
            format!("\nPrevious Conversation:\n{}\n", format_chat_history(chat_history))
        };
        format!(
            "{instruction}\n\nContext Information:\n{context}\n{history_section}\nCurrent \
             Question: {query}\n\nAnswer:",
            instruction = self.options.template.text(),
        )
    }

    /// Build a plain prompt together with its citation list.
    pub fn assemble(&self, query: &str, chunks: &[RetrievedChunk]) -> PromptAssemblyResult {
        let (_, included) = self.build_context(chunks);
        PromptAssemblyResult {
            prompt: self.build(query, chunks),
            citations: citations(chunks, &included),
        }
    }

    /// Build a conversational prompt together with its citation list.
    pub fn assemble_conversational(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
        chat_history: &[ChatTurn],
    ) -> PromptAssemblyResult {
        let (_, included) = self.build_context(chunks);
        PromptAssemblyResult {
            prompt: self.build_conversational(query, chunks, chat_history),
            citations: citations(chunks, &included),
        }
    }

    /// Build a summarization prompt over the given chunks.
    pub fn build_summarization(chunks: &[RetrievedChunk], style: SummaryStyle) -> String {
        let content =
            chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n\n");
        format!(
            "Please summarize the following content. {}\n\nContent:\n{content}\n\nSummary:",
            style.instruction(),
        )
    }

    /// Build an analysis prompt over the given chunks, context-budgeted like
    /// the question prompts.
    pub fn build_analysis(
        &self,
        request: &str,
        chunks: &[RetrievedChunk],
        kind: AnalysisKind,
    ) -> String {
        let (context, _) = self.build_context(chunks);
        format!(
            "{}\n\nContext:\n{context}\n\nAnalysis Request: {request}\n\nAnalysis:",
            kind.instruction(),
        )
    }

    /// Render the context section, first-fit under the character budget.
    ///
    /// Returns the rendered section and the indexes of the chunks included.
    /// When zero chunks fit (or zero were retrieved) the section is the
    /// literal sentinel and the call does not fail.
    fn build_context(&self, chunks: &[RetrievedChunk]) -> (String, Vec<usize>) {
        let mut context = String::new();
        let mut current_length = 0usize;
        let mut included = Vec::new();

        for (i, chunk) in chunks.iter().enumerate() {
            if chunk.content.is_empty() {
                warn!(index = i, "chunk has no text content, skipping");
                continue;
            }

            let chunk_text = if self.options.include_metadata {
                format!("{}\n{}", format_metadata_header(chunk, i + 1), chunk.content)
            } else {
                chunk.content.clone()
            };
            let block = format!("\n\n--- Chunk {} ---\n{chunk_text}", i + 1);

            if current_length + block.len() > self.options.max_context_length {
                break;
            }
            context.push_str(&block);
            current_length += block.len();
            included.push(i);
        }

        if context.is_empty() {
            (NO_CONTEXT_SENTINEL.to_string(), included)
        } else {
            (context, included)
        }
    }
}

/// Render the `[Chunk #n] …` metadata header for one chunk.
fn format_metadata_header(chunk: &RetrievedChunk, number: usize) -> String {
    let mut parts = vec![format!("[Chunk #{number}]")];
    parts.push(format!("Index: {}", chunk.chunk_index));
    parts.push(format!("Document: {}", display_or_unknown(&chunk.document_id)));
    parts.push(format!("File: {}", display_or_unknown(&chunk.metadata.filename)));
    if let Some(page) = page_reference(chunk) {
        parts.push(format!("Page: {page}"));
    }
    parts.push(format!("Tokens: {}", chunk.tokens));
    parts.push(format!("Similarity: {:.1}%", chunk.score * 100.0));
    parts.join(" | ")
}

fn display_or_unknown(value: &str) -> &str {
    if value.is_empty() { "Unknown" } else { value }
}

fn page_reference(chunk: &RetrievedChunk) -> Option<&String> {
    chunk.metadata.extra.get("page").or_else(|| chunk.metadata.extra.get("pageNumber"))
}

/// Format the last 5 turns as alternating `User:`/`Assistant:` lines.
fn format_chat_history(chat_history: &[ChatTurn]) -> String {
    let skip = chat_history.len().saturating_sub(HISTORY_TURNS);
    chat_history[skip..]
        .iter()
        .map(|turn| {
            let role = match turn.role {
                ChatRole::User => "User",
                ChatRole::Assistant => "Assistant",
            };
            format!("{role}: {}", turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Project citations for the chunks actually included in the prompt body,
/// in inclusion order.
fn citations(chunks: &[RetrievedChunk], included: &[usize]) -> Vec<Citation> {
    included
        .iter()
        .enumerate()
        .map(|(position, &index)| {
            let chunk = &chunks[index];
            Citation {
                id: position + 1,
                chunk_index: chunk.chunk_index,
                document_id: display_or_unknown(&chunk.document_id).to_string(),
                file_name: display_or_unknown(&chunk.metadata.filename).to_string(),
                page: page_reference(chunk).cloned().unwrap_or_else(|| "N/A".to_string()),
                relevance_score: format!("{:.4}", chunk.score),
                preview: preview(&chunk.content),
            }
        })
        .collect()
}

fn preview(content: &str) -> String {
    let head: String = content.chars().take(100).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RetrievedMetadata;

    fn chunk(content: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            content: content.to_string(),
            metadata: RetrievedMetadata {
                filename: "notes.pdf".into(),
                ..RetrievedMetadata::default()
            },
            score,
            relevance_score: 1.0 - score,
            document_id: "doc-1".into(),
            chunk_index: 0,
            tokens: 10,
        }
    }

    #[test]
    fn unknown_template_falls_back_to_default() {
        assert_eq!(InstructionTemplate::from_name("nonsense"), InstructionTemplate::Default);
        assert_eq!(InstructionTemplate::from_name("strict"), InstructionTemplate::Strict);
    }

    #[test]
    fn empty_retrieval_renders_sentinel() {
        let assembler = PromptAssembler::default();
        let prompt = assembler.build("what is this?", &[]);
        assert!(prompt.contains("No relevant context found."));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn metadata_header_lists_expected_fields() {
        let header = format_metadata_header(&chunk("text", 0.85), 2);
        assert!(header.starts_with("[Chunk #2]"));
        assert!(header.contains("Document: doc-1"));
        assert!(header.contains("File: notes.pdf"));
        assert!(header.contains("Similarity: 85.0%"));
    }

    #[test]
    fn history_is_trimmed_to_last_five_turns() {
        let turns: Vec<ChatTurn> = (0..8)
            .map(|i| ChatTurn {
                role: if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant },
                content: format!("turn {i}"),
            })
            .collect();
        let formatted = format_chat_history(&turns);
        assert!(!formatted.contains("turn 2"));
        assert!(formatted.contains("turn 3"));
        assert!(formatted.contains("turn 7"));
        assert_eq!(formatted.lines().count(), 5);
    }

    #[test]
    fn summarization_prompt_joins_chunk_texts() {
        let chunks = vec![chunk("first part", 0.9), chunk("second part", 0.8)];
        let prompt = PromptAssembler::build_summarization(&chunks, SummaryStyle::Bullets);
        assert!(prompt.contains("bullet-point summary"));
        assert!(prompt.contains("first part\n\nsecond part"));
        assert!(prompt.ends_with("Summary:"));
    }

    #[test]
    fn analysis_prompt_is_context_budgeted() {
        let assembler = PromptAssembler::new(PromptOptions {
            max_context_length: 40,
            ..Default::default()
        });
        let prompt =
            assembler.build_analysis("compare them", &[chunk("oversized", 0.9)], AnalysisKind::Comparison);
        assert!(prompt.contains("Compare and contrast"));
        assert!(prompt.contains("No relevant context found."));
        assert!(prompt.contains("Analysis Request: compare them"));
    }

    #[test]
    fn citation_preview_truncates_to_100_chars() {
        let long = "x".repeat(250);
        let result = PromptAssembler::default().assemble("q", &[chunk(&long, 0.9)]);
        assert_eq!(result.citations.len(), 1);
        assert_eq!(result.citations[0].preview.chars().count(), 103);
        assert_eq!(result.citations[0].relevance_score, "0.9000");
    }
}
