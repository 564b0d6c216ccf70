//! Tests for prompt assembly: context budget, sentinel, citations, history.

use docrag::{
    ChatRole, ChatTurn, InstructionTemplate, PromptAssembler, PromptOptions, RetrievedChunk,
    RetrievedMetadata,
};
use proptest::prelude::*;

fn chunk(index: usize, content: String, score: f32) -> RetrievedChunk {
    RetrievedChunk {
        content,
        metadata: RetrievedMetadata {
            document_id: "doc-1".into(),
            filename: "handbook.pdf".into(),
            chunk_index: index,
            ..Default::default()
        },
        score,
        relevance_score: 1.0 - score,
        document_id: "doc-1".into(),
        chunk_index: index,
        tokens: 40,
    }
}

fn assembler(max_context_length: usize) -> PromptAssembler {
    PromptAssembler::new(PromptOptions { max_context_length, ..Default::default() })
}

/// The rendered context section sits between the fixed markers of the
/// prompt template.
fn context_section(prompt: &str) -> &str {
    let start = prompt.find("Context Information:\n").expect("context marker") +
        "Context Information:\n".len();
    let end = prompt.find("\n\nQuestion:").expect("question marker");
    &prompt[start..end]
}

#[test]
fn includes_chunks_first_fit_and_drops_the_rest() {
    // Each rendered block is ~200 characters; a 500-character budget fits
    // exactly two of the three chunks.
    let chunks: Vec<RetrievedChunk> =
        (0..3).map(|i| chunk(i, format!("content {i} {}", "x".repeat(100)), 0.9)).collect();
    let result = assembler(500).assemble("what is this?", &chunks);

    assert_eq!(result.citations.len(), 2);
    assert!(result.prompt.contains("content 0"));
    assert!(result.prompt.contains("content 1"));
    assert!(!result.prompt.contains("content 2"));
}

#[test]
fn citations_mirror_inclusion_order() {
    let chunks = vec![
        chunk(4, "first included".repeat(3), 0.91),
        chunk(2, "second included".repeat(3), 0.85),
    ];
    let result = PromptAssembler::default().assemble("q", &chunks);

    assert_eq!(result.citations.len(), 2);
    assert_eq!(result.citations[0].id, 1);
    assert_eq!(result.citations[0].chunk_index, 4);
    assert_eq!(result.citations[1].id, 2);
    assert_eq!(result.citations[1].chunk_index, 2);
    assert_eq!(result.citations[0].file_name, "handbook.pdf");
    assert_eq!(result.citations[0].page, "N/A");
    assert_eq!(result.citations[0].relevance_score, "0.9100");
}

#[test]
fn budget_smaller_than_first_chunk_yields_sentinel() {
    let chunks = vec![chunk(0, "a long paragraph ".repeat(30), 0.9)];
    let result = assembler(50).assemble("q", &chunks);

    assert!(result.prompt.contains("No relevant context found."));
    assert!(result.citations.is_empty());
}

#[test]
fn conversational_prompt_places_history_between_context_and_question() {
    let chunks = vec![chunk(0, "relevant context".into(), 0.9)];
    let history = vec![
        ChatTurn { role: ChatRole::User, content: "what is chapter one about?".into() },
        ChatTurn { role: ChatRole::Assistant, content: "it introduces the topic".into() },
    ];
    let prompt =
        PromptAssembler::default().build_conversational("and chapter two?", &chunks, &history);

    let context_at = prompt.find("relevant context").unwrap();
    let history_at = prompt.find("Previous Conversation:").unwrap();
    let question_at = prompt.find("Current Question:").unwrap();
    assert!(context_at < history_at && history_at < question_at);
    assert!(prompt.contains("User: what is chapter one about?"));
    assert!(prompt.contains("Assistant: it introduces the topic"));
}

#[test]
fn plain_prompt_uses_selected_template() {
    let options = PromptOptions {
        template: InstructionTemplate::from_name("strict"),
        ..Default::default()
    };
    let prompt = PromptAssembler::new(options).build("q", &[]);
    assert!(prompt.starts_with("You are an assistant that answers questions strictly"));
}

#[test]
fn empty_content_chunks_are_skipped() {
    let chunks = vec![chunk(0, String::new(), 0.9), chunk(1, "real content".into(), 0.8)];
    let result = PromptAssembler::default().assemble("q", &chunks);

    assert_eq!(result.citations.len(), 1);
    assert_eq!(result.citations[0].chunk_index, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// The rendered context section never exceeds the configured budget,
    /// except for the sentinel when nothing fits.
    #[test]
    fn context_section_never_exceeds_budget(
        sizes in proptest::collection::vec(1usize..400, 0..12),
        budget in 30usize..2000,
    ) {
        let chunks: Vec<RetrievedChunk> = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| chunk(i, "c".repeat(*size), 0.5))
            .collect();
        let result = assembler(budget).assemble("question", &chunks);
        let section = context_section(&result.prompt);

        if section == "No relevant context found." {
            prop_assert!(result.citations.is_empty());
        } else {
            prop_assert!(section.len() <= budget, "{} > {budget}", section.len());
            prop_assert!(!result.citations.is_empty());
        }
    }
}
