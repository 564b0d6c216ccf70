//! # Quickstart
//!
//! Ingests two small documents into the in-memory index, resolves the
//! document scope for a follow-up question, retrieves and ranks chunks, and
//! prints the assembled prompt with its citations. Uses a toy topic
//! embedder and a canned model so the demo runs fully offline.
//!
//! Run: `cargo run --example quickstart`

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use docrag::{
    AnswerOptions, AnswerRequest, EmbeddingProvider, Generation, GenerationOptions,
    GenerativeModel, IngestRequest, InMemoryHistoryStore, InMemoryVectorIndex, RagPipeline,
    RecordedMessage, Result,
};

/// Maps topic words onto axis-aligned vectors; good enough to demonstrate
/// ranking without a real embedding service.
struct TopicEmbedder;

#[async_trait]
impl EmbeddingProvider for TopicEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let topics = ["battery", "charging", "warranty", "display"];
        let lower = text.to_lowercase();
        let mut vector = vec![0.0f32; topics.len()];
        for (i, topic) in topics.iter().enumerate() {
            vector[i] = lower.matches(topic).count() as f32;
        }
        if vector.iter().all(|v| *v == 0.0) {
            vector[0] = 0.1;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        4
    }
}

/// Echoes a canned answer; a real deployment would plug in an LLM client.
struct CannedModel;

#[async_trait]
impl GenerativeModel for CannedModel {
    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<Generation> {
        Ok(Generation {
            text: format!("(canned answer for a {}-character prompt)", prompt.len()),
            tokens_used: None,
            model_name: "canned".into(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let history = Arc::new(InMemoryHistoryStore::new());
    let pipeline = RagPipeline::builder()
        .index(Arc::new(InMemoryVectorIndex::new()))
        .embedder(Arc::new(TopicEmbedder))
        .history(history.clone())
        .model(Arc::new(CannedModel))
        .build()?;

    let manual = "The battery lasts up to 18 hours of mixed use. Charging from zero to \
        eighty percent takes 45 minutes with the bundled fast charger. Battery health \
        can be checked in the settings app.\n\nThe display is a 6.1 inch OLED panel \
        with adaptive refresh between 10 and 120 hertz. Display brightness peaks at \
        1600 nits outdoors.";
    let warranty = "The limited warranty covers manufacturing defects for 24 months \
        from the date of purchase. Battery capacity below 80 percent within the first \
        12 months is covered. Accidental damage is not covered by the warranty.";

    println!("Ingesting documents...");
    for (id, filename, text) in [
        ("doc-manual", "user-manual.pdf", manual),
        ("doc-warranty", "warranty-terms.pdf", warranty),
    ] {
        let chunks = pipeline
            .ingest(&IngestRequest {
                document_id: id.into(),
                filename: filename.into(),
                text: text.into(),
                metadata: HashMap::new(),
            })
            .await?;
        println!("  {id}: {} chunks", chunks.len());
    }

    // First turn: the user attaches the warranty document explicitly.
    let first = pipeline
        .answer(&AnswerRequest {
            user_id: "demo-user".into(),
            query: "how long is the warranty?".into(),
            document_ids: vec!["doc-warranty".into()],
            conversation_id: Some("demo-conv".into()),
            options: AnswerOptions::default(),
        })
        .await?;
    println!("\nQ: how long is the warranty?");
    println!("A: {} (source: {:?})", first.text, first.resolution.source);
    history
        .push(
            "demo-conv",
            "demo-user",
            RecordedMessage {
                query: "how long is the warranty?".into(),
                answer: Some(first.text),
                document_ids: vec!["doc-warranty".into()],
            },
        )
        .await;

    // Follow-up: no attachment; the resolver pulls the document from the
    // conversation context.
    let follow_up = pipeline
        .answer(&AnswerRequest {
            user_id: "demo-user".into(),
            query: "does it cover battery wear?".into(),
            document_ids: vec![],
            conversation_id: Some("demo-conv".into()),
            options: AnswerOptions::default(),
        })
        .await?;
    println!("\nQ: does it cover battery wear?");
    println!("A: {} (source: {:?})", follow_up.text, follow_up.resolution.source);
    println!("\nCitations:");
    for citation in &follow_up.citations {
        println!(
            "  [{}] {} (chunk {}, score {})",
            citation.id, citation.file_name, citation.chunk_index, citation.relevance_score
        );
    }

    Ok(())
}
