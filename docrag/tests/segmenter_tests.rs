//! Behavioral and property tests for the paragraph segmenter.

use std::collections::HashMap;

use docrag::{estimate_tokens, ParagraphSegmenter, RagError, Segmenter, SegmenterConfig};
use proptest::prelude::*;

fn segment(text: &str) -> docrag::Segmented {
    ParagraphSegmenter::default().segment(text, &HashMap::new()).unwrap()
}

/// Paragraph of `words` synthetic words, roughly 7 characters each.
fn paragraph(tag: &str, words: usize) -> String {
    (0..words).map(|i| format!("{tag}{i}")).collect::<Vec<_>>().join(" ") + "."
}

#[test]
fn navigation_flags_mark_exactly_first_and_last() {
    let text = format!("{}\n\n{}\n\n{}", paragraph("alpha", 80), paragraph("beta", 80), paragraph("gamma", 80));
    let chunks = segment(&text).chunks;
    assert!(chunks.len() >= 2);

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.navigation.is_first, i == 0);
        assert_eq!(chunk.navigation.is_last, i == chunks.len() - 1);
        assert_eq!(chunk.navigation.previous_chunk.is_none(), i == 0);
        assert_eq!(chunk.navigation.next_chunk.is_none(), i == chunks.len() - 1);
        if i > 0 {
            assert_eq!(
                chunk.navigation.previous_chunk.as_deref(),
                Some(chunks[i - 1].id.as_str())
            );
        }
    }
}

#[test]
fn overlap_is_drawn_from_previous_chunk_within_budget() {
    let config = SegmenterConfig::default();
    let text = format!("{}\n\n{}\n\n{}", paragraph("one", 120), paragraph("two", 120), paragraph("three", 120));
    let chunks = segment(&text).chunks;

    assert!(chunks[0].overlap.is_none());
    for (i, chunk) in chunks.iter().enumerate().skip(1) {
        if let Some(overlap) = &chunk.overlap {
            assert!(chunks[i - 1].text.contains(&overlap.text));
            assert_eq!(overlap.from_chunk, chunks[i - 1].id);
            assert!(overlap.tokens <= config.overlap_tokens);
            assert!(chunk.text.starts_with(&overlap.text));
        }
    }
}

#[test]
fn undersized_middle_paragraph_is_absorbed() {
    // Paragraph 2 is 40 characters, well under min_tokens = 100; it must be
    // combined into a neighbor rather than emitted as its own chunk.
    let middle = "Short middle paragraph, forty chars long";
    assert_eq!(middle.len(), 40);
    let text = format!("{}\n\n{middle}\n\n{}", paragraph("first", 85), paragraph("last", 85));

    let chunks = segment(&text).chunks;
    assert_eq!(chunks.len(), 2);
    let combined = &chunks[1];
    assert!(combined.source.is_combined);
    assert_eq!(combined.source.combined_count, 2);
    assert!(combined.text.contains(middle));
}

#[test]
fn single_undersized_paragraph_is_emitted_alone() {
    let segmented = segment("Just one tiny paragraph.");
    assert_eq!(segmented.chunks.len(), 1);
    let chunk = &segmented.chunks[0];
    assert!(chunk.navigation.is_first && chunk.navigation.is_last);
    assert!(!chunk.source.is_combined);
    assert!(chunk.overlap.is_none());
}

#[test]
fn oversized_paragraph_splits_at_sentence_boundaries() {
    let config = SegmenterConfig {
        max_tokens: 50,
        min_tokens: 10,
        overlap_tokens: 0,
        combine_threshold: 1000,
    };
    let sentences: String = (0..20).map(|i| format!("Sentence number {i} has a few words. ")).collect();
    let segmenter = ParagraphSegmenter::new(config.clone());
    let chunks = segmenter.segment(&sentences, &HashMap::new()).unwrap().chunks;

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.source.is_split);
        assert!(estimate_tokens(&chunk.text) <= config.max_tokens);
        assert!(chunk.text.trim_end().ends_with('.'));
    }
    let parts: Vec<u32> = chunks.iter().filter_map(|c| c.source.split_part).collect();
    assert_eq!(parts, (1..=chunks.len() as u32).collect::<Vec<_>>());
}

#[test]
fn empty_input_is_rejected() {
    let segmenter = ParagraphSegmenter::default();
    for text in ["", "   ", "\n\n\t"] {
        let err = segmenter.segment(text, &HashMap::new()).unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)), "accepted {text:?}");
    }
}

#[test]
fn caller_metadata_reaches_every_chunk() {
    let metadata = HashMap::from([("title".to_string(), "Annual Report".to_string())]);
    let text = format!("{}\n\n{}", paragraph("a", 80), paragraph("b", 80));
    let segmented = ParagraphSegmenter::default().segment(&text, &metadata).unwrap();
    for chunk in &segmented.chunks {
        assert_eq!(chunk.global_metadata.get("title").map(String::as_str), Some("Annual Report"));
        assert_eq!(chunk.global_metadata.get("strategy").map(String::as_str), Some("paragraph"));
    }
}

/// Words over a small alphabet keep the generated texts realistic enough for
/// the segmentation heuristics while exploring many boundary placements.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        proptest::collection::vec("[a-z]{1,9}", 3..40)
            .prop_map(|words| words.join(" ") + "."),
        1..8,
    )
    .prop_map(|paragraphs| paragraphs.join("\n\n"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Segmenting identical input twice yields byte-identical chunks.
    #[test]
    fn segmentation_is_deterministic(text in arb_text()) {
        let first = segment(&text);
        let second = segment(&text);
        let texts: Vec<&String> = first.chunks.iter().map(|c| &c.text).collect();
        let texts2: Vec<&String> = second.chunks.iter().map(|c| &c.text).collect();
        prop_assert_eq!(texts, texts2);
        let ids: Vec<&String> = first.chunks.iter().map(|c| &c.id).collect();
        let ids2: Vec<&String> = second.chunks.iter().map(|c| &c.id).collect();
        prop_assert_eq!(ids, ids2);
    }

    /// The non-overlap portions of all chunks, concatenated in order,
    /// reconstruct the input up to whitespace normalization.
    #[test]
    fn non_overlap_portions_round_trip(text in arb_text()) {
        let chunks = segment(&text).chunks;
        let mut rebuilt = String::new();
        for chunk in &chunks {
            let body = match &chunk.overlap {
                Some(overlap) => chunk
                    .text
                    .strip_prefix(overlap.text.as_str())
                    .expect("overlap must prefix the chunk text"),
                None => chunk.text.as_str(),
            };
            rebuilt.push(' ');
            rebuilt.push_str(body);
        }

        let rebuilt_words: Vec<&str> = rebuilt.split_whitespace().collect();
        let original_words: Vec<&str> = text.split_whitespace().collect();
        prop_assert_eq!(rebuilt_words, original_words);
    }

    /// Every chunk after the first either has no overlap or one bounded by
    /// the configured budget.
    #[test]
    fn overlap_budget_always_holds(text in arb_text()) {
        let config = SegmenterConfig::default();
        let chunks = segment(&text).chunks;
        for chunk in chunks.iter().skip(1) {
            if let Some(overlap) = &chunk.overlap {
                prop_assert!(overlap.tokens <= config.overlap_tokens);
            }
        }
    }
}
