//! Text segmentation into bounded, overlap-linked chunks.
//!
//! This module provides the [`Segmenter`] trait and its production
//! implementation [`ParagraphSegmenter`], which splits document text along
//! paragraph boundaries, splits oversized paragraphs at sentence boundaries,
//! absorbs undersized paragraphs into their neighbors, and links consecutive
//! chunks with a short overlap drawn from the preceding chunk's text.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::document::{
    Chunk, ChunkNavigation, OverlapInfo, SegmentStats, Segmented, SourceMetadata,
};
use crate::error::{RagError, Result};

/// Runs of non-terminator characters ending in `.`, `!` or `?`.
static SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]+").expect("valid sentence regex"));

/// Estimate the token count of a text as `ceil(chars / 4)`.
///
/// This approximation is used for every sizing decision in segmentation and
/// must not be replaced by a real tokenizer: previously ingested chunk
/// boundaries would become inconsistent with newly ingested ones unless all
/// thresholds were re-derived at the same time.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32).div_ceil(4)
}

/// Configuration for [`ParagraphSegmenter`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SegmenterConfig {
    /// Maximum token estimate per chunk; larger paragraphs are split.
    pub max_tokens: u32,
    /// Minimum token estimate per chunk; smaller paragraphs absorb followers.
    pub min_tokens: u32,
    /// Token budget for the overlap prepended to each chunk after the first.
    pub overlap_tokens: u32,
    /// Target size when grouping sentences in the fallback extraction strategy.
    pub combine_threshold: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self { max_tokens: 1000, min_tokens: 100, overlap_tokens: 50, combine_threshold: 200 }
    }
}

/// A strategy for splitting document text into retrieval chunks.
///
/// Implementations are pure, synchronous string processing: no suspension
/// points and no shared mutable state. Segmenting independent documents in
/// parallel is safe; chunk construction within one document is strictly
/// sequential because each chunk's overlap depends on the previous chunk's
/// final text.
pub trait Segmenter: Send + Sync {
    /// Split `text` into an ordered chunk sequence.
    ///
    /// `global_metadata` is merged onto every produced chunk.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if `text` is empty or whitespace.
    fn segment(&self, text: &str, global_metadata: &HashMap<String, String>)
        -> Result<Segmented>;
}

/// An intermediate unit during segmentation; created and discarded within
/// one call.
#[derive(Debug, Clone)]
struct Paragraph {
    id: String,
    text: String,
    tokens: u32,
    index: usize,
    is_split: bool,
    split_part: Option<u32>,
    is_combined: bool,
    combined_count: u32,
}

impl Paragraph {
    fn new(id: String, text: String, index: usize) -> Self {
        let tokens = estimate_tokens(&text);
        Self {
            id,
            text,
            tokens,
            index,
            is_split: false,
            split_part: None,
            is_combined: false,
            combined_count: 1,
        }
    }
}

/// Splits text into paragraph-aligned chunks with linked overlap.
///
/// Chunk IDs are derived from paragraph positions (`para_3`,
/// `para_3_split_1`, `combined_para_1_para_2`) and are stable across
/// re-derivation given identical input and configuration.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{ParagraphSegmenter, Segmenter, SegmenterConfig};
///
/// let segmenter = ParagraphSegmenter::new(SegmenterConfig::default());
/// let segmented = segmenter.segment(&text, &metadata)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParagraphSegmenter {
    config: SegmenterConfig,
}

impl ParagraphSegmenter {
    /// Create a new segmenter with the given configuration.
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    /// Return a reference to the segmenter configuration.
    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Extract paragraphs; the first strategy that yields more than one unit
    /// wins.
    fn extract_paragraphs(&self, text: &str) -> Vec<Paragraph> {
        let mut paragraphs: Vec<String> = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        if paragraphs.len() <= 1 {
            paragraphs = split_by_single_newlines(text);
        }
        if paragraphs.len() <= 1 {
            paragraphs = self.paragraphs_from_sentences(text);
        }

        paragraphs
            .into_iter()
            .enumerate()
            .map(|(index, text)| Paragraph::new(format!("para_{index}"), text, index))
            .collect()
    }

    /// Fallback strategy: group sentences until the running token estimate
    /// exceeds `combine_threshold`.
    fn paragraphs_from_sentences(&self, text: &str) -> Vec<String> {
        let sentences = split_sentences(text);
        let mut paragraphs = Vec::new();
        let mut current = String::new();

        for sentence in sentences {
            let combined = join_with_space(&current, sentence.trim());
            if estimate_tokens(&combined) > self.config.combine_threshold && !current.is_empty() {
                paragraphs.push(std::mem::replace(&mut current, sentence.trim().to_string()));
            } else {
                current = combined;
            }
        }
        if !current.is_empty() {
            paragraphs.push(current);
        }
        paragraphs
    }

    /// Walk paragraphs in order, splitting oversized ones and absorbing
    /// undersized ones into their followers.
    fn optimize(&self, paragraphs: Vec<Paragraph>) -> Vec<Paragraph> {
        let mut optimized = Vec::new();
        let mut i = 0;

        while i < paragraphs.len() {
            let paragraph = &paragraphs[i];
            if paragraph.tokens > self.config.max_tokens {
                optimized.extend(self.split_large(paragraph));
                i += 1;
            } else if paragraph.tokens < self.config.min_tokens && i < paragraphs.len() - 1 {
                let (combined, next_index) = self.combine_from(&paragraphs, i);
                optimized.push(combined);
                i = next_index;
            } else {
                optimized.push(paragraph.clone());
                i += 1;
            }
        }
        optimized
    }

    /// Split an oversized paragraph at sentence boundaries, greedily packing
    /// sentences up to `max_tokens` per part.
    fn split_large(&self, paragraph: &Paragraph) -> Vec<Paragraph> {
        let sentences = split_sentences(&paragraph.text);
        let mut parts: Vec<Paragraph> = Vec::new();
        let mut current = String::new();

        let flush = |current: &mut String, parts: &mut Vec<Paragraph>| {
            let text = std::mem::take(current);
            let mut part =
                Paragraph::new(format!("{}_split_{}", paragraph.id, parts.len()), text, paragraph.index);
            part.is_split = true;
            part.split_part = Some(parts.len() as u32 + 1);
            parts.push(part);
        };

        for sentence in sentences {
            let combined = join_with_space(&current, sentence.trim());
            if estimate_tokens(&combined) > self.config.max_tokens && !current.is_empty() {
                flush(&mut current, &mut parts);
                current = sentence.trim().to_string();
            } else {
                current = combined;
            }
        }
        if !current.is_empty() {
            flush(&mut current, &mut parts);
        }
        parts
    }

    /// Absorb following paragraphs into an undersized one until the combined
    /// estimate reaches `min_tokens` or absorbing the next paragraph would
    /// exceed `max_tokens`. Returns the combined paragraph and the index of
    /// the first paragraph not absorbed.
    fn combine_from(&self, paragraphs: &[Paragraph], start: usize) -> (Paragraph, usize) {
        let mut combined_text = paragraphs[start].text.clone();
        let mut total_tokens = paragraphs[start].tokens;
        let mut end = start;
        let mut combined_ids = vec![paragraphs[start].id.clone()];

        for (j, next) in paragraphs.iter().enumerate().skip(start + 1) {
            let potential = format!("{combined_text}\n\n{}", next.text);
            let potential_tokens = estimate_tokens(&potential);
            if potential_tokens > self.config.max_tokens {
                break;
            }
            combined_text = potential;
            total_tokens = potential_tokens;
            end = j;
            combined_ids.push(next.id.clone());
            if total_tokens >= self.config.min_tokens {
                break;
            }
        }

        let mut combined = Paragraph::new(
            format!("combined_{}", combined_ids.join("_")),
            combined_text,
            start,
        );
        combined.tokens = total_tokens;
        combined.is_combined = end > start;
        combined.combined_count = (end - start + 1) as u32;
        (combined, end + 1)
    }

    /// Build chunks in order, prepending to each chunk after the first an
    /// overlap drawn from the previous chunk's final text.
    fn build_chunks(&self, paragraphs: Vec<Paragraph>) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = Vec::new();

        for (i, paragraph) in paragraphs.into_iter().enumerate() {
            let mut final_text = paragraph.text.clone();
            let mut overlap = None;

            if i > 0 && self.config.overlap_tokens > 0 {
                let previous = &chunks[chunks.len() - 1];
                let overlap_text = self.extract_overlap(&previous.text);
                // Overlaps shorter than 10 characters carry no useful context.
                if overlap_text.chars().count() > 10 {
                    final_text = format!("{overlap_text}\n\n{}", paragraph.text);
                    overlap = Some(OverlapInfo {
                        tokens: estimate_tokens(&overlap_text),
                        text: overlap_text,
                        from_chunk: previous.id.clone(),
                    });
                }
            }

            chunks.push(Chunk {
                id: paragraph.id,
                tokens: estimate_tokens(&final_text),
                text: final_text,
                original_tokens: paragraph.tokens,
                chunk_index: i,
                overlap,
                source: SourceMetadata {
                    original_index: paragraph.index,
                    is_split: paragraph.is_split,
                    is_combined: paragraph.is_combined,
                    split_part: paragraph.split_part,
                    combined_count: paragraph.combined_count,
                },
                navigation: ChunkNavigation::default(),
                global_metadata: HashMap::new(),
            });
        }
        chunks
    }

    /// Compute the overlap string from the tail of the previous chunk's text:
    /// at most `floor(overlap_tokens * 0.75)` words, at most 20% of the
    /// previous chunk's words, and never more than 30 words. The overlap's
    /// token estimate never exceeds `overlap_tokens`. When a sentence
    /// terminator falls in the back half of the overlap, the overlap is
    /// truncated to end there.
    fn extract_overlap(&self, previous_text: &str) -> String {
        let words: Vec<&str> = previous_text.split_whitespace().collect();
        let target = (self.config.overlap_tokens as usize * 3 / 4)
            .min(words.len() / 5)
            .min(30);
        if target == 0 {
            return String::new();
        }

        let mut start = words.len() - target;
        let mut overlap = words[start..].join(" ");
        // The word-count heuristic assumes short words; long ones can still
        // blow the token budget, so trim from the front until it holds.
        while estimate_tokens(&overlap) > self.config.overlap_tokens {
            start += 1;
            if start >= words.len() {
                return String::new();
            }
            overlap = words[start..].join(" ");
        }

        if let Some(pos) = overlap.rfind('.') {
            if pos as f64 > overlap.len() as f64 * 0.5 {
                return overlap[..=pos].to_string();
            }
        }
        overlap
    }
}

impl Segmenter for ParagraphSegmenter {
    fn segment(
        &self,
        text: &str,
        global_metadata: &HashMap<String, String>,
    ) -> Result<Segmented> {
        if text.trim().is_empty() {
            return Err(RagError::InvalidInput("document text must not be empty".into()));
        }

        let cleaned = normalize(text);
        let paragraphs = self.extract_paragraphs(&cleaned);
        let paragraph_count = paragraphs.len();
        let optimized = self.optimize(paragraphs);
        let mut chunks = self.build_chunks(optimized);

        // Package: navigation links and shared metadata.
        let count = chunks.len();
        let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let mut metadata = global_metadata.clone();
        metadata.insert("strategy".to_string(), "paragraph".to_string());
        for (i, chunk) in chunks.iter_mut().enumerate() {
            chunk.navigation = ChunkNavigation {
                is_first: i == 0,
                is_last: i == count - 1,
                previous_chunk: (i > 0).then(|| ids[i - 1].clone()),
                next_chunk: (i + 1 < count).then(|| ids[i + 1].clone()),
            };
            chunk.global_metadata = metadata.clone();
        }

        let stats = SegmentStats {
            original_length: text.chars().count(),
            cleaned_length: cleaned.chars().count(),
            paragraph_count,
            chunk_count: count,
        };
        debug!(
            paragraph_count,
            chunk_count = count,
            cleaned_length = stats.cleaned_length,
            "segmented document text"
        );

        Ok(Segmented { chunks, stats })
    }
}

/// Normalize whitespace: unify line endings, convert tabs to spaces,
/// collapse runs of spaces, strip spaces after newlines, cap consecutive
/// blank lines at one, and trim.
fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\t', " ");
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;
    let mut pending_space = false;

    for ch in text.chars() {
        match ch {
            '\n' => {
                pending_space = false;
                newlines += 1;
                if newlines <= 2 {
                    out.push('\n');
                }
            }
            ' ' => {
                // Spaces immediately after a newline are dropped.
                if newlines == 0 {
                    pending_space = true;
                }
            }
            _ => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                newlines = 0;
                out.push(ch);
            }
        }
    }
    out.trim().to_string()
}

/// Merge single lines into paragraphs: a line starting with an uppercase
/// letter, following a line ending in terminal punctuation, and longer than
/// 20 characters starts a new paragraph.
fn split_by_single_newlines(text: &str) -> Vec<String> {
    let lines = text.split('\n').map(str::trim).filter(|l| !l.is_empty());
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for line in lines {
        let starts_upper = line.chars().next().is_some_and(char::is_uppercase);
        let previous_terminal = current.trim_end().ends_with(['.', '!', '?']);
        let is_new_paragraph = starts_upper && previous_terminal && line.chars().count() > 20;

        if is_new_paragraph && !current.is_empty() {
            paragraphs.push(std::mem::replace(&mut current, line.to_string()));
        } else {
            current = join_with_space(&current, line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    paragraphs
}

/// Split text into sentences, keeping an unterminated tail as a final
/// sentence; text without any terminator is returned whole.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut consumed = 0;
    for m in SENTENCE_RE.find_iter(text) {
        sentences.push(m.as_str());
        consumed = m.end();
    }
    if sentences.is_empty() {
        return vec![text];
    }
    let tail = &text[consumed..];
    if !tail.trim().is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn join_with_space(current: &str, addition: &str) -> String {
    if current.is_empty() {
        addition.to_string()
    } else {
        format!("{current} {addition}")
    }
}
