//! Document chunker.
//!
//! Splits a document into overlapping word windows whose boundaries prefer
//! paragraph breaks, then tags every chunk with metadata from the agent's
//! pattern tables. Chunk contents are exact byte slices of the source, so
//! dropping each chunk's leading overlap and concatenating reconstructs the
//! document.

use regex::Regex;
use std::path::Path;
use tracing::debug;

use crate::agent::CompiledAgentConfig;
use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::{ChunkMetadata, DocumentChunk};

/// Regexes for the numeric flags on `ChunkMetadata`. Also used to detect
/// benchmark intent in queries.
#[derive(Debug, Clone)]
pub struct NumericPatterns {
    numbers: Regex,
    benchmarks: Regex,
}

impl NumericPatterns {
    pub fn new() -> Result<Self> {
        Ok(Self {
            numbers: Regex::new(r"\d+")?,
            // currency amounts, percentages, numeric ranges
            benchmarks: Regex::new(
                r"(?i)(?:[$€£]\s?\d)|(?:\d(?:\.\d+)?\s?%)|(?:\d(?:\.\d+)?\s?(?:-|–|to)\s?[$€£]?\d)",
            )?,
        })
    }

    pub fn has_numbers(&self, text: &str) -> bool {
        self.numbers.is_match(text)
    }

    pub fn has_benchmarks(&self, text: &str) -> bool {
        self.benchmarks.is_match(text)
    }
}

#[derive(Debug, Clone, Copy)]
struct Word {
    start: usize,
    /// Starts a paragraph (after a blank line) or a heading line.
    para_start: bool,
}

#[derive(Debug, Clone)]
pub struct DocumentChunker {
    config: ChunkingConfig,
    patterns: NumericPatterns,
}

impl DocumentChunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, patterns: NumericPatterns::new()? })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn count_tokens(text: &str) -> usize {
        text.split_whitespace().count()
    }

    /// Chunk one document. Excluded files and blank documents produce nothing.
    pub fn chunk(&self, text: &str, filename: &str, agent: &CompiledAgentConfig) -> Vec<DocumentChunk> {
        if agent.is_excluded(filename) {
            return Vec::new();
        }
        let words = scan_words(text);
        if words.is_empty() {
            return Vec::new();
        }

        let spans = self.split(text, &words);
        let headings = scan_headings(text);
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename)
            .to_string();
        let purpose = agent.document_purpose(filename);
        let deprioritized = agent.is_deprioritized(filename);
        let total_chunks = spans.len();
        debug!(file = filename, words = words.len(), chunks = total_chunks, "chunked document");

        spans
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (start_char, end_char))| {
                let content = &text[start_char..end_char];
                let lower = content.to_lowercase();
                let metadata = ChunkMetadata {
                    document_type: agent.document_type(filename, content),
                    topics: agent.topics(&lower),
                    steps: agent.steps(&lower),
                    has_numbers: self.patterns.has_numbers(content),
                    has_benchmarks: self.patterns.has_benchmarks(content),
                    verticals: agent.verticals(content),
                    metrics: agent.metrics(content),
                    document_purpose: purpose,
                    is_deprioritized: deprioritized,
                };
                let section_title = section_for(&headings, start_char, end_char).unwrap_or_else(|| stem.clone());
                DocumentChunk {
                    id: format!("{}:{}", filename, chunk_index),
                    filename: filename.to_string(),
                    section_title,
                    content: content.to_string(),
                    chunk_index,
                    total_chunks,
                    start_char,
                    end_char,
                    metadata,
                }
            })
            .collect()
    }

    /// Byte spans of every chunk. Word window `[s, e)` becomes the span from
    /// the start of word `s` up to the start of word `e` (trailing whitespace
    /// included); the first span starts at 0 and the last ends at `text.len()`.
    fn split(&self, text: &str, words: &[Word]) -> Vec<(usize, usize)> {
        let cfg = &self.config;
        let n = words.len();
        let mut windows: Vec<(usize, usize)> = Vec::new();
        let mut s = 0usize;
        loop {
            if n - s <= cfg.max_chunk_size {
                windows.push((s, n));
                break;
            }
            let lo = s + cfg.min_chunk_size;
            let hi = s + cfg.max_chunk_size;
            let target = s + cfg.target_chunk_size;
            let mut e = (lo..=hi)
                .filter(|&i| words[i].para_start)
                .min_by_key(|&i| i.abs_diff(target))
                .unwrap_or(target);
            // keep the tail at or above the floor instead of leaving an orphan
            e = e.min(n + cfg.overlap_tokens - cfg.min_chunk_size);
            windows.push((s, e));
            s = e - cfg.overlap_tokens;
        }

        let last = windows.len() - 1;
        windows
            .iter()
            .enumerate()
            .map(|(i, &(s, e))| {
                let start = if i == 0 { 0 } else { words[s].start };
                let end = if i == last { text.len() } else { words[e].start };
                (start, end)
            })
            .collect()
    }
}

fn scan_words(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Option<usize> = None;
    let mut prev_end = 0usize;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(start) = current.take() {
                words.push(word_at(text, start, prev_end, words.is_empty()));
                prev_end = i;
            }
        } else if current.is_none() {
            current = Some(i);
        }
    }
    if let Some(start) = current {
        words.push(word_at(text, start, prev_end, words.is_empty()));
    }
    words
}

fn word_at(text: &str, start: usize, prev_end: usize, first: bool) -> Word {
    let gap = &text[prev_end..start];
    let blank_line = gap.matches('\n').count() >= 2;
    let heading = gap.contains('\n') && text[start..].starts_with('#');
    Word { start, para_start: first || blank_line || heading }
}

/// `(byte offset, title)` of every markdown heading line.
fn scan_headings(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            let title = trimmed.trim_start_matches('#').trim();
            if !title.is_empty() {
                out.push((offset, title.to_string()));
            }
        }
        offset += line.len();
    }
    out
}

/// First heading inside the chunk, else the heading in force at its start.
fn section_for(headings: &[(usize, String)], start: usize, end: usize) -> Option<String> {
    headings
        .iter()
        .find(|(pos, _)| *pos >= start && *pos < end)
        .or_else(|| headings.iter().take_while(|(pos, _)| *pos < start).last())
        .map(|(_, t)| t.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRagConfig;

    fn agent() -> CompiledAgentConfig {
        CompiledAgentConfig::new(AgentRagConfig { kb_path: "kb".into(), ..Default::default() }).expect("agent")
    }

    fn small() -> DocumentChunker {
        DocumentChunker::new(ChunkingConfig {
            target_chunk_size: 20,
            max_chunk_size: 30,
            min_chunk_size: 10,
            overlap_tokens: 3,
        })
        .expect("chunker")
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn short_document_is_a_single_chunk() {
        let text = "  Short text\n";
        let chunks = small().chunk(text, "a.txt", &agent());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
        assert_eq!((chunks[0].start_char, chunks[0].end_char), (0, text.len()));
        assert_eq!(chunks[0].section_title, "a");
    }

    #[test]
    fn blank_document_yields_nothing() {
        assert!(small().chunk(" \n\n\t", "a.txt", &agent()).is_empty());
    }

    #[test]
    fn windows_overlap_by_configured_words() {
        let text = words(75);
        let chunks = small().chunk(&text, "a.txt", &agent());
        assert!(chunks.len() >= 3);
        for pair in chunks.windows(2) {
            let overlap = &text[pair[1].start_char..pair[0].end_char];
            assert_eq!(DocumentChunker::count_tokens(overlap), 3);
        }
    }

    #[test]
    fn tail_is_never_an_orphan() {
        // 32 words: one window of 30 would leave a 2-word tail
        let text = words(32);
        let chunks = small().chunk(&text, "a.txt", &agent());
        for c in &chunks {
            let n = DocumentChunker::count_tokens(&c.content);
            assert!((10..=30).contains(&n), "chunk of {n} words");
        }
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let text = format!("{}\n\n{}\n\n{}", words(18), words(18), words(18));
        let chunks = small().chunk(&text, "a.txt", &agent());
        let second_para = text.find("\n\nw0").map(|i| i + 2).expect("para");
        assert_eq!(chunks[0].end_char, second_para);
    }

    #[test]
    fn headings_become_section_titles() {
        let text = format!("# Intro\n{}\n\n## Display CPM\n{}", words(20), words(20));
        let chunks = small().chunk(&text, "bench.md", &agent());
        assert_eq!(chunks[0].section_title, "Intro");
        assert_eq!(chunks.last().map(|c| c.section_title.as_str()), Some("Display CPM"));
    }

    #[test]
    fn numeric_patterns() {
        let p = NumericPatterns::new().expect("patterns");
        assert!(p.has_benchmarks("CPM benchmark $8-15 for RETAIL display"));
        assert!(p.has_benchmarks("CTR of 0.9%"));
        assert!(p.has_benchmarks("between 3 to 5 weeks"));
        assert!(!p.has_benchmarks("step 3 of the plan"));
        assert!(p.has_numbers("step 3"));
        assert!(!p.has_numbers("no digits"));
    }
}
