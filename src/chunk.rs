//! Recursive character text splitter.
//!
//! Splits the cleaned corpus into overlapping [`Chunk`]s bounded by a
//! maximum character length. Separators are tried coarsest first
//! (`"\n\n"`, `"\n"`, `"."`, `" "`) down to `""`, which falls back to
//! single characters.
//!
//! # Algorithm
//!
//! 1. Pick the first separator that occurs in the text (or `""`).
//! 2. Split on it, keeping the separator at the start of the following piece.
//! 3. Pieces shorter than `chunk_size` are accumulated; a piece that is too
//!    long is split recursively with the remaining, finer separators.
//! 4. Accumulated pieces are merged greedily up to `chunk_size`. When a chunk
//!    is emitted, up to `overlap` characters of trailing pieces are carried
//!    over as the start of the next chunk.
//! 5. Emitted chunks are whitespace-trimmed; empty chunks are dropped.
//!
//! All lengths are measured in characters, not bytes.
//!
//! # Guarantees
//!
//! - Every chunk is at most `chunk_size` characters, unless a piece cannot be
//!   split any further (only possible when `""` is not among the separators).
//! - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
//! - The split is deterministic for a given text and configuration.

use std::collections::VecDeque;

use crate::config::ChunkingConfig;
use crate::models::Chunk;

/// Separator-driven splitter holding the chunking parameters.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, overlap: usize, separators: Vec<String>) -> Self {
        Self {
            chunk_size,
            overlap,
            separators,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.overlap, config.separators.clone())
    }

    /// Split `text` into chunk strings.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];

        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }

            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks
    }

    /// Greedily merge small pieces into chunks, carrying `overlap` characters forward.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(doc) = join_trimmed(&window) {
                    out.push(doc);
                }
                // Drop leading pieces until the carried context fits the overlap
                // and the incoming piece fits the chunk.
                while total > self.overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        if let Some(doc) = join_trimmed(&window) {
            out.push(doc);
        }

        out
    }
}

/// Split a corpus into indexed [`Chunk`]s using the configured splitter.
///
/// Returns an empty vector for text that is empty or whitespace-only.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    TextSplitter::from_config(config)
        .split(text)
        .into_iter()
        .enumerate()
        .map(|(i, t)| Chunk::new(i, t))
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on a literal separator, attaching each separator to the piece that
/// follows it. An empty separator yields single characters. Empty pieces are
/// dropped.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_trimmed(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
