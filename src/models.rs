//! Core data models used throughout the chatbot.
//!
//! These types represent the chunks, retrieval hits, and conversation turns
//! that flow through the indexing and query pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A contiguous slice of the corpus, the unit of retrieval.
///
/// Chunks are immutable once produced by the splitter and are identified
/// by their position in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    /// SHA-256 of `text`, recorded in the index for integrity checks.
    pub hash: String,
}

impl Chunk {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let hash = text_hash(&text);
        Self { index, text, hash }
    }
}

/// Hex-encoded SHA-256 of a string.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A chunk returned by the retriever together with its distance to the query.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Cosine distance (`1 - cosine similarity`); lower is closer.
    pub distance: f32,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Session-scoped, append-only message history.
///
/// Owned by whoever drives the session (the terminal chat loop) and passed
/// by value through [`crate::chat::ChatContext::submit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn {
            role,
            content: content.into(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
