//! Prompt assembly.
//!
//! Fills a fixed instruction template with the retrieved context and the
//! user's question. No logic beyond slot substitution.

use crate::models::RetrievedChunk;

/// The sentence the model is told to emit when the context lacks an answer.
pub const REFUSAL: &str =
    "I'm sorry, but this question is outside the scope of the provided profile information.";

/// A per-request prompt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Full text sent to the model.
    pub text: String,
    /// The user's question as typed.
    pub question: String,
}

/// Join chunk texts with a blank line. Empty when there are no chunks.
pub fn join_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the prompt for `question` over the retrieved `chunks`.
pub fn assemble(chunks: &[RetrievedChunk], question: &str) -> Prompt {
    let context = join_context(chunks);
    let text = format!(
        "You are a helpful assistant trained to answer questions strictly based on the provided profile.

Context:
{context}

Question:
{question}

Instructions:
- If the answer is clearly found in the context, respond accurately and concisely.
- If the question is unrelated to the context or the answer is not present, respond with:
\"{REFUSAL}\"

Answer:"
    );

    Prompt {
        text,
        question: question.to_string(),
    }
}
