//! The chat pipeline: retrieve, assemble, generate.
//!
//! [`ChatContext`] owns everything loaded at startup (index, embedder,
//! generation backend) and is shared read-only by the CLI and the HTTP
//! server. Session history is passed in and handed back by
//! [`ChatContext::submit`]; the context itself holds no per-session state.

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::generate::{create_backend, BackendKind, GenerationError, Generator};
use crate::index::VectorIndex;
use crate::models::{Conversation, RetrievedChunk, Role};
use crate::prompt::assemble;
use crate::retrieve::Retriever;
use crate::suggest::suggest_downloads;

/// Text shown to the user when generation fails.
pub fn render_failure(kind: BackendKind, err: &GenerationError) -> String {
    match kind {
        BackendKind::Local | BackendKind::Fallback => format!("[Local generation error: {}]", err),
        BackendKind::Remote => format!("[Error generating reply: {}]", err),
    }
}

/// Shared process state for answering questions.
pub struct ChatContext {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl ChatContext {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>, top_k: usize) -> Self {
        Self {
            retriever,
            generator,
            top_k,
        }
    }

    /// Load the index, embedder and generation backend described by `config`.
    ///
    /// # Errors
    ///
    /// Fails if the index cannot be loaded or the embedder cannot be created.
    /// An unavailable local model is not an error (see
    /// [`crate::generate::create_backend`]).
    pub async fn load(config: &Config) -> Result<Self> {
        let index = VectorIndex::load(&config.index.path).with_context(|| {
            format!(
                "Failed to load vector index from {} (run `folio index build` first)",
                config.index.path.display()
            )
        })?;
        let provider = create_provider(config).await?;
        let retriever = Retriever::new(Arc::new(index), provider);
        let generator = create_backend(&config.generation).await?;

        Ok(Self::new(retriever, generator, config.retrieval.top_k))
    }

    /// Answer `text`, returning the reply and the chunks it was grounded on.
    ///
    /// Generation failures become in-band reply text. Only retrieval errors
    /// are returned as `Err`.
    pub async fn answer_with_sources(&self, text: &str) -> Result<(String, Vec<RetrievedChunk>)> {
        let start = Instant::now();

        let hits = self.retriever.retrieve(text, self.top_k).await?;
        let prompt = assemble(&hits, text);

        let kind = self.generator.kind();
        let reply = match self.generator.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(backend = %kind, error = %e, "Generation failed");
                render_failure(kind, &e)
            }
        };

        info!(
            message_len = text.chars().count(),
            retrieved = hits.len(),
            backend = %kind,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "chat request"
        );

        Ok((reply, hits))
    }

    /// Answer `text` without session history.
    pub async fn answer(&self, text: &str) -> Result<String> {
        Ok(self.answer_with_sources(text).await?.0)
    }

    /// Answer `text` and append the user and assistant turns to `history`.
    ///
    /// History is only extended when a reply was produced.
    pub async fn submit(&self, mut history: Conversation, text: &str) -> Result<(Conversation, String)> {
        let reply = self.answer(text).await?;
        history.push(Role::User, text);
        history.push(Role::Assistant, reply.clone());
        Ok((history, reply))
    }
}

/// `folio ask`: answer one question and print the reply.
pub async fn run_ask(config: &Config, question: &str, k: Option<usize>) -> Result<()> {
    let mut ctx = ChatContext::load(config).await?;
    if let Some(k) = k {
        ctx.top_k = k;
    }

    let (reply, sources) = ctx.answer_with_sources(question).await?;
    println!("{}", reply);

    if !sources.is_empty() {
        println!();
        println!("Sources:");
        for s in &sources {
            println!("  [chunk {}] distance={:.4}", s.chunk.index, s.distance);
        }
    }
    Ok(())
}

/// `folio chat`: interactive terminal session.
///
/// Keeps one [`Conversation`] for the session and prints download
/// suggestions after each reply. Ends on EOF, `exit` or `quit`.
pub async fn run_chat(config: &Config) -> Result<()> {
    let ctx = ChatContext::load(config).await?;
    let mut history = Conversation::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Ask me about the profile. Type `exit` to quit.");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }

        let (next, reply) = match ctx.submit(history.clone(), text).await {
            Ok(out) => out,
            Err(e) => {
                error!(error = %e, "chat turn failed");
                println!("[Error: {:#}]", e);
                continue;
            }
        };
        history = next;
        println!("{}", reply);

        let suggestions = suggest_downloads(text);
        if !suggestions.is_empty() {
            println!();
            println!("Suggested downloads:");
            for s in &suggestions {
                println!("  {} ({})", s.label, s.path);
            }
        }
        println!();
    }

    info!(turns = history.len(), "chat session ended");
    Ok(())
}
