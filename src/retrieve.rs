//! Query-time retrieval.
//!
//! Embeds a query with the shared [`EmbeddingProvider`] and returns the
//! nearest chunks from the loaded [`VectorIndex`].

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::embedding::{create_provider, embed_query, EmbeddingProvider};
use crate::index::VectorIndex;
use crate::models::RetrievedChunk;

/// Default number of chunks fed into the prompt.
pub const DEFAULT_K: usize = 3;

/// Read-only view over the index plus the query embedder.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    /// Pair an index with the embedder used for queries.
    ///
    /// Logs a warning if the embedder's model is not the one the index was
    /// built with.
    pub fn new(index: Arc<VectorIndex>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        index.check_model(provider.as_ref());
        Self { index, provider }
    }

    /// Return up to `k` chunks ordered by non-decreasing distance to `query`.
    ///
    /// Fewer than `k` results are returned only when the index holds fewer
    /// chunks. An empty query is embedded like any other string.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let query_vec = embed_query(self.provider.as_ref(), query).await?;

        let hits: Vec<RetrievedChunk> = self
            .index
            .search(&query_vec, k)
            .into_iter()
            .filter_map(|(pos, distance)| {
                self.index.chunk(pos).map(|chunk| RetrievedChunk {
                    chunk: chunk.clone(),
                    distance,
                })
            })
            .collect();

        debug!(k, returned = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}

/// `folio search`: print the `k` nearest chunks to `query` with distances.
pub async fn run_search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let index = VectorIndex::load(&config.index.path)?;
    let provider = create_provider(config).await?;
    let retriever = Retriever::new(Arc::new(index), provider);

    let hits = retriever
        .retrieve(query, k.unwrap_or(config.retrieval.top_k))
        .await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{}. [chunk {}] distance={:.4}",
            rank + 1,
            hit.chunk.index,
            hit.distance
        );
        for line in hit.chunk.text.lines() {
            println!("    {}", line);
        }
        println!();
    }
    Ok(())
}
