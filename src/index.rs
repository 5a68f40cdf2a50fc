//! Persisted vector index.
//!
//! An ordered collection of `(embedding, chunk)` pairs, built once from the
//! cleaned corpus and read-only afterwards. Lookup is exhaustive cosine
//! similarity over every stored vector, which is exact and fast enough for a
//! single profile document.
//!
//! # On-disk layout
//!
//! ```text
//! <index.path>/
//!   index.json    metadata: model, dims, count, created_at, vectors_sha256
//!   chunks.json   chunk records in index order
//!   vectors.bin   count × dims little-endian f32
//! ```
//!
//! Loading verifies counts, dimensionality, the vector checksum, and every
//! chunk's text hash. Any mismatch is a hard error: the index is only
//! trusted because this crate wrote it.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, warn};

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::{
    blob_to_vec, cosine_similarity, create_provider, embed_batched, vec_to_blob, EmbeddingProvider,
};
use crate::models::{text_hash, Chunk};

const META_FILE: &str = "index.json";
const CHUNKS_FILE: &str = "chunks.json";
const VECTORS_FILE: &str = "vectors.bin";
const FORMAT_VERSION: u32 = 1;

/// Index metadata stored in `index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    /// Embedding model that produced the vectors.
    pub model: String,
    pub dims: usize,
    pub count: usize,
    pub created_at: DateTime<Utc>,
    pub vectors_sha256: String,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    meta: IndexMeta,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Pair chunks with their vectors. Every vector must have `dims` entries.
    pub fn new(model: &str, dims: usize, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            bail!(
                "Index needs one vector per chunk: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }
        if let Some(pos) = vectors.iter().position(|v| v.len() != dims) {
            bail!(
                "Vector {} has {} dims; index expects {}",
                pos,
                vectors[pos].len(),
                dims
            );
        }

        let meta = IndexMeta {
            version: FORMAT_VERSION,
            model: model.to_string(),
            dims,
            count: chunks.len(),
            created_at: Utc::now(),
            vectors_sha256: vectors_checksum(&vectors),
        };

        Ok(Self {
            meta,
            chunks,
            vectors,
        })
    }

    /// Chunk `text`, embed every chunk with `provider`, and assemble an index.
    pub async fn build(
        provider: &dyn EmbeddingProvider,
        text: &str,
        chunking: &ChunkingConfig,
        batch_size: usize,
    ) -> Result<Self> {
        let chunks = chunk_text(text, chunking);
        if chunks.is_empty() {
            bail!("Corpus is empty; nothing to index");
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_batched(provider, &texts, batch_size).await?;

        info!(
            chunks = chunks.len(),
            model = provider.model_name(),
            "embedded corpus"
        );

        Self::new(provider.model_name(), provider.dims(), chunks, vectors)
    }

    /// Write the index to `dir`, replacing any index already there.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;

        let mut blob = Vec::with_capacity(self.meta.count * self.meta.dims * 4);
        for v in &self.vectors {
            blob.extend_from_slice(&vec_to_blob(v));
        }

        write_atomic(&dir.join(VECTORS_FILE), &blob)?;
        write_atomic(&dir.join(CHUNKS_FILE), &serde_json::to_vec(&self.chunks)?)?;
        // Metadata goes last; a partial save then fails the checksum on load.
        write_atomic(&dir.join(META_FILE), &serde_json::to_vec_pretty(&self.meta)?)?;

        info!(
            path = %dir.display(),
            count = self.meta.count,
            dims = self.meta.dims,
            "index saved"
        );
        Ok(())
    }

    /// Load and verify an index written by [`VectorIndex::save`].
    pub fn load(dir: &Path) -> Result<Self> {
        let meta_path = dir.join(META_FILE);
        let meta: IndexMeta = serde_json::from_slice(
            &std::fs::read(&meta_path)
                .with_context(|| format!("Failed to read index metadata: {}", meta_path.display()))?,
        )
        .with_context(|| format!("Corrupt index metadata: {}", meta_path.display()))?;

        if meta.version != FORMAT_VERSION {
            bail!(
                "Unsupported index format version {} (expected {}); rebuild the index",
                meta.version,
                FORMAT_VERSION
            );
        }

        let chunks_path = dir.join(CHUNKS_FILE);
        let chunks: Vec<Chunk> = serde_json::from_slice(
            &std::fs::read(&chunks_path)
                .with_context(|| format!("Failed to read index chunks: {}", chunks_path.display()))?,
        )
        .with_context(|| format!("Corrupt index chunks: {}", chunks_path.display()))?;

        let vectors_path = dir.join(VECTORS_FILE);
        let blob = std::fs::read(&vectors_path)
            .with_context(|| format!("Failed to read index vectors: {}", vectors_path.display()))?;

        if chunks.len() != meta.count {
            bail!(
                "Corrupt index: metadata lists {} chunks, found {}",
                meta.count,
                chunks.len()
            );
        }
        let expected_len = meta
            .count
            .checked_mul(meta.dims)
            .and_then(|n| n.checked_mul(4));
        let Some(expected_len) = expected_len else {
            bail!(
                "Corrupt index: {} chunks × {} dims does not fit in memory",
                meta.count,
                meta.dims
            );
        };
        if meta.dims == 0 || blob.len() != expected_len {
            bail!(
                "Corrupt index: vectors file is {} bytes, expected {} × {} × 4",
                blob.len(),
                meta.count,
                meta.dims
            );
        }

        let flat = blob_to_vec(&blob);
        let vectors: Vec<Vec<f32>> = flat.chunks(meta.dims).map(|c| c.to_vec()).collect();

        if vectors_checksum(&vectors) != meta.vectors_sha256 {
            bail!("Corrupt index: vector checksum mismatch in {}", vectors_path.display());
        }
        for (pos, chunk) in chunks.iter().enumerate() {
            if chunk.index != pos || text_hash(&chunk.text) != chunk.hash {
                bail!("Corrupt index: chunk {} failed integrity check", pos);
            }
        }

        info!(
            path = %dir.display(),
            count = meta.count,
            model = %meta.model,
            dims = meta.dims,
            "index loaded"
        );

        Ok(Self {
            meta,
            chunks,
            vectors,
        })
    }

    /// Warn when the query-time model differs from the model that built the
    /// index. Returns `true` if they match.
    ///
    /// A mismatch is not rejected; retrieval still runs, with degraded
    /// quality. Dimension mismatches make every similarity `0.0`.
    pub fn check_model(&self, provider: &dyn EmbeddingProvider) -> bool {
        let matches = self.meta.model == provider.model_name() && self.meta.dims == provider.dims();
        if !matches {
            warn!(
                index_model = %self.meta.model,
                index_dims = self.meta.dims,
                query_model = provider.model_name(),
                query_dims = provider.dims(),
                "embedding model differs from the one used to build the index"
            );
        }
        matches
    }

    /// Return up to `k` `(position, distance)` pairs, nearest first.
    ///
    /// Distance is `1 - cosine similarity`. Ties keep index order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, 1.0 - cosine_similarity(query, v)))
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    pub fn chunk(&self, pos: usize) -> Option<&Chunk> {
        self.chunks.get(pos)
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// `folio index build`: embed the cleaned corpus at `input` and write the
/// index to `index.path`, replacing any previous index.
pub async fn run_index_build(config: &Config, input: &Path) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read corpus file: {}", input.display()))?;

    let provider = create_provider(config).await?;
    let index = VectorIndex::build(
        provider.as_ref(),
        &text,
        &config.chunking,
        config.embedding.batch_size,
    )
    .await?;
    index.save(&config.index.path)?;

    println!(
        "Indexed {} chunks ({} dims, model {}) into {}",
        index.len(),
        index.meta().dims,
        index.meta().model,
        config.index.path.display()
    );
    Ok(())
}

/// `folio index info`: print metadata of the index at `index.path`.
pub fn run_index_info(config: &Config) -> Result<()> {
    let index = VectorIndex::load(&config.index.path)?;
    let meta = index.meta();

    println!("Vector Index");
    println!("============");
    println!();
    println!("  Path:      {}", config.index.path.display());
    println!("  Model:     {}", meta.model);
    println!("  Dims:      {}", meta.dims);
    println!("  Chunks:    {}", meta.count);
    println!("  Created:   {}", meta.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();
    Ok(())
}

fn vectors_checksum(vectors: &[Vec<f32>]) -> String {
    let mut hasher = Sha256::new();
    for v in vectors {
        hasher.update(vec_to_blob(v));
    }
    format!("{:x}", hasher.finalize())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn sample() -> VectorIndex {
        let chunks = vec![
            Chunk::new(0, "AI experience"),
            Chunk::new(1, "Python skills"),
            Chunk::new(2, "Web projects"),
        ];
        let vectors = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]];
        VectorIndex::new("test-model", 3, chunks, vectors).unwrap()
    }

    struct NamedProvider(&'static str, usize);

    #[async_trait]
    impl EmbeddingProvider for NamedProvider {
        fn model_name(&self) -> &str {
            self.0
        }
        fn dims(&self) -> usize {
            self.1
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0; self.1]).collect())
        }
    }

    #[test]
    fn test_new_rejects_mismatched_lengths() {
        assert!(VectorIndex::new("m", 2, vec![Chunk::new(0, "a")], vec![]).is_err());
        assert!(VectorIndex::new("m", 2, vec![Chunk::new(0, "a")], vec![vec![1.0]]).is_err());
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample();
        let hits = index.search(&[0.1, 0.9, 0.2], 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0, 1);
        assert!(hits.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let index = sample();
        assert_eq!(index.search(&[1.0, 0.0, 0.0], 10).len(), 3);
        assert_eq!(index.search(&[1.0, 0.0, 0.0], 1).len(), 1);
    }

    #[test]
    fn test_search_ties_keep_index_order() {
        let index = sample();
        let hits = index.search(&[0.0, 0.0, 0.0], 3);
        let order: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_save_load_roundtrip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store");

        sample().save(&path).unwrap();
        let loaded = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.meta().model, "test-model");
        assert_eq!(loaded.chunk(1).unwrap().text, "Python skills");

        let smaller =
            VectorIndex::new("other", 2, vec![Chunk::new(0, "only")], vec![vec![1.0, 1.0]])
                .unwrap();
        smaller.save(&path).unwrap();
        let reloaded = VectorIndex::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.meta().model, "other");
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = VectorIndex::load(&dir.path().join("absent")).unwrap_err();
        assert!(err.to_string().contains("Failed to read index metadata"));
    }

    #[test]
    fn test_load_detects_tampered_vectors() {
        let dir = tempfile::tempdir().unwrap();
        sample().save(dir.path()).unwrap();

        let vectors_path = dir.path().join(VECTORS_FILE);
        let mut blob = std::fs::read(&vectors_path).unwrap();
        blob[0] ^= 0xFF;
        std::fs::write(&vectors_path, blob).unwrap();

        let err = VectorIndex::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_load_detects_truncated_vectors() {
        let dir = tempfile::tempdir().unwrap();
        sample().save(dir.path()).unwrap();
        std::fs::write(dir.path().join(VECTORS_FILE), [0u8; 8]).unwrap();
        assert!(VectorIndex::load(dir.path()).is_err());
    }

    #[test]
    fn test_load_rejects_oversized_dims() {
        let dir = tempfile::tempdir().unwrap();
        sample().save(dir.path()).unwrap();

        let meta_path = dir.path().join(META_FILE);
        let mut meta: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&meta_path).unwrap()).unwrap();
        meta["dims"] = serde_json::json!(usize::MAX / 2);
        std::fs::write(&meta_path, serde_json::to_vec(&meta).unwrap()).unwrap();

        let err = VectorIndex::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Corrupt index"));
    }

    #[test]
    fn test_load_detects_edited_chunk_text() {
        let dir = tempfile::tempdir().unwrap();
        sample().save(dir.path()).unwrap();

        let chunks_path = dir.path().join(CHUNKS_FILE);
        let edited = std::fs::read_to_string(&chunks_path)
            .unwrap()
            .replace("Python skills", "Haskell skills");
        std::fs::write(&chunks_path, edited).unwrap();

        let err = VectorIndex::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("integrity"));
    }

    #[test]
    fn test_check_model() {
        let index = sample();
        assert!(index.check_model(&NamedProvider("test-model", 3)));
        assert!(!index.check_model(&NamedProvider("all-minilm-l6-v2", 3)));
        assert!(!index.check_model(&NamedProvider("test-model", 384)));
    }

    #[tokio::test]
    async fn test_build_rejects_empty_corpus() {
        let provider = NamedProvider("m", 4);
        let err = VectorIndex::build(&provider, "  \n\n ", &ChunkingConfig::default(), 8)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn test_build_embeds_every_chunk() {
        let provider = NamedProvider("m", 4);
        let text = "First paragraph.\n\nSecond paragraph.";
        let index = VectorIndex::build(&provider, text, &ChunkingConfig::default(), 8)
            .await
            .unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.meta().dims, 4);
        assert_eq!(index.meta().model, "m");
    }
}
