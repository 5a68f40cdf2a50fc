//! Configuration loading.
//!
//! Settings come from three layers, applied in order:
//!
//! 1. Built-in defaults (every section is `#[serde(default)]`).
//! 2. An optional TOML file passed via `--config`.
//! 3. Environment overrides (`CHAT_MODE`, `PORT`, `MODEL_PATH`,
//!    `FAISS_STORE_PATH`, `LOCAL_EMBEDDING_PATH`, `LOCAL_LLM_MODEL`,
//!    `OPENAI_API_KEY`, ...).
//!
//! The merged result is validated before use.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./vector_store"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
            separators: ["\n\n", "\n", ".", " ", ""]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Where downloaded model files are cached.
    pub cache_dir: PathBuf,
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            model: "all-minilm-l6-v2".to_string(),
            dims: None,
            cache_dir: PathBuf::from("./local_embeddings"),
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

/// Which generation strategy answers chat requests.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Local,
    OpenAI,
}

impl FromStr for ChatMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(ChatMode::Local),
            "OPENAI" => Ok(ChatMode::OpenAI),
            other => bail!("Unknown CHAT_MODE: '{}'. Must be LOCAL or OPENAI.", other),
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMode::Local => write!(f, "LOCAL"),
            ChatMode::OpenAI => write!(f, "OPENAI"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub mode: ChatMode,
    pub local_model: String,
    pub local_url: String,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub remote_model: String,
    pub remote_url: String,
    pub remote_max_tokens: u32,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            mode: ChatMode::Local,
            local_model: "tinyllama".to_string(),
            local_url: "http://localhost:11434".to_string(),
            max_new_tokens: 300,
            temperature: 0.7,
            top_p: 0.95,
            remote_model: "gpt-4o-mini".to_string(),
            remote_url: "https://api.openai.com".to_string(),
            remote_max_tokens: 300,
            api_key: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(mode) = get("CHAT_MODE") {
            self.generation.mode = mode.parse()?;
        }
        if let Some(port) = get("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT: '{}'", port))?;
        }
        if let Some(model) = get("LOCAL_LLM_MODEL") {
            self.generation.local_model = model;
        }
        // MODEL_PATH names the exact model to load and wins over LOCAL_LLM_MODEL.
        if let Some(model) = get("MODEL_PATH") {
            self.generation.local_model = model;
        }
        if let Some(url) = get("LOCAL_LLM_URL") {
            self.generation.local_url = url;
        }
        if let Some(path) = get("FAISS_STORE_PATH") {
            self.index.path = PathBuf::from(path);
        }
        if let Some(path) = get("LOCAL_EMBEDDING_PATH") {
            self.embedding.cache_dir = PathBuf::from(path);
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.generation.remote_model = model;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.generation.remote_url = url;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.generation.api_key = Some(key);
        }

        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap,
                self.chunking.chunk_size
            );
        }
        if self.chunking.separators.last().map(String::as_str) != Some("") {
            bail!("chunking.separators must end with \"\" (character-level fallback)");
        }

        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }

        if !(self.generation.top_p > 0.0 && self.generation.top_p <= 1.0) {
            bail!("generation.top_p must be in (0.0, 1.0]");
        }
        if self.generation.temperature < 0.0 {
            bail!("generation.temperature must be >= 0.0");
        }
        if self.generation.max_new_tokens == 0 || self.generation.remote_max_tokens == 0 {
            bail!("generation token budgets must be > 0");
        }

        match self.embedding.provider.as_str() {
            "local" | "openai" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be local or openai.",
                other
            ),
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        Ok(())
    }
}

/// Parse configuration from TOML text (without environment overrides).
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment. The result is validated.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            parse_config(&content)?
        }
        None => Config::default(),
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;

    Ok(config)
}
