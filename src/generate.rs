//! Generation backends.
//!
//! Three interchangeable [`Generator`] implementations, chosen once at
//! startup by [`create_backend`]:
//!
//! - **[`LocalBackend`]** talks to an Ollama-compatible runtime on the local
//!   host (`POST /api/generate`, `raw: true`, `stream: false`) with nucleus
//!   sampling options. The model is probed at load time via `POST /api/show`.
//! - **[`RemoteBackend`]** calls an OpenAI-compatible chat completions
//!   endpoint with a bounded output-token budget.
//! - **[`FallbackBackend`]** answers with a canned reply when `LOCAL` mode was
//!   requested but the local model could not be loaded.
//!
//! Backends never render their own failures. They return
//! [`GenerationError`] and the caller decides what text the user sees
//! (see [`crate::chat::render_failure`]).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{ChatMode, GenerationConfig};
use crate::prompt::Prompt;

/// Canned reply for short messages when no local model is available.
pub const FALLBACK_SHORT_REPLY: &str =
    "Nice! Tell me more — I can also run locally if you install Hugging Face transformers.";

/// Canned reply for longer messages when no local model is available.
pub const FALLBACK_LONG_REPLY: &str = "I received your message. To enable smarter replies, pull a local model and set LOCAL_LLM_MODEL in your environment.";

/// Messages shorter than this (in characters) get [`FALLBACK_SHORT_REPLY`].
pub const FALLBACK_SHORT_LIMIT: usize = 40;

const SNIPPET_CHARS: usize = 240;

/// Errors produced while generating a reply.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport/HTTP client error.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-successful HTTP status from the model endpoint.
    #[error("unexpected HTTP status {status} from {url}: {snippet}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        /// First characters of the response body.
        snippet: String,
    },

    /// Response body did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A required credential is not configured.
    #[error("{0} is not set")]
    MissingCredentials(&'static str),

    /// The endpoint answered but produced no completion.
    #[error("model returned no completion")]
    EmptyOutput,
}

/// Which strategy produced (or failed to produce) a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
    Fallback,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Remote => write!(f, "remote"),
            BackendKind::Fallback => write!(f, "fallback"),
        }
    }
}

/// Turns an assembled prompt into reply text.
#[async_trait]
pub trait Generator: Send + Sync {
    fn kind(&self) -> BackendKind;
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}

/// Select the backend for `config.mode`.
///
/// In `LOCAL` mode a model that fails to load degrades to
/// [`FallbackBackend`] with a warning. In `OPENAI` mode a missing API key is
/// not an error here; it surfaces on each request instead.
pub async fn create_backend(config: &GenerationConfig) -> anyhow::Result<Arc<dyn Generator>> {
    let backend: Arc<dyn Generator> = match config.mode {
        ChatMode::Local => match LocalBackend::load(config).await {
            Ok(local) => Arc::new(local),
            Err(e) => {
                warn!(
                    model = %config.local_model,
                    url = %config.local_url,
                    error = %e,
                    "Local model unavailable, using canned replies"
                );
                Arc::new(FallbackBackend)
            }
        },
        ChatMode::OpenAI => Arc::new(RemoteBackend::new(config)?),
    };

    info!(
        mode = %config.mode,
        backend = %backend.kind(),
        model = backend.model_name(),
        "Generation backend ready"
    );
    Ok(backend)
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, GenerationError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

async fn status_error(resp: reqwest::Response, url: &str) -> GenerationError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    GenerationError::HttpStatus {
        status,
        url: url.to_string(),
        snippet: text.chars().take(SNIPPET_CHARS).collect(),
    }
}

/// Drop a leading copy of the prompt from `output`, then trim whitespace.
///
/// Some runtimes return the prompt followed by the continuation; only the
/// newly generated span is kept.
pub fn trim_echo(prompt: &str, output: &str) -> String {
    output
        .strip_prefix(prompt)
        .unwrap_or(output)
        .trim()
        .to_string()
}

// ============ Local Backend ============

#[derive(Debug, Serialize)]
struct ShowRequest<'a> {
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct SamplingOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    raw: bool,
    stream: bool,
    options: &'a SamplingOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Causal LM served by a local Ollama-compatible runtime.
pub struct LocalBackend {
    client: reqwest::Client,
    model: String,
    url_generate: String,
    options: SamplingOptions,
}

impl LocalBackend {
    /// Connect to the runtime at `config.local_url` and confirm it can serve
    /// `config.local_model`.
    ///
    /// # Errors
    ///
    /// Fails if the runtime is unreachable or does not know the model.
    pub async fn load(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let client = http_client(config.timeout_secs)?;
        let base = config.local_url.trim_end_matches('/');
        let url_show = format!("{}/api/show", base);

        debug!("POST {}", url_show);
        let resp = client
            .post(&url_show)
            .json(&ShowRequest {
                model: &config.local_model,
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(status_error(resp, &url_show).await);
        }

        info!(model = %config.local_model, "Local model loaded");

        Ok(Self {
            client,
            model: config.local_model.clone(),
            url_generate: format!("{}/api/generate", base),
            options: SamplingOptions {
                temperature: config.temperature,
                top_p: config.top_p,
                num_predict: config.max_new_tokens,
            },
        })
    }
}

#[async_trait]
impl Generator for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt.text,
            raw: true,
            stream: false,
            options: &self.options,
        };

        debug!("POST {}", self.url_generate);
        let resp = self
            .client
            .post(&self.url_generate)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(status_error(resp, &self.url_generate).await);
        }

        let out: GenerateResponse = resp.json().await.map_err(|e| {
            GenerationError::Decode(format!("serde error: {e}; ensure `stream=false` is used"))
        })?;

        Ok(trim_echo(&prompt.text, &out.response))
    }
}

// ============ Remote Backend ============

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Hosted chat-completion model (`POST {base}/v1/chat/completions`).
pub struct RemoteBackend {
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: Option<String>,
    max_tokens: u32,
}

impl RemoteBackend {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            model: config.remote_model.clone(),
            url: format!(
                "{}/v1/chat/completions",
                config.remote_url.trim_end_matches('/')
            ),
            api_key: config.api_key.clone(),
            max_tokens: config.remote_max_tokens,
        })
    }
}

#[async_trait]
impl Generator for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingCredentials("OPENAI_API_KEY"))?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt.text,
            }],
            max_tokens: self.max_tokens,
        };

        debug!("POST {}", self.url);
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(status_error(resp, &self.url).await);
        }

        let out: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Decode(format!("serde error: {e}")))?;

        out.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(GenerationError::EmptyOutput)
    }
}

// ============ Fallback Backend ============

/// Deterministic canned replies keyed on the length of the user's message.
pub struct FallbackBackend;

/// The canned reply for `message`.
pub fn fallback_reply(message: &str) -> &'static str {
    if message.chars().count() < FALLBACK_SHORT_LIMIT {
        FALLBACK_SHORT_REPLY
    } else {
        FALLBACK_LONG_REPLY
    }
}

#[async_trait]
impl Generator for FallbackBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Fallback
    }

    fn model_name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        Ok(fallback_reply(&prompt.question).to_string())
    }
}
