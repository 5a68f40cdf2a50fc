//! Model downloader (`folio models pull`).
//!
//! Fetches the local embedding model into `embedding.cache_dir` and asks the
//! local generation runtime to pull `generation.local_model`, so the first
//! chat request does not pay for downloads.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::config::{Config, GenerationConfig};
use crate::embedding::create_provider;

#[derive(Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct PullResponse {
    #[serde(default)]
    status: String,
}

/// Download everything the configured pipeline needs.
///
/// With `skip_llm`, only the embedding model is fetched.
pub async fn pull_models(config: &Config, skip_llm: bool) -> Result<()> {
    if config.embedding.provider == "local" {
        let provider = create_provider(config).await?;
        println!(
            "Embedding model ready: {} ({} dims) in {}",
            provider.model_name(),
            provider.dims(),
            config.embedding.cache_dir.display()
        );
    } else {
        println!(
            "Embedding provider is '{}'; nothing to download.",
            config.embedding.provider
        );
    }

    if skip_llm {
        return Ok(());
    }

    let status = pull_llm(&config.generation).await?;
    println!(
        "Language model ready: {} ({})",
        config.generation.local_model, status
    );

    Ok(())
}

/// Ask the local runtime to pull `config.local_model`. Returns the runtime's
/// final status string.
pub async fn pull_llm(config: &GenerationConfig) -> Result<String> {
    // Pulls can take much longer than a single generation.
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs.max(600)))
        .build()?;
    let url = format!("{}/api/pull", config.local_url.trim_end_matches('/'));

    info!(model = %config.local_model, url = %url, "pulling language model");

    let resp = client
        .post(&url)
        .json(&PullRequest {
            model: &config.local_model,
            stream: false,
        })
        .send()
        .await
        .with_context(|| format!("Failed to reach local model runtime at {}", config.local_url))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!(
            "Pull of '{}' failed with {}: {}",
            config.local_model,
            status,
            body
        );
    }

    let out: PullResponse = resp
        .json()
        .await
        .context("Invalid pull response from local model runtime")?;
    Ok(out.status)
}
