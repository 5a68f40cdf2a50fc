//! HTTP surface tests: start the real server on a free port and talk to it
//! with `reqwest`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use portfolio_chat::chat::ChatContext;
use portfolio_chat::config::{ChatMode, ChunkingConfig, GenerationConfig, ServerConfig};
use portfolio_chat::embedding::EmbeddingProvider;
use portfolio_chat::generate::{
    create_backend, FallbackBackend, Generator, LocalBackend, FALLBACK_LONG_REPLY,
    FALLBACK_SHORT_REPLY,
};
use portfolio_chat::index::VectorIndex;
use portfolio_chat::retrieve::Retriever;
use portfolio_chat::server::run_server;

const PROFILE: &str = "AI experience\n\nPython skills\n\nWeb projects";

/// Bag-of-words embedder over a fixed vocabulary.
struct KeywordEmbedder;

const VOCAB: [&str; 6] = ["ai", "experience", "python", "skills", "web", "projects"];

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }
    fn dims(&self) -> usize {
        VOCAB.len()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                VOCAB
                    .iter()
                    .map(|w| lower.split_whitespace().filter(|tok| tok == w).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Refuses every query.
struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }
    fn dims(&self) -> usize {
        VOCAB.len()
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding service unavailable");
    }
}

async fn build_index() -> VectorIndex {
    let chunking = ChunkingConfig {
        chunk_size: 20,
        overlap: 0,
        ..ChunkingConfig::default()
    };
    VectorIndex::build(&KeywordEmbedder, PROFILE, &chunking, 8)
        .await
        .unwrap()
}

async fn context_with(generator: Arc<dyn Generator>) -> Arc<ChatContext> {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(KeywordEmbedder);
    let retriever = Retriever::new(Arc::new(build_index().await), provider);
    Arc::new(ChatContext::new(retriever, generator, 3))
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

/// Start the server in the background and return its base URL.
async fn start(ctx: Arc<ChatContext>) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_free_port();
    let server = ServerConfig {
        host: "127.0.0.1".to_string(),
        port,
    };
    let handle = tokio::spawn(async move {
        run_server(&server, ctx).await.ok();
    });
    wait_for_server(port).await;
    (format!("http://127.0.0.1:{}", port), handle)
}

async fn post(url: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let (base, handle) = start(context_with(Arc::new(FallbackBackend)).await).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    handle.abort();
}

#[tokio::test]
async fn test_empty_message_is_rejected_on_both_routes() {
    let (base, handle) = start(context_with(Arc::new(FallbackBackend)).await).await;

    for route in ["/chat", "/api/chat"] {
        let (status, body) = post(&format!("{}{}", base, route), json!({"message": ""})).await;
        assert_eq!(status, 400);
        assert_eq!(body, json!({"error": "Empty message"}));
    }

    let (status, body) = post(&format!("{}/api/chat", base), json!({"message": "   "})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Empty message");

    let (status, body) = post(&format!("{}/api/chat", base), json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Empty message");

    handle.abort();
}

#[tokio::test]
async fn test_null_message_is_treated_as_empty() {
    let (base, handle) = start(context_with(Arc::new(FallbackBackend)).await).await;

    for route in ["/chat", "/api/chat"] {
        let (status, body) = post(&format!("{}{}", base, route), json!({"message": null})).await;
        assert_eq!(status, 400);
        assert_eq!(body, json!({"error": "Empty message"}));
    }

    let (status, body) = post(&format!("{}/api/suggest", base), json!({"message": null})).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"suggestions": []}));

    handle.abort();
}

#[tokio::test]
async fn test_hello_without_local_model_gets_canned_reply() {
    // No /api/show mock: the runtime does not know the model.
    let runtime = MockServer::start().await;
    let generation = GenerationConfig {
        mode: ChatMode::Local,
        local_url: runtime.uri(),
        timeout_secs: 5,
        ..GenerationConfig::default()
    };
    let generator = create_backend(&generation).await.unwrap();

    let (base, handle) = start(context_with(generator).await).await;

    let (status, body) = post(&format!("{}/api/chat", base), json!({"message": "Hello"})).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"reply": FALLBACK_SHORT_REPLY}));

    let long = "Could you walk me through the most recent Python projects in detail?";
    let (_, body) = post(&format!("{}/chat", base), json!({"message": long})).await;
    assert_eq!(body["reply"], FALLBACK_LONG_REPLY);

    handle.abort();
}

#[tokio::test]
async fn test_local_generation_failure_is_in_band() {
    let runtime = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/show"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&runtime)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
        .mount(&runtime)
        .await;

    let generation = GenerationConfig {
        local_url: runtime.uri(),
        timeout_secs: 5,
        ..GenerationConfig::default()
    };
    let local = LocalBackend::load(&generation).await.unwrap();
    let (base, handle) = start(context_with(Arc::new(local)).await).await;

    let (status, body) = post(
        &format!("{}/api/chat", base),
        json!({"message": "Tell me about Python"}),
    )
    .await;
    assert_eq!(status, 200);
    let reply = body["reply"].as_str().unwrap();
    assert!(reply.starts_with("[Local generation error:"), "got: {}", reply);
    assert!(reply.contains("CUDA out of memory"));

    handle.abort();
}

#[tokio::test]
async fn test_remote_without_key_is_in_band() {
    let generation = GenerationConfig {
        mode: ChatMode::OpenAI,
        api_key: None,
        ..GenerationConfig::default()
    };
    let generator = create_backend(&generation).await.unwrap();
    let (base, handle) = start(context_with(generator).await).await;

    let (status, body) = post(&format!("{}/api/chat", base), json!({"message": "Hi"})).await;
    assert_eq!(status, 200);
    assert_eq!(
        body["reply"],
        "[Error generating reply: OPENAI_API_KEY is not set]"
    );

    handle.abort();
}

#[tokio::test]
async fn test_remote_reply_is_grounded_prompt() {
    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Python and Rust."}}]
        })))
        .expect(1)
        .mount(&api)
        .await;

    let generation = GenerationConfig {
        mode: ChatMode::OpenAI,
        remote_url: api.uri(),
        api_key: Some("sk-test".to_string()),
        timeout_secs: 5,
        ..GenerationConfig::default()
    };
    let generator = create_backend(&generation).await.unwrap();
    let (base, handle) = start(context_with(generator).await).await;

    let (status, body) = post(
        &format!("{}/api/chat", base),
        json!({"message": "Tell me about Python"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["reply"], "Python and Rust.");

    let requests = api.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let content = sent["messages"][0]["content"].as_str().unwrap();
    assert!(content.contains("Context:\nPython skills"));
    assert!(content.contains("Question:\nTell me about Python"));

    handle.abort();
}

#[tokio::test]
async fn test_retrieval_failure_is_500() {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(FailingEmbedder);
    let retriever = Retriever::new(Arc::new(build_index().await), provider);
    let ctx = Arc::new(ChatContext::new(retriever, Arc::new(FallbackBackend), 3));
    let (base, handle) = start(ctx).await;

    let (status, body) = post(&format!("{}/api/chat", base), json!({"message": "Hello"})).await;
    assert_eq!(status, 500);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("embedding service unavailable"));

    handle.abort();
}

#[tokio::test]
async fn test_suggest_route() {
    let (base, handle) = start(context_with(Arc::new(FallbackBackend)).await).await;

    let (status, body) = post(
        &format!("{}/api/suggest", base),
        json!({"message": "Show me your Python projects"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({"suggestions": [
            {"label": "Profile 2", "path": "assets/profile2.pdf"},
            {"label": "Profile 3", "path": "assets/profile3.pdf"},
            {"label": "Profile 5", "path": "assets/profile5.pdf"}
        ]})
    );

    handle.abort();
}
