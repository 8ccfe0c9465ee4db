//! Fake API and store helpers shared by the unit tests.

use serde_json::{Value, json};
use std::path::Path;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::config::OpenAiConfig;
use crate::database::TextStore;
use crate::openai::OpenAiClient;

pub const TEST_DIMENSION: usize = 4;

pub const SQLITE_SCHEMA: &str =
    "CREATE TABLE ai_context (id INTEGER PRIMARY KEY AUTOINCREMENT, text TEXT NOT NULL)";

/// Deterministic stand-in for a real embedding: equal texts get equal vectors.
pub fn fake_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; TEST_DIMENSION];
    for (i, byte) in text.bytes().enumerate() {
        vector[i % TEST_DIMENSION] += f32::from(byte) / 255.0;
    }
    vector
}

/// Embedding endpoint that fails any batch containing one of `failing`
pub struct FakeEmbeddings {
    pub failing: Vec<String>,
}

impl Respond for FakeEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = request.body_json::<Value>() else {
            return ResponseTemplate::new(400);
        };

        let inputs: Vec<String> = body["input"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        if inputs.iter().any(|text| self.failing.contains(text)) {
            return ResponseTemplate::new(500);
        }

        let data: Vec<Value> = inputs
            .iter()
            .enumerate()
            .map(|(index, text)| {
                json!({ "object": "embedding", "index": index, "embedding": fake_embedding(text) })
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": data,
            "model": "text-embedding-ada-002"
        }))
    }
}

pub fn test_openai_config(server: &MockServer) -> OpenAiConfig {
    OpenAiConfig {
        api_key: "sk-test".to_string(),
        base_url: format!("{}/v1/", server.uri()),
        chat_model: "gpt-3.5-turbo".to_string(),
        embedding_model: "text-embedding-ada-002".to_string(),
        embedding_dimension: TEST_DIMENSION as u32,
    }
}

pub fn test_client(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new(&test_openai_config(server)).expect("should create client")
}

pub async fn mount_embeddings(server: &MockServer, failing: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(FakeEmbeddings {
            failing: failing.iter().map(|s| (*s).to_string()).collect(),
        })
        .mount(server)
        .await;
}

/// Server-sent event body streaming `fragments` as completion deltas
pub fn sse_body(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        let chunk = json!({
            "object": "chat.completion.chunk",
            "choices": [{ "index": 0, "delta": { "content": fragment }, "finish_reason": null }]
        });
        body.push_str("data: ");
        body.push_str(&chunk.to_string());
        body.push_str("\n\n");
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// Mock for streaming completions; `expected` is the number of calls the test requires
pub async fn mount_stream(server: &MockServer, fragments: &[&str], expected: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(fragments)),
        )
        .expect(expected)
        .mount(server)
        .await;
}

/// Mock for the intent classifier's capped completion request
pub async fn mount_classifier(server: &MockServer, answer: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "max_tokens": 10 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": answer },
                "finish_reason": "stop"
            }]
        })))
        .mount(server)
        .await;
}

/// A SQLite-backed store under `dir` with a freshly created text table
pub async fn test_store(dir: &Path) -> TextStore {
    let store = TextStore::new(format!(
        "sqlite://{}?mode=rwc",
        dir.join("store.db").display()
    ));

    let schema = dir.join("schema.sql");
    std::fs::write(&schema, SQLITE_SCHEMA).expect("should write schema");
    store
        .setup_schema(&schema)
        .await
        .expect("schema setup should succeed");
    store
}

pub fn write_source(dir: &Path, lines: &[&str]) -> std::path::PathBuf {
    let source = dir.join("source.txt");
    std::fs::write(&source, lines.join("\n")).expect("should write source");
    source
}
