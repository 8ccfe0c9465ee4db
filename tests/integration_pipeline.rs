#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end ingest, search and status through the command layer,
// with a SQLite store and a mocked embedding API

use rag_chat::config::Config;
use rag_chat::commands::{ingest, search, show_status};
use rag_chat::database::{TextStore, VectorIndex};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const DIMENSION: usize = 8;

const SQLITE_SCHEMA: &str =
    "CREATE TABLE ai_context (id INTEGER PRIMARY KEY AUTOINCREMENT, text TEXT NOT NULL)";

const KNOWLEDGE: &str = "Returns are accepted within 30 days

Shipping takes 3 to 5 business days
The store opens at 9am
Gift cards never expire

Support is reachable by email
";

struct LetterEmbeddings;

impl Respond for LetterEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = request.body_json::<Value>() else {
            return ResponseTemplate::new(400);
        };
        let inputs = body["input"].as_array().cloned().unwrap_or_default();

        let data: Vec<Value> = inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let mut vector = vec![0.0_f32; DIMENSION];
                for (i, byte) in input.as_str().unwrap_or_default().bytes().enumerate() {
                    vector[i % DIMENSION] += f32::from(byte) / 255.0;
                }
                json!({ "index": index, "embedding": vector })
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }
}

struct Fixture {
    _server: MockServer,
    temp_dir: TempDir,
    config: Config,
}

impl Fixture {
    async fn start() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(LetterEmbeddings)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().expect("should create temp dir");
        let config_path = temp_dir.path().join("config.json");
        let config_json = json!({
            "openai": {
                "api_key": "sk-pipeline",
                "base_url": format!("{}/v1", server.uri()),
                "embedding_dimension": DIMENSION
            },
            "mysql": {
                "user": "unused",
                "database": "unused",
                "url": format!("sqlite://{}?mode=rwc", temp_dir.path().join("kb.db").display())
            },
            "index": {
                "path": temp_dir.path().join("data").join("kb.index"),
                "batch_size": 2,
                "batch_delay_ms": 0
            }
        });
        fs::write(&config_path, config_json.to_string()).expect("should write config");

        let config = Config::load(&config_path).expect("config should load");
        Self {
            _server: server,
            temp_dir,
            config,
        }
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let file = self.temp_dir.path().join(name);
        fs::write(&file, content).expect("should write file");
        file
    }

    fn index_path(&self) -> &Path {
        &self.config.index.path
    }

    async fn ingest_knowledge(&self) {
        let schema = self.write("schema.sql", SQLITE_SCHEMA);
        let source = self.write("knowledge.txt", KNOWLEDGE);
        let report = ingest(
            &self.config,
            &schema,
            &source,
            self.index_path(),
            self.config.index.batch_size,
        )
        .await
        .expect("ingest should succeed");

        assert_eq!(report.batches, 3);
        assert_eq!(report.batches_skipped, 0);
        assert_eq!(report.vectors_added, 5);
    }
}

#[tokio::test]
async fn ingest_stores_records_and_saves_index() {
    let fixture = Fixture::start().await;
    fixture.ingest_knowledge().await;

    let store = TextStore::new(
        fixture
            .config
            .mysql
            .connection_url()
            .expect("url should build"),
    );
    assert_eq!(store.count().await.expect("count should succeed"), 5);

    let record = store
        .get_text(3)
        .await
        .expect("lookup should succeed")
        .expect("record 3 should exist");
    assert_eq!(record.text, "The store opens at 9am");

    let index = VectorIndex::load(fixture.index_path(), DIMENSION).expect("index should load");
    assert_eq!(index.len(), 5);
    assert!((1..=5).all(|id| index.contains(id)));
}

#[tokio::test]
async fn search_after_ingest_finds_exact_text_first() {
    let fixture = Fixture::start().await;
    fixture.ingest_knowledge().await;

    let results = search(&fixture.config, fixture.index_path(), "Gift cards never expire", 3)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].id, 4);
    assert_eq!(results[0].text, "Gift cards never expire");
    assert!(results[0].distance.abs() < 1e-6);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn reingest_replaces_previous_content() {
    let fixture = Fixture::start().await;
    fixture.ingest_knowledge().await;

    let schema = fixture.write("schema.sql", SQLITE_SCHEMA);
    let source = fixture.write("knowledge.txt", "Only one line now");
    let report = ingest(&fixture.config, &schema, &source, fixture.index_path(), 10)
        .await
        .expect("ingest should succeed");
    assert_eq!(report.vectors_added, 1);

    let results = search(&fixture.config, fixture.index_path(), "anything", 5)
        .await
        .expect("search should succeed");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, 1);
    assert_eq!(results[0].text, "Only one line now");
}

#[tokio::test]
async fn search_without_index_fails() {
    let fixture = Fixture::start().await;

    let result = search(&fixture.config, fixture.index_path(), "hello", 3).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn status_reports_without_index() {
    let fixture = Fixture::start().await;
    fixture.ingest_knowledge().await;

    show_status(&fixture.config, fixture.index_path())
        .await
        .expect("status should succeed with an index");
    show_status(&fixture.config, &fixture.temp_dir.path().join("missing.index"))
        .await
        .expect("status should succeed without an index");
}
