#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end engine tests: corpus on disk, upstream API served by a mock server

use piscine_rag::config::Config;
use piscine_rag::engine::{Engine, EngineStatus};
use piscine_rag::synthesizer::{NO_INFORMATION_MESSAGE, TECHNICAL_DIFFICULTY_MESSAGE};
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const KEYWORDS: [&str; 2] = ["verte", "chlore"];

const CORPUS: &str = "content\n\
\"Pour une eau verte, choquer au chlore puis filtrer 24h.\"\n\
Nettoyer le skimmer chaque semaine.\n";

/// Answers embedding requests with keyword-count vectors computed from the input
struct KeywordEmbeddings;

impl Respond for KeywordEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = request.body_json::<Value>() else {
            return ResponseTemplate::new(400);
        };
        let inputs = body["input"].as_array().cloned().unwrap_or_default();
        let data: Vec<Value> = inputs
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let text = text.as_str().unwrap_or_default().to_lowercase();
                let mut embedding: Vec<f32> = KEYWORDS
                    .iter()
                    .map(|keyword| text.matches(keyword).count() as f32)
                    .collect();
                embedding.push(0.1);
                json!({"index": index, "embedding": embedding})
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }
}

fn test_config(dir: &TempDir, server: &MockServer) -> Config {
    let mut config = Config {
        base_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    config.openai.api_base = format!("{}/v1", server.uri());
    config.openai.api_key = Some("sk-test".to_string());
    config.openai.embedding_dimension = (KEYWORDS.len() + 1) as u32;
    config.openai.batch_delay_ms = 0;
    config.openai.timeout_seconds = 5;
    config.openai.retry_attempts = 1;
    config
}

fn write_corpus(config: &Config) {
    fs::create_dir_all(config.data_dir()).expect("should create data dir");
    fs::write(config.corpus_path(), CORPUS).expect("should write corpus");
}

async fn embedding_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/v1/embeddings")
        .count()
}

#[tokio::test]
async fn answers_from_the_knowledge_base() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(KeywordEmbeddings)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Faites un traitement choc au chlore, puis filtrez 24h."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir, &server);
    write_corpus(&config);
    let engine = Engine::from_config(&config).expect("engine should build");

    let answer = engine.answer("Ma piscine est verte").await;

    assert!(answer.contains("chlore"), "answer was {}", answer);
    assert_eq!(engine.status().await, EngineStatus::Loaded { chunks: 2 });
    assert!(config.index_path().exists());
    assert!(config.embeddings_path().exists());
    assert!(config.chunk_table_path().exists());

    let requests = server.received_requests().await.unwrap_or_default();
    let chat = requests
        .iter()
        .find(|request| request.url.path() == "/v1/chat/completions")
        .expect("a completion request was sent");
    let body: Value = chat.body_json().expect("completion body is json");
    let user_prompt = body["messages"][1]["content"].as_str().unwrap_or_default();
    assert!(user_prompt.contains("choquer au chlore"));
    assert!(!user_prompt.contains("skimmer"));
}

#[tokio::test]
async fn restart_reuses_persisted_index() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(KeywordEmbeddings)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir, &server);
    write_corpus(&config);

    let first = Engine::from_config(&config).expect("engine should build");
    assert_eq!(first.initialize().await, EngineStatus::Loaded { chunks: 2 });
    let after_build = embedding_requests(&server).await;
    assert_eq!(after_build, 1);

    let second = Engine::from_config(&config).expect("engine should build");
    let results = second.search("eau verte", 1).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.index, 0);
    // only the query embedding, no rebuild
    assert_eq!(embedding_requests(&server).await, after_build + 1);
}

#[tokio::test]
async fn embedding_outage_reports_no_information() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir, &server);
    write_corpus(&config);
    let engine = Engine::from_config(&config).expect("engine should build");

    assert_eq!(engine.answer("Ma piscine est verte").await, NO_INFORMATION_MESSAGE);
    assert_eq!(engine.status().await, EngineStatus::NotBuilt);
    assert!(!config.index_path().exists());
}

#[tokio::test]
async fn generation_outage_reports_technical_difficulty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(KeywordEmbeddings)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir, &server);
    write_corpus(&config);
    let engine = Engine::from_config(&config).expect("engine should build");

    assert_eq!(
        engine.answer("Ma piscine est verte").await,
        TECHNICAL_DIFFICULTY_MESSAGE
    );
}
