//! OpenAI clients against an in-process mock: timeouts and request shape.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use mailrag::chat::OpenAIChat;
use mailrag::config::{ChatConfig, EmbeddingConfig, OpenAIConfig};
use mailrag::embedding::OpenAIEmbedder;
use mailrag::error::Error;
use mailrag::traits::{ChatMessage, ChatModel, Embedder};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockOpenAI {
    requests: Mutex<Vec<Value>>,
}

async fn slow(Json(_body): Json<Value>) -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Json(json!({}))
}

async fn chat_completions(
    State(state): State<Arc<MockOpenAI>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.requests.lock().unwrap().push(body);
    Json(json!({
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Noted." } }]
    }))
}

async fn spawn_mock() -> (String, Arc<MockOpenAI>) {
    let state = Arc::new(MockOpenAI::default());
    let app = Router::new()
        .route("/slow/embeddings", post(slow))
        .route("/slow/chat/completions", post(slow))
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

fn openai_config(base_url: String) -> OpenAIConfig {
    OpenAIConfig {
        api_key: Some("sk-test".to_string()),
        base_url,
        timeout_secs: 1,
    }
}

fn chat_config() -> ChatConfig {
    ChatConfig {
        model: "test-chat".to_string(),
        temperature: 0.0,
        top_k: 3,
        timeout_secs: 1,
    }
}

#[tokio::test]
async fn test_embedding_timeout_is_embedding_error() {
    let (base_url, _state) = spawn_mock().await;
    let embedder = OpenAIEmbedder::new(
        &openai_config(format!("{}/slow", base_url)),
        &EmbeddingConfig::default(),
    )
    .unwrap();

    let err = embedder.embed(&["hello".to_string()]).await.unwrap_err();
    match err {
        Error::EmbeddingService(msg) => assert!(msg.contains("timed out after 1s"), "{}", msg),
        other => panic!("expected EmbeddingService, got {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_timeout_is_generation_error() {
    let (base_url, _state) = spawn_mock().await;
    let chat = OpenAIChat::new(&openai_config(format!("{}/slow", base_url)), &chat_config())
        .unwrap();

    let err = chat
        .complete(&[ChatMessage::user("hello")])
        .await
        .unwrap_err();
    match err {
        Error::Generation(msg) => assert!(msg.contains("timed out after 1s"), "{}", msg),
        other => panic!("expected Generation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_request_is_deterministic_and_unstreamed() {
    let (base_url, state) = spawn_mock().await;
    let chat = OpenAIChat::new(&openai_config(format!("{}/v1", base_url)), &chat_config())
        .unwrap();

    let answer = chat
        .complete(&[ChatMessage::system("Be brief."), ChatMessage::user("Hi")])
        .await
        .unwrap();
    assert_eq!(answer, "Noted.");

    let requests = state.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let body = &requests[0];
    assert_eq!(body["model"], "test-chat");
    assert_eq!(body["temperature"].as_f64(), Some(0.0));
    assert_eq!(body["stream"], false);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "Hi");
}
