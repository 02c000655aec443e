use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use tokio::net::TcpListener;

use threadchat::{
    Completer, CompletionClient, INVALID_FORMAT_MESSAGE, KnownModel, Message, Model, Settings,
};

const PATH: &str = "/api/v1/chat/completions";

fn client(server: &ServerGuard) -> CompletionClient {
    let endpoint = format!("{}{PATH}", server.url());
    CompletionClient::with_options(Some("sk-test".to_string()), Some(endpoint)).unwrap()
}

async fn complete(server: &ServerGuard) -> threadchat::Result<Message> {
    client(server)
        .complete(&Message::user("Hello"), &Settings::default())
        .await
}

#[tokio::test]
async fn successful_reply_and_request_shape() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_header("authorization", "Bearer sk-test")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "model": "Meta-Llama-3-2-3B-Instruct",
            "messages": [{"role": "user", "content": "Hello"}],
            "max_tokens": 2000,
            "temperature": 0.5,
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id":"chatcmpl-1","choices":[{"index":0,"message":{"role":"assistant","content":"Hi there!"},"finish_reason":"stop"}],"usage":{"prompt_tokens":5,"completion_tokens":3,"total_tokens":8}}"#,
        )
        .create_async()
        .await;
    let settings = Settings::default()
        .with_model(Model::Known(KnownModel::Llama32_3BInstruct))
        .with_temperature(0.5)
        .unwrap();

    let reply = client(&server)
        .complete(&Message::user("Hello"), &settings)
        .await
        .unwrap();
    assert_eq!(reply, Message::assistant("Hi there!"));
    mock.assert_async().await;
}

#[tokio::test]
async fn error_status_uses_error_message() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"message":"rate limited","type":"server_error"}}"#)
        .create_async()
        .await;

    let err = complete(&server).await.unwrap_err();
    mock.assert_async().await;
    assert!(err.is_network());
    assert_eq!(err.status_code(), Some(500));
    assert_eq!(err.message(), "rate limited");
}

#[tokio::test]
async fn error_status_without_body_reports_status() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .with_status(404)
        .create_async()
        .await;

    let err = complete(&server).await.unwrap_err();
    mock.assert_async().await;
    assert!(err.is_network());
    assert_eq!(err.status_code(), Some(404));
    assert_eq!(err.message(), "API Error: 404");
}

#[tokio::test]
async fn missing_choices_is_format_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"chatcmpl-2"}"#)
        .create_async()
        .await;

    let err = complete(&server).await.unwrap_err();
    assert!(err.is_format());
    assert_eq!(err.message(), INVALID_FORMAT_MESSAGE);
}

#[tokio::test]
async fn non_json_body_is_format_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(200)
        .with_body("<html>oops</html>")
        .create_async()
        .await;

    let err = complete(&server).await.unwrap_err();
    assert!(err.is_format());
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = CompletionClient::with_options(
        Some("sk-test".to_string()),
        Some(format!("http://{addr}{PATH}")),
    )
    .unwrap()
    .complete(&Message::user("Hello"), &Settings::default())
    .await
    .unwrap_err();
    assert!(err.is_network());
    assert_eq!(err.status_code(), None);
}
