use browzee_core::{traits::LlmClient, types::ChatMessage, Error};
use browzee_model_gateway::OpenAiCompatClient;
use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_sends_bearer_and_parses_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "grok-2-vision"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "A login form."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiCompatClient::new(
        format!("{}/v1", server.uri()),
        Secret::new("sk-test".to_string()),
        "grok-2-vision",
    );
    let reply = client
        .ainvoke(&[ChatMessage::user_with_image(
            "What is on this page?",
            "data:image/png;base64,AAAA",
        )])
        .await
        .unwrap();

    assert_eq!(reply.text(), "A login form.");
}

#[tokio::test]
async fn test_http_error_becomes_model_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = OpenAiCompatClient::new(server.uri(), Secret::new("k".to_string()), "m");
    let err = client.ainvoke(&[ChatMessage::user("hi")]).await.unwrap_err();

    match err {
        Error::ModelProvider(msg) => assert!(msg.contains("429")),
        other => panic!("unexpected error: {:?}", other),
    }
}
