//! `/chat`, `/chat/stream`, `/conversation`, `/vision` and `/models`.

mod common;

use axum::body::to_bytes;
use axum::http::{header, StatusCode};
use common::{get, post_json, router, send_json, unconfigured, TestApp};
use genai_gateway::services::providers::mock::{MockBehaviour, MockTextProvider};
use genai_gateway::services::providers::{Content, ContentPart};
use serde_json::json;
use tower::util::ServiceExt;

#[tokio::test]
async fn chat_returns_the_model_text() {
    let mock = MockTextProvider::replying("¡Hola!");

    let (status, body) = send_json(router(&mock), post_json("/chat", &json!({"message": "hola"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], "¡Hola!");
    assert_eq!(body["model"], "gemini-2.5-flash");
    assert_eq!(mock.recorded()[0].contents, vec![Content::user_text("hola")]);
}

#[tokio::test]
async fn chat_requires_a_message() {
    let (status, body) = send_json(
        router(&MockTextProvider::replying("unused")),
        post_json("/chat", &json!({"model": "gemini-2.5-flash"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message is required");
}

#[tokio::test]
async fn stream_relays_chunks_in_order() {
    let mock = MockTextProvider::new(MockBehaviour::Chunks(vec![
        "Había ".into(),
        "una ".into(),
        "vez".into(),
    ]));

    let response = router(&mock)
        .oneshot(post_json("/chat/stream", &json!({"message": "cuento"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(std::str::from_utf8(&body).unwrap(), "Había una vez");
}

#[tokio::test]
async fn stream_is_relayed_over_tcp() {
    let app = TestApp::spawn(MockTextProvider::new(MockBehaviour::Chunks(vec![
        "a".into(),
        "b".into(),
        "c".into(),
    ])))
    .await;

    let response = app
        .client
        .post(app.url("/chat/stream"))
        .json(&json!({"message": "abc"}))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "abc");
    assert_eq!(app.provider.recorded().len(), 1);
}

#[tokio::test]
async fn stream_failure_before_first_chunk_is_a_json_error() {
    let mock = MockTextProvider::new(MockBehaviour::Fail("overloaded".into()));

    let (status, body) =
        send_json(router(&mock), post_json("/chat/stream", &json!({"message": "hi"}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to generate streaming response");
    assert!(body["details"].as_str().unwrap().contains("overloaded"));
}

#[tokio::test]
async fn stream_without_api_key_fails_fast() {
    let (status, body) = send_json(
        router(&unconfigured()),
        post_json("/chat/stream", &json!({"message": "hi"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "API key is not configured");
}

#[tokio::test]
async fn conversation_forwards_every_turn() {
    let mock = MockTextProvider::replying("Paris");

    let (status, body) = send_json(
        router(&mock),
        post_json(
            "/conversation",
            &json!({
                "messages": [
                    {"role": "user", "parts": [{"text": "Capital of France?"}]},
                    {"role": "model", "parts": [{"text": "Which France?"}]},
                    "The country"
                ]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Paris");

    let contents = &mock.recorded()[0].contents;
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[1].role.as_deref(), Some("model"));
    assert_eq!(contents[2], Content::user_text("The country"));
}

#[tokio::test]
async fn conversation_requires_a_non_empty_messages_array() {
    for payload in [json!({}), json!({"messages": []})] {
        let (status, body) = send_json(
            router(&MockTextProvider::replying("unused")),
            post_json("/conversation", &payload),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Messages array is required");
    }
}

#[tokio::test]
async fn conversation_upstream_failure_uses_its_own_summary() {
    let mock = MockTextProvider::new(MockBehaviour::Fail("boom".into()));

    let (status, body) = send_json(
        router(&mock),
        post_json("/conversation", &json!({"messages": ["hi"]})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to generate conversation response");
}

#[tokio::test]
async fn vision_sends_text_and_inline_image() {
    let mock = MockTextProvider::replying("A cat");

    let (status, body) = send_json(
        router(&mock),
        post_json(
            "/vision",
            &json!({"message": "What is this?", "imageData": "aGVsbG8="}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "A cat");
    assert_eq!(
        mock.recorded()[0].contents,
        vec![Content::user(vec![
            ContentPart::text("What is this?"),
            ContentPart::inline("image/jpeg", "aGVsbG8="),
        ])]
    );
}

#[tokio::test]
async fn vision_honours_mime_type() {
    let mock = MockTextProvider::replying("A chart");

    send_json(
        router(&mock),
        post_json(
            "/vision",
            &json!({"message": "Describe", "imageData": "eA==", "mimeType": "image/png"}),
        ),
    )
    .await;

    assert_eq!(
        mock.recorded()[0].contents[0].parts[1],
        ContentPart::inline("image/png", "eA==")
    );
}

#[tokio::test]
async fn vision_requires_message_and_image() {
    for payload in [
        json!({"message": "What is this?"}),
        json!({"imageData": "eA=="}),
        json!({}),
    ] {
        let (status, body) = send_json(
            router(&MockTextProvider::replying("unused")),
            post_json("/vision", &payload),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Message and imageData are required");
    }
}

#[tokio::test]
async fn models_are_listed() {
    let (status, body) = send_json(router(&MockTextProvider::replying("unused")), get("/models")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["models"][0]["name"], "models/mock-model");
    assert_eq!(body["models"][0]["displayName"], "Mock Model");
}

#[tokio::test]
async fn models_require_an_api_key() {
    let (status, body) = send_json(router(&unconfigured()), get("/models")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "API key is not configured");
}

#[tokio::test]
async fn models_upstream_failure() {
    let mock = MockTextProvider::new(MockBehaviour::Fail("forbidden".into()));

    let (status, body) = send_json(router(&mock), get("/models")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to fetch models");
}
