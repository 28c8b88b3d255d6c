//! Integration tests for the streaming prediction client

use futures::StreamExt;
use serde_json::{Value, json};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flowrelay_upstream::{
    FlowiseClient, PredictionChunk, PredictionRequest, RawArtifact, Upload, UpstreamError,
};

const CHATFLOW_ID: &str = "flow-1";

fn sse_body(frames: &[&str]) -> String {
    frames
        .iter()
        .map(|frame| format!("data: {frame}\n\n"))
        .collect()
}

async fn mount_prediction(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/prediction/{CHATFLOW_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn parses_typed_chunks_and_skips_unknown_events() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"event":"start","data":""}"#,
        r#"{"event":"token","data":"Hel"}"#,
        r#"{"event":"token","data":"lo"}"#,
        r#"{"event":"usedTools","data":[]}"#,
        r#"{"event":"artifacts","data":[{"type":"png","data":"FILE-STORAGE::a.png"}]}"#,
        r#"{"event":"metadata","data":{"chatId":"c1","sessionId":"s1","followUpPrompts":"[\"More?\"]"}}"#,
    ]);
    mount_prediction(&server, body).await;

    let client = FlowiseClient::new(server.uri(), CHATFLOW_ID);
    let mut stream = client.create_prediction(PredictionRequest::new("Hello"));

    let mut chunks = Vec::new();
    while let Some(item) = stream.next().await {
        chunks.push(item.expect("stream item"));
    }

    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[0], PredictionChunk::Token("Hel".to_string()));
    assert_eq!(chunks[1], PredictionChunk::Token("lo".to_string()));
    assert_eq!(
        chunks[2],
        PredictionChunk::Artifacts(vec![RawArtifact {
            kind: "png".to_string(),
            data: Some("FILE-STORAGE::a.png".to_string()),
        }])
    );
    match &chunks[3] {
        PredictionChunk::Metadata(meta) => {
            assert_eq!(meta.session_id.as_deref(), Some("s1"));
            assert_eq!(meta.follow_up_prompts, Some(json!("[\"More?\"]")));
        }
        other => panic!("expected metadata chunk, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_frames_are_skipped_without_ending_the_stream() {
    let server = MockServer::start().await;
    let body = format!(
        "{}data: {{not json\n\n{}",
        sse_body(&[r#"{"event":"token","data":"Hel"}"#]),
        sse_body(&[r#"{"event":"token","data":"lo"}"#]),
    );
    mount_prediction(&server, body).await;

    let client = FlowiseClient::new(server.uri(), CHATFLOW_ID);
    let mut stream = client.create_prediction(PredictionRequest::new("Hello"));

    let mut chunks = Vec::new();
    while let Some(item) = stream.next().await {
        chunks.push(item.expect("stream item"));
    }

    assert_eq!(
        chunks,
        vec![
            PredictionChunk::Token("Hel".to_string()),
            PredictionChunk::Token("lo".to_string()),
        ]
    );
}

#[tokio::test]
async fn generates_fresh_chat_id_and_serializes_uploads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/prediction/{CHATFLOW_ID}")))
        .and(body_partial_json(json!({
            "question": "Summarize this",
            "streaming": true,
            "uploads": [
                {"data": "the notes", "type": "file:full", "name": "notes.txt", "mime": "text/plain"},
                {"data": "data:image/png;base64,AAAA", "type": "file", "name": "pic.png", "mime": "image/png"}
            ],
            "overrideConfig": {"systemMessage": "Help the user with their questions"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(&[r#"{"event":"token","data":"ok"}"#]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = FlowiseClient::new(server.uri(), CHATFLOW_ID);
    let request = PredictionRequest::new("Summarize this")
        .with_upload(Upload::full_file("the notes", "notes.txt", "text/plain"))
        .with_upload(Upload::image(
            "data:image/png;base64,AAAA",
            "pic.png",
            "image/png",
        ));

    let mut stream = client.create_prediction(request);
    while let Some(item) = stream.next().await {
        item.expect("stream item");
    }

    let requests = server.received_requests().await.expect("recorded requests");
    let body: Value = serde_json::from_slice(&requests[0].body).expect("json body");
    let chat_id = body["chatId"].as_str().expect("chatId present");
    Uuid::parse_str(chat_id).expect("fresh chat id is a uuid");
}

#[tokio::test]
async fn reuses_supplied_chat_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/prediction/{CHATFLOW_ID}")))
        .and(body_partial_json(json!({"chatId": "session-42"})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(&[r#"{"event":"token","data":"ok"}"#]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = FlowiseClient::new(server.uri(), CHATFLOW_ID);
    let request = PredictionRequest::new("Hello").with_chat_id("session-42");

    let mut stream = client.create_prediction(request);
    while let Some(item) = stream.next().await {
        item.expect("stream item");
    }
}

#[tokio::test]
async fn non_success_status_ends_stream_with_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/prediction/{CHATFLOW_ID}")))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = FlowiseClient::new(server.uri(), CHATFLOW_ID);
    let mut stream = client.create_prediction(PredictionRequest::new("Hello"));

    match stream.next().await {
        Some(Err(UpstreamError::Api { status, message })) => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected api error, got {other:?}"),
    }
    assert!(stream.next().await.is_none(), "stream ends after the error");
}

#[tokio::test]
async fn connection_failure_yields_http_error() {
    // Nothing listens on this port
    let client = FlowiseClient::new("http://127.0.0.1:9", CHATFLOW_ID);
    let mut stream = client.create_prediction(PredictionRequest::new("Hello"));

    match stream.next().await {
        Some(Err(UpstreamError::Http(_))) => {}
        other => panic!("expected http error, got {other:?}"),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn upload_file_fetch_propagates_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/get-upload-file"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such file"))
        .mount(&server)
        .await;

    let client = FlowiseClient::new(server.uri(), CHATFLOW_ID);
    let err = client
        .get_upload_file(CHATFLOW_ID, "c1", "missing.png")
        .await
        .expect_err("missing file should error");

    assert_eq!(err.status_code(), 404);
}
