use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::debug;

use flowrelay_upstream::{PredictionRequest, Upload};

use crate::api::state::AppState;
use crate::relay::relay_stream;

/// Idle threshold after which a `: keepalive` comment frame is written so
/// intermediaries do not time out the connection. Resets on every forwarded
/// event; torn down with the response on success and failure alike.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub attachment: Option<ChatAttachment>,
    #[serde(default)]
    pub image: Option<ChatImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAttachment {
    pub content: String,
    pub name: String,
    pub mime_type: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatImage {
    pub data: String,
    pub name: String,
    pub mime: String,
}

// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let chat_id = state.session.read().clone();
    debug!(session = ?chat_id, "opening prediction stream");

    let mut prediction = PredictionRequest::new(request.question);
    if let Some(chat_id) = chat_id {
        prediction = prediction.with_chat_id(chat_id);
    }
    if let Some(attachment) = request.attachment {
        prediction = prediction.with_upload(Upload::full_file(
            attachment.content,
            attachment.name,
            attachment.mime_type,
        ));
    }
    if let Some(image) = request.image {
        prediction = prediction.with_upload(Upload::image(image.data, image.name, image.mime));
    }

    let upstream = state.flowise.create_prediction(prediction);
    let events = relay_stream(upstream, state.session.clone(), state.config.dev_mode)
        .map(|event| Ok::<_, Infallible>(Event::default().json_data(&event).unwrap()));

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(KEEPALIVE_INTERVAL)
            .text("keepalive"),
    )
}
