use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::api::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileQuery {
    pub chatflow_id: String,
    pub chat_id: String,
    pub file_name: String,
}

// GET /api/images/{chat_id}/{file_name}
//
// Retrieval path the relay rewrites storage-backed artifacts onto; always
// scoped to the configured chatflow.
pub async fn get_image(
    State(state): State<AppState>,
    Path((chat_id, file_name)): Path<(String, String)>,
) -> Response {
    let chatflow_id = state.flowise.chatflow_id().to_string();
    proxy_upload_file(&state, &chatflow_id, &chat_id, &file_name).await
}

// GET /api/get-upload-file?chatflowId=&chatId=&fileName=
pub async fn get_upload_file(
    State(state): State<AppState>,
    Query(query): Query<UploadFileQuery>,
) -> Response {
    proxy_upload_file(&state, &query.chatflow_id, &query.chat_id, &query.file_name).await
}

async fn proxy_upload_file(
    state: &AppState,
    chatflow_id: &str,
    chat_id: &str,
    file_name: &str,
) -> Response {
    match state
        .flowise
        .get_upload_file(chatflow_id, chat_id, file_name)
        .await
    {
        Ok(upstream) => {
            let mut builder = Response::builder().status(StatusCode::OK);
            if let Some(content_type) = upstream.headers().get(header::CONTENT_TYPE) {
                builder = builder.header(header::CONTENT_TYPE, content_type.clone());
            }
            builder
                .body(Body::from_stream(upstream.bytes_stream()))
                .unwrap_or_else(|_| {
                    (StatusCode::BAD_GATEWAY, "Failed to build response").into_response()
                })
        }
        Err(err) => {
            warn!(error = %err, chat_id, file_name, "failed to fetch stored file");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Failed to fetch file" })),
            )
                .into_response()
        }
    }
}

// GET /api/chatbot-config
pub async fn chatbot_config(State(state): State<AppState>) -> Response {
    match state.flowise.chatbot_config().await {
        Ok(mut config) => {
            if let Value::Object(map) = &mut config {
                map.insert(
                    "welcomeMessage".to_string(),
                    Value::String(state.config.welcome_message.clone()),
                );
            }
            Json(config).into_response()
        }
        Err(err) => {
            warn!(error = %err, "failed to fetch chatbot config");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Failed to fetch chatbot config" })),
            )
                .into_response()
        }
    }
}
