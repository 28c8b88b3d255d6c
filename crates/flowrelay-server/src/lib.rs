//! Streaming chat relay between a browser widget and a Flowise-style
//! conversational backend. One logical session per process; the relay core
//! lives in [`relay`], the HTTP surface in [`api`].

pub mod api;
pub mod config;
pub mod relay;
pub mod static_assets;

use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use api::AppState;
use api::chat::chat;
use api::files::{chatbot_config, get_image, get_upload_file};
use api::session::reset_session;

#[derive(serde::Serialize)]
struct Health {
    status: String,
}

async fn health() -> axum::Json<Health> {
    axum::Json(Health {
        status: "flowrelay is working!".to_string(),
    })
}

pub fn build_router(state: AppState) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        // Chat stream and session lifecycle
        .route("/api/chat", post(chat))
        .route("/api/reset-session", post(reset_session))
        // Upstream passthroughs
        .route("/api/images/{chat_id}/{file_name}", get(get_image))
        .route("/api/get-upload-file", get(get_upload_file))
        .route("/api/chatbot-config", get(chatbot_config))
        .fallback(static_assets::static_handler)
        .layer(cors)
        .with_state(state)
}
