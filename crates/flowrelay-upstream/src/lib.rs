//! Streaming client for a Flowise-style prediction API.
//!
//! One prediction call maps to one lazy, finite, non-restartable stream of
//! typed chunks (`token`, `artifacts`, `metadata`). The crate also exposes
//! the small passthrough surface the relay server proxies: stored uploads
//! and the public chatbot config.

mod client;
mod error;
mod event;

pub use client::{FlowiseClient, PredictionStream};
pub use error::{Result, UpstreamError};
pub use event::{
    FILE_STORAGE_PREFIX, PredictionChunk, PredictionMetadata, PredictionRequest, RawArtifact,
    Upload, UploadKind,
};
