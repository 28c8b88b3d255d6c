//! Typed chunk and request models for the prediction stream

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker prefix on artifact data that points at upstream file storage
/// instead of carrying inline content.
pub const FILE_STORAGE_PREFIX: &str = "FILE-STORAGE::";

/// One typed chunk from a streaming prediction call.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionChunk {
    /// Incremental answer text
    Token(String),
    /// Generated file descriptors, possibly storage-backed
    Artifacts(Vec<RawArtifact>),
    /// Session id and follow-up prompt suggestions
    Metadata(PredictionMetadata),
}

/// Raw SSE frame payload: `{"event": "...", "data": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct RawFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl PredictionChunk {
    /// Maps a decoded frame to a typed chunk. Events outside the relay's
    /// protocol (`start`, `usedTools`, ...) map to `None` and are skipped.
    pub(crate) fn from_frame(frame: RawFrame) -> serde_json::Result<Option<Self>> {
        let chunk = match frame.event.as_str() {
            "token" => Some(Self::Token(serde_json::from_value(frame.data)?)),
            "artifacts" => Some(Self::Artifacts(serde_json::from_value(frame.data)?)),
            "metadata" => Some(Self::Metadata(serde_json::from_value(frame.data)?)),
            _ => None,
        };
        Ok(chunk)
    }
}

/// Artifact descriptor as the upstream emits it. `data` is either inline
/// content or a `FILE-STORAGE::<name>` reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArtifact {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// Payload of a `metadata` chunk. `follow_up_prompts` arrives either as a
/// JSON array or as a string-encoded array, so it stays untyped here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionMetadata {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub follow_up_prompts: Option<Value>,
}

/// Upload descriptor attached to a prediction call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Upload {
    pub data: String,
    #[serde(rename = "type")]
    pub kind: UploadKind,
    pub name: String,
    pub mime: String,
}

/// Upstream upload type tags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum UploadKind {
    /// Single file/image sent inline
    #[serde(rename = "file")]
    File,
    /// Full document content forwarded to the chatflow
    #[serde(rename = "file:full")]
    FullFile,
}

impl Upload {
    /// Image attachment (inline data, usually a data URL)
    pub fn image(
        data: impl Into<String>,
        name: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        Self {
            data: data.into(),
            kind: UploadKind::File,
            name: name.into(),
            mime: mime.into(),
        }
    }

    /// Full-file document attachment
    pub fn full_file(
        data: impl Into<String>,
        name: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        Self {
            data: data.into(),
            kind: UploadKind::FullFile,
            name: name.into(),
            mime: mime.into(),
        }
    }
}

/// One streaming prediction request.
#[derive(Debug, Clone, Default)]
pub struct PredictionRequest {
    pub question: String,
    /// Current conversation id; a fresh one is generated when absent
    pub chat_id: Option<String>,
    pub uploads: Vec<Upload>,
}

impl PredictionRequest {
    /// Create a new prediction request
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            chat_id: None,
            uploads: Vec::new(),
        }
    }

    /// Continue an existing upstream conversation
    pub fn with_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    /// Attach an upload descriptor
    pub fn with_upload(mut self, upload: Upload) -> Self {
        self.uploads.push(upload);
        self
    }
}
