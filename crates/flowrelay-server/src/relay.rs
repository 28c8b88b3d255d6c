//! Bridges one upstream prediction stream to the browser-facing event stream.
//!
//! The relay owns the per-request protocol policy: whitespace-token
//! suppression, the pending-artifacts buffer, storage-marker rewriting,
//! process-wide session adoption, and the single-terminal-event guarantee.

use flowrelay_upstream::{
    FILE_STORAGE_PREFIX, PredictionChunk, RawArtifact, Result as UpstreamResult, UpstreamError,
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::state::SharedSession;

/// Route prefix artifact storage markers are rewritten onto
pub const IMAGES_ROUTE_PREFIX: &str = "/api/images";

const REDACTED_ERROR_MESSAGE: &str = "Error processing your request";

/// Normalized event emitted to the browser. Exactly one `done` xor `error`
/// terminates a stream; nothing follows a terminal event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayEvent {
    Token { content: String },
    Artifacts { content: Vec<Artifact> },
    Metadata { content: RelayMetadata },
    Done,
    Error { content: String, code: u16 },
}

/// Artifact with a fully resolved data reference (inline content or a local
/// retrieval path, never a raw storage marker).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMetadata {
    pub session_id: Option<String>,
    pub follow_up_prompts: Vec<String>,
}

impl RelayEvent {
    fn from_upstream_error(err: &UpstreamError, dev_mode: bool) -> Self {
        let content = if dev_mode {
            err.to_string()
        } else {
            REDACTED_ERROR_MESSAGE.to_string()
        };
        RelayEvent::Error {
            content,
            code: err.status_code(),
        }
    }
}

/// Consumes one upstream chunk stream and re-emits normalized relay events.
///
/// The session handle is process-wide shared state: the id adopted from a
/// metadata chunk persists across requests, and concurrent relays observe
/// last-write-wins semantics on it.
pub fn relay_stream<S>(
    upstream: S,
    session: SharedSession,
    dev_mode: bool,
) -> impl Stream<Item = RelayEvent>
where
    S: Stream<Item = UpstreamResult<PredictionChunk>>,
{
    async_stream::stream! {
        futures::pin_mut!(upstream);
        let mut pending: Option<Vec<RawArtifact>> = None;
        let mut blank_tokens = 0usize;

        while let Some(item) = upstream.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(err) => {
                    warn!(error = %err, "upstream prediction stream failed");
                    yield RelayEvent::from_upstream_error(&err, dev_mode);
                    return;
                }
            };

            match chunk {
                PredictionChunk::Token(text) => {
                    if text.trim().is_empty() {
                        blank_tokens += 1;
                    } else {
                        yield RelayEvent::Token { content: text };
                    }
                }
                PredictionChunk::Artifacts(raw) => {
                    let current = session.read().clone();
                    match current {
                        Some(session_id) => {
                            let resolved = resolve_artifacts(raw, &session_id);
                            if !resolved.is_empty() {
                                yield RelayEvent::Artifacts { content: resolved };
                            }
                        }
                        // No session id yet: hold the set back. A newer
                        // artifacts chunk replaces it outright.
                        None => pending = Some(raw),
                    }
                }
                PredictionChunk::Metadata(meta) => {
                    if let Some(session_id) = &meta.session_id {
                        *session.write() = Some(session_id.clone());
                        if let Some(raw) = pending.take() {
                            let resolved = resolve_artifacts(raw, session_id);
                            if !resolved.is_empty() {
                                yield RelayEvent::Artifacts { content: resolved };
                            }
                        }
                    }
                    let follow_up_prompts = parse_follow_up_prompts(meta.follow_up_prompts);
                    let session_id = session.read().clone();
                    yield RelayEvent::Metadata {
                        content: RelayMetadata {
                            session_id,
                            follow_up_prompts,
                        },
                    };
                }
            }
        }

        if blank_tokens > 0 {
            debug!(blank_tokens, "dropped whitespace-only tokens");
        }
        yield RelayEvent::Done;
    }
}

/// Rewrites storage markers into locally servable retrieval paths and drops
/// artifacts left without resolvable data.
fn resolve_artifacts(raw: Vec<RawArtifact>, session_id: &str) -> Vec<Artifact> {
    raw.into_iter()
        .filter_map(|artifact| {
            let data = artifact.data?;
            let resolved = match data.strip_prefix(FILE_STORAGE_PREFIX) {
                Some("") => return None,
                Some(name) => format!("{IMAGES_ROUTE_PREFIX}/{session_id}/{name}"),
                None if data.is_empty() => return None,
                None => data,
            };
            Some(Artifact {
                kind: artifact.kind,
                data: resolved,
            })
        })
        .collect()
}

/// Follow-up prompts arrive as a JSON array or as a string-encoded array.
/// Decode failures degrade to an empty set; they never fail the request.
fn parse_follow_up_prompts(raw: Option<Value>) -> Vec<String> {
    match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(encoded)) => serde_json::from_str(&encoded).unwrap_or_else(|err| {
            warn!(error = %err, "failed to parse follow-up prompts");
            Vec::new()
        }),
        Some(other) => serde_json::from_value(other).unwrap_or_else(|err| {
            warn!(error = %err, "unexpected follow-up prompts shape");
            Vec::new()
        }),
    }
}
