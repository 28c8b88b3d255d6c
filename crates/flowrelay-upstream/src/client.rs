//! Flowise prediction client

use std::pin::Pin;

use futures::{Stream, StreamExt};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, UpstreamError};
use crate::event::{PredictionChunk, PredictionRequest, RawFrame, Upload};

const DEFAULT_SYSTEM_MESSAGE: &str = "Help the user with their questions";

/// Boxed stream of typed prediction chunks. Lazy, finite, non-restartable;
/// ends after the first `Err` item.
pub type PredictionStream = Pin<Box<dyn Stream<Item = Result<PredictionChunk>> + Send>>;

/// Client for a Flowise-style prediction API
pub struct FlowiseClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    chatflow_id: String,
    system_message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictionBody {
    question: String,
    chat_id: String,
    streaming: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    uploads: Vec<Upload>,
    override_config: OverrideConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OverrideConfig {
    system_message: String,
}

/// Accumulates raw network bytes and yields complete `\n\n`-delimited SSE
/// frames. Splitting on bytes before decoding keeps multi-byte characters
/// that straddle a chunk boundary intact.
#[derive(Default)]
struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();
        while let Some(pos) = self.buf.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.buf.drain(..pos + 2).collect();
            frames.push(String::from_utf8_lossy(&frame[..pos]).into_owned());
        }
        frames
    }
}

impl FlowiseClient {
    /// Create a new client against `base_url` for one chatflow
    pub fn new(base_url: impl Into<String>, chatflow_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            chatflow_id: chatflow_id.into(),
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
        }
    }

    /// Authenticate requests with an API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the persona instruction sent with every prediction
    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = system_message.into();
        self
    }

    pub fn chatflow_id(&self) -> &str {
        &self.chatflow_id
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Open one streaming prediction call.
    ///
    /// When the request carries no chat id, a fresh UUID is generated so the
    /// upstream starts a new conversation. Connection and HTTP-status
    /// failures surface as the first (and last) item of the stream.
    pub fn create_prediction(&self, request: PredictionRequest) -> PredictionStream {
        let url = format!("{}/api/v1/prediction/{}", self.base_url, self.chatflow_id);
        let body = PredictionBody {
            question: request.question,
            chat_id: request
                .chat_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            streaming: true,
            uploads: request.uploads,
            override_config: OverrideConfig {
                system_message: self.system_message.clone(),
            },
        };
        let builder = self.authorize(
            self.client
                .post(&url)
                .header("Accept", "text/event-stream")
                .json(&body),
        );

        Box::pin(async_stream::stream! {
            let response = match builder.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    yield Err(UpstreamError::Http(e));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                yield Err(UpstreamError::Api {
                    status: status.as_u16(),
                    message,
                });
                return;
            }

            let mut byte_stream = response.bytes_stream();
            let mut frames = FrameBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(UpstreamError::Stream(e.to_string()));
                        return;
                    }
                };

                for event_str in frames.push(&bytes) {
                    for line in event_str.lines() {
                        let Some(data) = line.strip_prefix("data:") else {
                            continue;
                        };
                        let data = data.trim_start();
                        if data.is_empty() || data == "[DONE]" {
                            continue;
                        }

                        let frame: RawFrame = match serde_json::from_str(data) {
                            Ok(frame) => frame,
                            Err(err) => {
                                debug!(error = %err, "skipping malformed stream frame");
                                continue;
                            }
                        };

                        match PredictionChunk::from_frame(frame) {
                            Ok(Some(chunk)) => yield Ok(chunk),
                            Ok(None) => {}
                            Err(err) => {
                                debug!(error = %err, "skipping undecodable stream frame");
                            }
                        }
                    }
                }
            }
        })
    }

    /// Fetch a stored upload/generated file. Returns the raw response so the
    /// caller can forward body and content-type without buffering.
    pub async fn get_upload_file(
        &self,
        chatflow_id: &str,
        chat_id: &str,
        file_name: &str,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/api/v1/get-upload-file", self.base_url);
        let response = self
            .authorize(self.client.get(&url).query(&[
                ("chatflowId", chatflow_id),
                ("chatId", chat_id),
                ("fileName", file_name),
            ]))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response)
    }

    /// Fetch the public chatbot configuration for the chatflow
    pub async fn chatbot_config(&self) -> Result<Value> {
        let url = format!(
            "{}/api/v1/public-chatbotConfig/{}",
            self.base_url, self.chatflow_id
        );
        let response = self.authorize(self.client.get(&url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}
