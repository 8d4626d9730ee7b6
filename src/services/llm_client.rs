use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ChatError, ChatResult};
use crate::models::Message;
use super::config_service::ClientConfig;
use super::sse_decoder::{SseDecoder, SseFrame};

/// Cumulative response text, one item per received delta
pub type SnapshotStream = BoxStream<'static, ChatResult<String>>;

/// OpenAI-compatible streaming chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<RequestMessage>,
    pub temperature: f32,
    pub max_tokens: i32,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Plain text, or a list of typed parts when an image is attached
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One `data:` frame of a streamed completion
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// The user turn being sent: text, an image data URL, or both
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserTurn {
    pub text: String,
    pub image_url: Option<String>,
}

impl UserTurn {
    pub fn new(text: &str, image_url: Option<String>) -> Self {
        Self {
            text: text.to_string(),
            image_url,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.image_url.is_none()
    }

    /// Wire content: a plain string for text only, typed parts otherwise
    pub fn content(&self) -> MessageContent {
        match &self.image_url {
            None => MessageContent::Text(self.text.clone()),
            Some(url) => {
                let mut parts = Vec::with_capacity(2);
                if !self.text.is_empty() {
                    parts.push(ContentPart::Text {
                        text: self.text.clone(),
                    });
                }
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl { url: url.clone() },
                });
                MessageContent::Parts(parts)
            }
        }
    }
}

/// Streaming client for OpenAI-compatible chat completion endpoints
pub struct LlmClient {
    client: Client,
    config: ClientConfig,
}

impl LlmClient {
    pub fn new(config: ClientConfig) -> ChatResult<Self> {
        // No overall timeout: a long generation may stream for minutes
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Full URL of the chat completions endpoint
    pub fn completions_url(&self) -> String {
        if self.config.base_url.ends_with("/chat/completions") {
            self.config.base_url.clone()
        } else {
            format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
        }
    }

    /// Build the request body from prior history plus the new turn
    pub fn build_request(&self, history: &[Message], turn: &UserTurn) -> ChatCompletionRequest {
        let mut messages: Vec<RequestMessage> = history
            .iter()
            .map(|m| RequestMessage {
                role: m.sender.role().to_string(),
                content: MessageContent::Text(m.text.clone()),
            })
            .collect();
        messages.push(RequestMessage {
            role: "user".to_string(),
            content: turn.content(),
        });

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: true,
        }
    }

    /// Send `request` and stream back the accumulated response text.
    ///
    /// Nothing is sent until the stream is first polled. A non-success status
    /// or a network failure ends the stream with an error; malformed frames
    /// are skipped. The stream finishes at `data: [DONE]` or at end of body.
    pub fn stream_chat(&self, request: ChatCompletionRequest) -> SnapshotStream {
        let client = self.client.clone();
        let url = self.completions_url();
        let api_key = self.config.api_key.clone();

        let stream = async_stream::try_stream! {
            let response = open_response(&client, &url, api_key.as_deref(), &request).await?;

            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            let mut accumulated = String::new();
            let mut finished = false;

            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                for frame in decoder.push(&chunk) {
                    match frame {
                        SseFrame::Done => {
                            finished = true;
                            break;
                        }
                        SseFrame::Data(payload) => {
                            if let Some(delta) = parse_delta(&payload) {
                                accumulated.push_str(&delta);
                                yield accumulated.clone();
                            }
                        }
                    }
                }
                if finished {
                    break;
                }
            }

            if !finished {
                match decoder.finish() {
                    Some(SseFrame::Done) => {}
                    Some(SseFrame::Data(payload)) => {
                        if let Some(delta) = parse_delta(&payload) {
                            accumulated.push_str(&delta);
                            yield accumulated.clone();
                        }
                        debug!("Stream ended without a [DONE] frame");
                    }
                    None => debug!("Stream ended without a [DONE] frame"),
                }
            }

            debug!(chars = accumulated.len(), "Completion stream finished");
        };

        Box::pin(stream)
    }
}

/// Send the request and check the status before any frame is read
async fn open_response(
    client: &Client,
    url: &str,
    api_key: Option<&str>,
    request: &ChatCompletionRequest,
) -> ChatResult<reqwest::Response> {
    let mut builder = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(request);
    if let Some(key) = api_key {
        builder = builder.bearer_auth(key);
    }

    let response = builder.send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ChatError::Upstream {
            status,
            message: extract_error_message(&body),
        });
    }

    Ok(response)
}

/// Text delta of one frame, if it carries any. Unparseable frames are
/// logged and yield `None`.
fn parse_delta(payload: &str) -> Option<String> {
    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|content| !content.is_empty()),
        Err(e) => {
            warn!(error = %e, payload = %payload, "Skipping malformed stream frame");
            None
        }
    }
}

/// Pull the human-readable part out of an error body. Handles
/// `{"error": "..."}` and `{"error": {"message": "..."}}`, else the raw text.
fn extract_error_message(body: &str) -> String {
    let body = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let error = value.get("error");
        if let Some(text) = error.and_then(|e| e.as_str()) {
            return text.to_string();
        }
        if let Some(text) = error
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return text.to_string();
        }
    }
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> LlmClient {
        LlmClient::new(ClientConfig::new("http://localhost:1234/v1", "test-model")).unwrap()
    }

    #[test]
    fn text_only_turn_is_plain_string() {
        let turn = UserTurn::new("Hello", None);
        assert_eq!(serde_json::to_value(turn.content()).unwrap(), json!("Hello"));
    }

    #[test]
    fn text_and_image_turn_has_two_parts() {
        let turn = UserTurn::new("What is this?", Some("data:image/png;base64,AAAA".into()));
        assert_eq!(
            serde_json::to_value(turn.content()).unwrap(),
            json!([
                {"type": "text", "text": "What is this?"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
            ])
        );
    }

    #[test]
    fn image_only_turn_has_single_image_part() {
        let turn = UserTurn::new("", Some("data:image/png;base64,AAAA".into()));
        assert_eq!(
            serde_json::to_value(turn.content()).unwrap(),
            json!([{"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}])
        );
    }

    #[test]
    fn empty_turn_detection() {
        assert!(UserTurn::new("  ", None).is_empty());
        assert!(!UserTurn::new("", Some("data:x".into())).is_empty());
    }

    #[test]
    fn request_maps_history_and_appends_turn() {
        let history = vec![Message::user("Hi", None), Message::assistant("Hello!")];
        let request = client().build_request(&history, &UserTurn::new("How are you?", None));

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "test-model",
                "messages": [
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello!"},
                    {"role": "user", "content": "How are you?"}
                ],
                "temperature": 0.7f32,
                "max_tokens": -1,
                "stream": true
            })
        );
    }

    #[test]
    fn completions_url_appends_path_once() {
        assert_eq!(client().completions_url(), "http://localhost:1234/v1/chat/completions");

        let full = LlmClient::new(ClientConfig::new(
            "http://host/v1/chat/completions",
            "m",
        ))
        .unwrap();
        assert_eq!(full.completions_url(), "http://host/v1/chat/completions");
    }

    #[test]
    fn delta_is_read_from_first_choice() {
        assert_eq!(
            parse_delta(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).as_deref(),
            Some("Hi")
        );
        assert_eq!(parse_delta(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#), None);
        assert_eq!(parse_delta(r#"{"choices":[{"delta":{"content":""}}]}"#), None);
        assert_eq!(parse_delta(r#"{"choices":[]}"#), None);
        assert_eq!(parse_delta("not json"), None);
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(extract_error_message(r#"{"error":"model not loaded"}"#), "model not loaded");
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"bad key","type":"auth"}}"#),
            "bad key"
        );
        assert_eq!(extract_error_message("  plain failure \n"), "plain failure");
        assert_eq!(extract_error_message(""), "");
    }
}
