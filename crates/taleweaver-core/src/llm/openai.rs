use crate::constants::endpoints;
use crate::error::TaleError;
use crate::llm::traits::*;
use futures::channel::mpsc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    idle_timeout: Duration,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: endpoints::OPENAI_BASE_URL.to_string(),
            idle_timeout: Duration::from_secs(endpoints::IDLE_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Rebuild the HTTP client with a connect timeout and set the idle
    /// timeout applied while waiting for headers or the next body chunk.
    /// There is no cap on the total length of a reply.
    pub fn with_timeouts(mut self, connect: Duration, idle: Duration) -> Result<Self, TaleError> {
        self.client = reqwest::Client::builder()
            .connect_timeout(connect)
            .build()
            .map_err(|e| TaleError::Config(format!("Failed to build HTTP client: {e}")))?;
        self.idle_timeout = idle;
        Ok(self)
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn request_body(
        messages: &[Message],
        options: &CompletionOptions,
        stream: bool,
    ) -> OpenAIRequest {
        OpenAIRequest {
            model: options.model.clone(),
            messages: messages
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "role": m.role,
                        "content": m.content,
                    })
                })
                .collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: stream.then_some(true),
        }
    }

    fn stalled(&self) -> TaleError {
        TaleError::TransientService(format!(
            "no data from the model for {}s",
            self.idle_timeout.as_secs_f32()
        ))
    }

    async fn send(&self, body: &OpenAIRequest) -> Result<reqwest::Response, TaleError> {
        let request = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send();
        let response = tokio::time::timeout(self.idle_timeout, request)
            .await
            .map_err(|_| self.stalled())?
            .map_err(TaleError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = tokio::time::timeout(self.idle_timeout, response.text())
                .await
                .ok()
                .and_then(|r| r.ok())
                .unwrap_or_default();
            return Err(TaleError::from_status(status, &text));
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Value>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

impl From<OpenAIResponse> for LlmResponse {
    /// Choices with `null` content (refusals, tool-only replies) are not
    /// candidates.
    fn from(response: OpenAIResponse) -> Self {
        Self {
            candidates: response
                .choices
                .into_iter()
                .filter_map(|c| c.message.content)
                .collect(),
            usage: response.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        }
    }
}

/// One parsed `data:` line of a streamed completion.
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Error { message: String, transient: bool },
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return SseLine::Done;
    }

    let Ok(event) = serde_json::from_str::<Value>(data) else {
        return SseLine::Skip;
    };
    if let Some(error) = event.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return SseLine::Error {
            message,
            transient: is_transient_error_kind(error),
        };
    }

    event
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| SseLine::Delta(s.to_string()))
        .unwrap_or(SseLine::Skip)
}

/// Server-side failures reported inside a stream: overload, rate limits,
/// internal errors and timeouts are worth another attempt.
fn is_transient_error_kind(error: &Value) -> bool {
    ["type", "code"]
        .iter()
        .filter_map(|key| error.get(key).and_then(|v| v.as_str()))
        .map(str::to_ascii_lowercase)
        .any(|kind| {
            kind.contains("server_error")
                || kind.contains("overloaded")
                || kind.contains("rate_limit")
                || kind.contains("timeout")
        })
}

/// Splits raw body bytes into SSE lines. Bytes are only decoded once a whole
/// line has arrived, so characters split across chunks survive intact.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<SseLine> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            lines.push(parse_sse_line(&String::from_utf8_lossy(&line)));
        }
        lines
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAIClient {
    async fn chat(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<LlmResponse, TaleError> {
        let body = Self::request_body(messages, options, false);
        let response = self.send(&body).await?;
        let response_text = tokio::time::timeout(self.idle_timeout, response.text())
            .await
            .map_err(|_| self.stalled())?
            .map_err(TaleError::from_transport)?;

        let api_response: OpenAIResponse = serde_json::from_str(&response_text)
            .map_err(|e| TaleError::Llm(format!("Failed to parse response: {e}")))?;
        Ok(api_response.into())
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>, TaleError> {
        let body = Self::request_body(messages, options, true);
        let response = self.send(&body).await?;

        let (tx, rx) = mpsc::unbounded();

        let idle_timeout = self.idle_timeout;
        let mut stream = response.bytes_stream();
        tokio::spawn(async move {
            use futures::StreamExt;
            let mut decoder = SseDecoder::default();

            loop {
                let chunk = match tokio::time::timeout(idle_timeout, stream.next()).await {
                    Ok(Some(Ok(chunk))) => chunk,
                    Ok(Some(Err(e))) => {
                        let _ = tx.unbounded_send(StreamEvent::transient_error(e.to_string()));
                        return;
                    }
                    Ok(None) => {
                        let _ = tx.unbounded_send(StreamEvent::transient_error(
                            "stream ended before [DONE]",
                        ));
                        return;
                    }
                    Err(_) => {
                        let _ = tx.unbounded_send(StreamEvent::transient_error(format!(
                            "no data from the model for {}s",
                            idle_timeout.as_secs_f32()
                        )));
                        return;
                    }
                };

                for line in decoder.push(&chunk) {
                    let event = match line {
                        SseLine::Delta(text) => StreamEvent::TextDelta(text),
                        SseLine::Done => {
                            let _ = tx.unbounded_send(StreamEvent::Done);
                            return;
                        }
                        SseLine::Error { message, transient } => {
                            let _ = tx.unbounded_send(StreamEvent::Error { message, transient });
                            return;
                        }
                        SseLine::Skip => continue,
                    };
                    if tx.unbounded_send(event).is_err() {
                        // Receiver dropped.
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"The tide"}}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Delta("The tide".into()));
    }

    #[test]
    fn recognises_done_marker() {
        assert_eq!(parse_sse_line("data: [DONE]\n"), SseLine::Done);
    }

    #[test]
    fn skips_role_only_and_non_data_lines() {
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(role_only), SseLine::Skip);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_sse_line(""), SseLine::Skip);
    }

    #[test]
    fn error_events_are_classified() {
        let overloaded =
            r#"data: {"error":{"message":"The server is overloaded","type":"server_error"}}"#;
        assert_eq!(
            parse_sse_line(overloaded),
            SseLine::Error {
                message: "The server is overloaded".into(),
                transient: true,
            }
        );

        let policy = r#"data: {"error":{"message":"content policy","type":"invalid_request_error"}}"#;
        assert_eq!(
            parse_sse_line(policy),
            SseLine::Error {
                message: "content policy".into(),
                transient: false,
            }
        );

        let bare = r#"data: {"error":{"code":"rate_limit_exceeded"}}"#;
        assert!(matches!(
            parse_sse_line(bare),
            SseLine::Error { transient: true, .. }
        ));
    }

    #[test]
    fn decoder_keeps_characters_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&line[..split]).is_empty());
        assert_eq!(decoder.push(&line[split..]), vec![SseLine::Delta("café".into())]);
    }

    #[test]
    fn decoder_yields_every_complete_line_in_a_chunk() {
        let chunk = b": keep-alive\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\ndata: [DONE]\n";
        let lines = SseDecoder::default().push(chunk);
        assert_eq!(
            lines,
            vec![
                SseLine::Skip,
                SseLine::Skip,
                SseLine::Delta("A".into()),
                SseLine::Done,
            ]
        );
    }

    #[test]
    fn null_content_is_not_a_candidate() {
        let raw = r#"{"choices":[{"message":{"content":null}},{"message":{"content":"Short."}}]}"#;
        let response: OpenAIResponse = serde_json::from_str(raw).unwrap();
        let response = LlmResponse::from(response);
        assert_eq!(response.candidates, vec!["Short.".to_string()]);

        let raw = r#"{"choices":[{"message":{"content":null}}]}"#;
        let response: OpenAIResponse = serde_json::from_str(raw).unwrap();
        assert!(LlmResponse::from(response).candidates.is_empty());
    }

    #[test]
    fn request_body_carries_sampling_options() {
        let options = CompletionOptions {
            model: "gpt-4o".into(),
            temperature: 0.9,
            max_tokens: 1500,
        };
        let body = OpenAIClient::request_body(&[Message::user("look")], &options, true);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["max_tokens"], 1500);
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");

        let body = OpenAIClient::request_body(&[], &options, false);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("stream").is_none());
    }
}
