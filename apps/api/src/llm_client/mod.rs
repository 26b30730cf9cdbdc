//! LLM Client — the single point of entry for all model calls in the interview service.
//!
//! ARCHITECTURAL RULE: No other module may call the OpenAI API directly.
//! All text and image generation MUST go through `LlmBackend`.
//!
//! Models: gpt-4.1-nano for text, dall-e-3 for images (hardcoded to prevent drift).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod extract;
#[cfg(test)]
pub mod scripted;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// The text model used for every completion.
pub const MODEL: &str = "gpt-4.1-nano";
pub const IMAGE_MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1024";
const IMAGE_QUALITY: &str = "standard";
const TEMPERATURE: f32 = 0.7;
/// Output-token ceiling used unless an operation needs a tighter one.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Retries after the first attempt, for transient failures only.
const MAX_RETRIES: u32 = 3;
/// First backoff delay; doubles on each retry.
const RETRY_BASE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM client misconfigured: {0}")]
    Configuration(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM call failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Failed to decode LLM response: {0}")]
    Decode(#[from] serde_json::Error),
}

// ────────────────────────────────────────────────────────────────────────────
// Backend trait
// ────────────────────────────────────────────────────────────────────────────

/// Text and image generation as seen by the interview operations.
///
/// `OpenAiClient` is the production implementation; tests drive the
/// operations with a scripted backend.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// One text completion for `prompt`, capped at `max_tokens` output tokens.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;

    /// One image for `prompt`; returns its URL.
    async fn request_image(&self, prompt: &str) -> Result<String, LlmError>;

    /// Image generation that never fails the caller: any error becomes `None`.
    async fn generate_image(&self, prompt: &str) -> Option<String> {
        best_effort("Image generation", self.request_image(prompt)).await
    }
}

/// Awaits `attempt`, logging and discarding its error.
pub async fn best_effort<T, E, F>(label: &str, attempt: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match attempt.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{label} failed, continuing without it: {e}");
            None
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Text of the first choice, if it has any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u8,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// OpenAI client
// ────────────────────────────────────────────────────────────────────────────

/// Credential-bound client for the OpenAI chat and image endpoints.
/// Retries transient failures with exponential backoff.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    retry_base: Duration,
}

impl OpenAiClient {
    /// Fails with `LlmError::Configuration` if the credential is blank.
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::Configuration(
                "an OpenAI API key is required".to_string(),
            ));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_base: RETRY_BASE,
        })
    }

    /// POSTs `body` to `path`, retrying on connection errors, timeouts,
    /// 408/409/429 and 5xx. Any other non-success status returns immediately.
    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, LlmError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_base, attempt);
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) if is_transient(&e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
                Err(e) => return Err(LlmError::Http(e)),
            };

            let status = response.status();

            if is_retryable_status(status.as_u16()) {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: api_error_message(body),
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: api_error_message(body),
                });
            }

            let body = response.text().await?;
            return Ok(serde_json::from_str::<R>(&body)?);
        }

        Err(LlmError::RetriesExhausted {
            attempts: MAX_RETRIES + 1,
            last: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl LlmBackend for OpenAiClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: MODEL,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature: TEMPERATURE,
        };

        let response: ChatResponse = self.post_json("chat/completions", &request).await?;

        if let Some(usage) = &response.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }

    async fn request_image(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ImageRequest {
            model: IMAGE_MODEL,
            prompt,
            size: IMAGE_SIZE,
            quality: IMAGE_QUALITY,
            n: 1,
        };

        let response: ImageResponse = self.post_json("images/generations", &request).await?;

        response
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or(LlmError::EmptyContent)
    }
}

/// Timeouts and failed connections. Anything else (TLS, malformed URL,
/// redirect loops) will fail the same way again.
fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 429) || (500..=599).contains(&status)
}

/// Exponential backoff from `base`: 1s, 2s, 4s with the default base.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * (1 << attempt.saturating_sub(1))
}

fn api_error_message(body: String) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    use super::*;

    /// Serves `script` in order on both endpoints, repeating the last entry,
    /// and counts the requests received.
    async fn stub_server(script: Vec<(StatusCode, Value)>) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(script);

        let counter = hits.clone();
        let handler = move || {
            let counter = counter.clone();
            let script = script.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = script[n.min(script.len() - 1)].clone();
                (status, Json(body))
            }
        };
        let app = Router::new()
            .route("/chat/completions", post(handler.clone()))
            .route("/images/generations", post(handler));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (format!("http://{addr}"), hits)
    }

    fn fast_client(base_url: &str) -> OpenAiClient {
        let mut client = OpenAiClient::new("sk-test", base_url).unwrap();
        client.retry_base = Duration::from_millis(1);
        client
    }

    fn api_failure(status: StatusCode) -> (StatusCode, Value) {
        (status, json!({"error": {"message": format!("stubbed {status}")}}))
    }

    fn chat_success(text: &str) -> (StatusCode, Value) {
        (
            StatusCode::OK,
            json!({"choices": [{"message": {"role": "assistant", "content": text}}]}),
        )
    }

    #[tokio::test]
    async fn test_transient_status_is_retried_three_times() {
        let (url, hits) = stub_server(vec![api_failure(StatusCode::SERVICE_UNAVAILABLE)]).await;

        let err = fast_client(&url).complete("hi", 10).await.unwrap_err();

        match err {
            LlmError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 4);
                assert!(last.contains("503"), "{last}");
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let (url, hits) = stub_server(vec![
            api_failure(StatusCode::TOO_MANY_REQUESTS),
            api_failure(StatusCode::BAD_GATEWAY),
            chat_success("{\"a\": 1}"),
        ])
        .await;

        let text = fast_client(&url).complete("hi", 10).await.unwrap();

        assert_eq!(text, "{\"a\": 1}");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::BAD_REQUEST] {
            let (url, hits) = stub_server(vec![api_failure(status)]).await;

            let err = fast_client(&url).complete("hi", 10).await.unwrap_err();

            match err {
                LlmError::Api { status: got, message } => {
                    assert_eq!(got, status.as_u16());
                    assert_eq!(message, format!("stubbed {status}"));
                }
                other => panic!("expected Api error, got {other:?}"),
            }
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_image_failures_reach_best_effort() {
        let (url, hits) = stub_server(vec![api_failure(StatusCode::TOO_MANY_REQUESTS)]).await;
        let client = fast_client(&url);

        assert_eq!(client.generate_image("portrait").await, None);
        assert_eq!(hits.load(Ordering::SeqCst), 4);

        let (url, hits) = stub_server(vec![api_failure(StatusCode::UNAUTHORIZED)]).await;
        let err = fast_client(&url).request_image("portrait").await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 401, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_image_success_returns_url() {
        let (url, _) = stub_server(vec![(
            StatusCode::OK,
            json!({"data": [{"url": "https://images.test/0.png"}]}),
        )])
        .await;

        let image = fast_client(&url).generate_image("portrait").await;

        assert_eq!(image.as_deref(), Some("https://images.test/0.png"));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let (url, hits) = stub_server(vec![(StatusCode::OK, json!({"choices": "nope"}))]).await;

        let err = fast_client(&url).complete("hi", 10).await.unwrap_err();

        assert!(matches!(err, LlmError::Decode(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refused_connection_is_retried() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fast_client(&format!("http://{addr}"))
            .complete("hi", 10)
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::RetriesExhausted { attempts: 4, .. }));
    }

    #[tokio::test]
    async fn test_malformed_url_fails_without_retry() {
        let err = fast_client("not a url").complete("hi", 10).await.unwrap_err();

        assert!(matches!(err, LlmError::Http(_)), "{err:?}");
    }

    #[test]
    fn test_new_rejects_blank_api_key() {
        let result = OpenAiClient::new("  ", DEFAULT_BASE_URL);
        assert!(matches!(result, Err(LlmError::Configuration(_))));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = OpenAiClient::new("sk-test", "http://localhost:9000/v1/").unwrap();
        assert_eq!(client.base_url, "http://localhost:9000/v1");
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [408, 409, 429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status), "{status} should retry");
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!is_retryable_status(status), "{status} must surface immediately");
        }
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(RETRY_BASE, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(RETRY_BASE, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(RETRY_BASE, 3), Duration::from_secs(4));
    }

    #[test]
    fn test_chat_request_wire_shape() {
        let request = ChatRequest {
            model: MODEL,
            messages: vec![ChatMessage {
                role: "user",
                content: "안녕",
            }],
            max_tokens: 2000,
            temperature: TEMPERATURE,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4.1-nano");
        assert_eq!(value["max_tokens"], 2000);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "안녕");
        assert!((value["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_image_request_wire_shape() {
        let request = ImageRequest {
            model: IMAGE_MODEL,
            prompt: "portrait",
            size: IMAGE_SIZE,
            quality: IMAGE_QUALITY,
            n: 1,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "dall-e-3");
        assert_eq!(value["size"], "1024x1024");
        assert_eq!(value["quality"], "standard");
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn test_chat_response_text() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "{\"a\": 1}"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}}"#,
        )
        .unwrap();
        assert_eq!(response.text(), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_chat_response_without_content() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert_eq!(response.text(), None);

        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert_eq!(response.text(), None);
    }

    #[test]
    fn test_api_error_message_prefers_envelope() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(
            api_error_message(body.to_string()),
            "Incorrect API key provided"
        );
        assert_eq!(api_error_message("gateway down".to_string()), "gateway down");
    }

    #[tokio::test]
    async fn test_best_effort_keeps_success() {
        let value = best_effort("test", async { Ok::<_, LlmError>(7) }).await;
        assert_eq!(value, Some(7));
    }

    #[tokio::test]
    async fn test_best_effort_swallows_failure() {
        let value: Option<u8> = best_effort("test", async {
            Err(LlmError::Api {
                status: 500,
                message: "boom".to_string(),
            })
        })
        .await;
        assert_eq!(value, None);
    }
}
