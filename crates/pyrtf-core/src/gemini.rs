//! Google Gemini HTTP provider.
//!
//! Calls the `generateContent` endpoint once per request, asking for a JSON
//! response. There is no retry and no client-side timeout: the request runs
//! for as long as the provider keeps it open.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::provider::GenerationProvider;

/// Environment variable consulted when the configured one is unset.
const FALLBACK_API_KEY_ENV: &str = "API_KEY";

/// Body returned in place of an empty text response.
const EMPTY_RESPONSE_TEXT: &str = "{}";

/// Gemini `generateContent` provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    thinking_budget: u32,
}

impl GeminiProvider {
    /// Create a provider with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Misconfiguration` if the HTTP client cannot be
    /// constructed.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        thinking_budget: u32,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| {
                ProviderError::Misconfiguration(format!("failed to build HTTP client: {e}"))
            })?;

        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.into(),
            api_key,
            thinking_budget,
        })
    }

    /// Create a provider from settings, reading the API key from the
    /// environment.
    ///
    /// A missing key is not an error here; requests fail with
    /// `ProviderError::Misconfiguration` until one is available.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Misconfiguration` if the HTTP client cannot be
    /// constructed.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = resolve_api_key(&config.api_key_env, |name| std::env::var(name).ok());

        if api_key.is_none() {
            debug!(
                env = %config.api_key_env,
                "no API key found in environment; requests will fail until one is set"
            );
        }

        Self::new(
            config.base_url.clone(),
            config.model.clone(),
            api_key,
            config.thinking_budget,
        )
    }

    /// Full `generateContent` URL for the configured model.
    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Build the request body for `prompt`.
    fn build_request<'a>(&self, prompt: &'a str) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                thinking_config: ThinkingConfig {
                    thinking_budget: self.thinking_budget,
                },
            },
        }
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::Misconfiguration("no Gemini API key configured".to_owned())
        })?;

        debug!(prompt_len = prompt.len(), "invoking gemini");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = extract_text(&body)?;
        debug!(response_len = text.len(), "gemini responded");
        Ok(text)
    }
}

/// Look up the API key under `primary`, then [`FALLBACK_API_KEY_ENV`].
///
/// Blank values count as unset, so an empty primary variable still falls
/// through to the fallback.
fn resolve_api_key(primary: &str, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    let non_blank = |name: &str| lookup(name).filter(|key| !key.trim().is_empty());
    non_blank(primary).or_else(|| non_blank(FALLBACK_API_KEY_ENV))
}

/// Pull the answer text out of a `generateContent` response envelope.
///
/// Concatenates the non-thought text parts of the first candidate. An empty
/// answer becomes `{}`.
pub(crate) fn extract_text(body: &str) -> Result<String, ProviderError> {
    let envelope: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("invalid envelope: {e}")))?;

    let text: String = envelope
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        Ok(EMPTY_RESPONSE_TEXT.to_owned())
    } else {
        Ok(text)
    }
}

// ── Wire types ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::client::GenerationClient;
    use crate::config::Configuration;
    use crate::error::GENERATION_FAILURE_MESSAGE;

    /// Answer one HTTP request on a local port with `status` and `body`.
    ///
    /// Returns the base URL and a handle yielding the raw request, with
    /// header names and values lowercased.
    async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind listener");
        let addr = listener.local_addr().expect("should have local addr");

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("should accept");
            let request = read_request(&mut socket).await;

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("should write response");
            socket.shutdown().await.ok();
            request
        });

        (format!("http://{addr}/v1beta"), handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.expect("should read request");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let content_length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_lowercase()
    }

    fn local_provider(base_url: &str) -> GeminiProvider {
        GeminiProvider::new(base_url, "gemini-test", Some("Secret-Key".to_owned()), 512)
            .expect("should build provider")
    }

    fn envelope(text: &str) -> String {
        json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        })
        .to_string()
    }

    fn provider() -> GeminiProvider {
        GeminiProvider::new(
            "https://example.test/v1beta/",
            "gemini-test",
            Some("key".to_owned()),
            1024,
        )
        .expect("should build provider")
    }

    #[test]
    fn test_should_build_endpoint_without_double_slash() {
        assert_eq!(
            provider().endpoint(),
            "https://example.test/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn test_should_serialize_request_body() {
        let body = serde_json::to_value(provider().build_request("hello")).expect("should serialize");
        assert_eq!(
            body,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "thinkingConfig": {"thinkingBudget": 1024}
                }
            })
        );
    }

    #[test]
    fn test_should_extract_joined_text_skipping_thoughts() {
        let body = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "planning...", "thought": true},
                        {"text": "{\"code\":"},
                        {"text": "\"x\"}"}
                    ]
                }
            }]
        })
        .to_string();

        assert_eq!(extract_text(&body).expect("should extract"), "{\"code\":\"x\"}");
    }

    #[test]
    fn test_should_return_empty_object_for_missing_text() {
        assert_eq!(extract_text(r#"{"candidates": []}"#).expect("should extract"), "{}");
        assert_eq!(extract_text("{}").expect("should extract"), "{}");
    }

    #[test]
    fn test_should_reject_non_json_envelope() {
        let result = extract_text("<html>502</html>");
        assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_should_fail_without_api_key() {
        let provider =
            GeminiProvider::new("https://example.test", "gemini-test", None, 0).expect("should build");
        let result = provider.complete("prompt").await;
        assert!(matches!(result, Err(ProviderError::Misconfiguration(_))));
    }

    #[tokio::test]
    async fn test_should_map_non_success_status() {
        let (base_url, server) = serve_once("500 Internal Server Error", "oops".to_owned()).await;

        let result = local_provider(&base_url).complete("prompt").await;
        server.await.expect("server task should finish");

        match result {
            Err(ProviderError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "oops");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_should_return_text_from_success_envelope() {
        let reply = r#"{"code":"C","requirements":"R","instructions":"I"}"#;
        let (base_url, server) = serve_once("200 OK", envelope(reply)).await;

        let text = local_provider(&base_url)
            .complete("prompt")
            .await
            .expect("should complete");
        server.await.expect("server task should finish");

        assert_eq!(text, reply);
    }

    #[tokio::test]
    async fn test_should_send_api_key_header_and_json_body() {
        let (base_url, server) = serve_once("200 OK", envelope("{}")).await;

        local_provider(&base_url)
            .complete("Build the merger")
            .await
            .expect("should complete");
        let request = server.await.expect("server task should finish");

        assert!(request.starts_with("post /v1beta/models/gemini-test:generatecontent "));
        assert!(request.contains("x-goog-api-key: secret-key\r\n"));
        assert!(!request.contains("key=secret-key"));
        assert!(request.contains("\"responsemimetype\":\"application/json\""));
        assert!(request.contains("build the merger"));
    }

    #[tokio::test]
    async fn test_should_report_transport_error_when_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind listener");
        let addr = listener.local_addr().expect("should have local addr");
        drop(listener);

        let result = local_provider(&format!("http://{addr}/v1beta"))
            .complete("prompt")
            .await;
        assert!(matches!(result, Err(ProviderError::Transport(_))));
    }

    #[tokio::test]
    async fn test_should_collapse_status_error_in_client() {
        let (base_url, server) = serve_once("500 Internal Server Error", "oops".to_owned()).await;
        let pm = pyrtf_pm::PromptManager::new().expect("should create manager");
        let client = GenerationClient::new(pm, Arc::new(local_provider(&base_url)));

        let failure = client
            .generate(&Configuration::default())
            .await
            .expect_err("status error should fail");
        server.await.expect("server task should finish");

        assert_eq!(failure.message(), GENERATION_FAILURE_MESSAGE);
    }

    #[test]
    fn test_should_fall_back_when_primary_key_is_blank() {
        let env = |name: &str| match name {
            "GEMINI_API_KEY" => Some("  ".to_owned()),
            "API_KEY" => Some("fallback".to_owned()),
            _ => None,
        };
        assert_eq!(
            resolve_api_key("GEMINI_API_KEY", env).as_deref(),
            Some("fallback")
        );
    }

    #[test]
    fn test_should_prefer_primary_key_and_ignore_blank_fallback() {
        let both = |name: &str| match name {
            "GEMINI_API_KEY" => Some("primary".to_owned()),
            _ => Some("fallback".to_owned()),
        };
        assert_eq!(resolve_api_key("GEMINI_API_KEY", both).as_deref(), Some("primary"));

        let blank = |_: &str| Some(String::new());
        assert!(resolve_api_key("GEMINI_API_KEY", blank).is_none());
    }
}
