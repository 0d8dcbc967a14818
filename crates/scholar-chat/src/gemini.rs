//! Gemini `generateContent` client.
//!
//! One prompt in, one answer out. Authentication uses the `x-goog-api-key`
//! header so the key never appears in URLs or logs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use scholar_core::config::AnsweringConfig;

use crate::answering::AnsweringService;
use crate::error::{AnsweringError, ChatError};
use crate::prompt::build_prompt;

/// Maximum number of body characters kept in error messages.
const MAX_ERROR_BODY: usize = 300;

pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiClient {
    /// Build a client from configuration.
    ///
    /// A missing or blank API key is a `ChatError::Configuration`; the caller
    /// should show a blocking configuration error and never start a session.
    pub fn from_config(config: &AnsweringConfig) -> Result<Self, ChatError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            ChatError::Configuration(format!(
                "Gemini API key is missing or invalid. Set the {} environment variable \
                 or [answering].api_key in the config file.",
                config.api_key_env
            ))
        })?;
        Self::new(
            api_key,
            &config.base_url,
            &config.model,
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )
    }

    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ChatError::Configuration("Gemini API key is empty".to_string()));
        }
        if model.trim().is_empty() {
            return Err(ChatError::Configuration("model name is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.trim().to_string(),
            api_key,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Send a fully built prompt and return the answer text.
    pub async fn generate(&self, prompt: &str) -> Result<String, AnsweringError> {
        let url = self.endpoint();
        info!(
            model = %self.model,
            url_prefix = %self.base_url,
            prompt_len = prompt.len(),
            "Calling Gemini"
        );

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                error!("Gemini HTTP request failed: {}", e);
                AnsweringError::from_reqwest(&e, self.timeout)
            })?;

        let status = resp.status();
        let retry_after_header = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = resp.text().await.map_err(|e| {
            error!("Failed to read Gemini response body: {}", e);
            AnsweringError::from_reqwest(&e, self.timeout)
        })?;

        if !status.is_success() {
            error!(status = %status, "Gemini API error: {}", truncate_body(&text));
            let mut err = classify_status(status.as_u16(), &text, &self.model);
            if let AnsweringError::RateLimited { retry_after_secs } = &mut err {
                if retry_after_secs.is_none() {
                    *retry_after_secs = retry_after_header;
                }
            }
            return Err(err);
        }

        let data: Value = serde_json::from_str(&text).map_err(|e| {
            error!("Failed to parse Gemini response JSON: {}", e);
            AnsweringError::Malformed(format!("JSON parse error: {}", e))
        })?;
        let answer = parse_answer(&data)?;
        debug!(model = %self.model, answer_len = answer.len(), "Gemini answered");
        Ok(answer)
    }
}

#[async_trait]
impl AnsweringService for GeminiClient {
    async fn answer(
        &self,
        knowledge: &str,
        topic_name: &str,
        question: &str,
    ) -> Result<String, AnsweringError> {
        let prompt = build_prompt(knowledge, topic_name, question);
        self.generate(&prompt).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Request body for a single-turn text prompt.
pub fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }]
        }]
    })
}

/// Extract the answer text from a `generateContent` response.
///
/// Concatenates the non-thought text parts of the first candidate. A missing
/// candidate, blocked prompt or empty text is `AnsweringError::NoAnswer`.
pub fn parse_answer(data: &Value) -> Result<String, AnsweringError> {
    if !data.is_object() {
        return Err(AnsweringError::Malformed(
            "expected a JSON object".to_string(),
        ));
    }

    let block_reason = data
        .get("promptFeedback")
        .and_then(|pf| pf.get("blockReason"))
        .and_then(|v| v.as_str());

    let Some(candidate) = data.get("candidates").and_then(|c| c.get(0)) else {
        warn!(
            block_reason = block_reason.unwrap_or(""),
            "Gemini returned no candidates"
        );
        return Err(AnsweringError::NoAnswer(match block_reason {
            Some(reason) => format!("prompt blocked ({})", reason),
            None => "no candidates returned".to_string(),
        }));
    };

    let mut text = String::new();
    if let Some(parts) = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
    {
        for part in parts {
            let is_thought = part
                .get("thought")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if is_thought {
                continue;
            }
            if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
                text.push_str(t);
            }
        }
    }

    let text = text.trim();
    if text.is_empty() {
        let finish_reason = candidate.get("finishReason").and_then(|v| v.as_str());
        return Err(AnsweringError::NoAnswer(match finish_reason {
            Some(reason) if !reason.eq_ignore_ascii_case("STOP") => {
                format!("finish reason: {}", reason)
            }
            _ => "empty answer".to_string(),
        }));
    }
    Ok(text.to_string())
}

/// Map a non-success HTTP status to an `AnsweringError`.
pub fn classify_status(status: u16, body: &str, model: &str) -> AnsweringError {
    let message = error_message(body);
    match status {
        401 | 403 => AnsweringError::Auth(message),
        404 => AnsweringError::ModelNotFound(model.to_string()),
        429 => AnsweringError::RateLimited {
            retry_after_secs: extract_retry_after(body),
        },
        _ => AnsweringError::Upstream { status, message },
    }
}

/// Prefer the structured `error.message` field over the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| truncate_body(body))
}

/// Retry delay from a 429 body.
///
/// Handles Google's `RetryInfo` detail (`"retryDelay": "7s"`) and the plain
/// `{"error": {"retry_after": 7}}` shape.
fn extract_retry_after(body: &str) -> Option<u64> {
    let v: Value = serde_json::from_str(body).ok()?;
    if let Some(secs) = v["error"]["retry_after"]
        .as_u64()
        .or_else(|| v["retry_after"].as_u64())
    {
        return Some(secs);
    }
    v["error"]["details"].as_array()?.iter().find_map(|d| {
        let delay = d.get("retryDelay")?.as_str()?;
        let secs: f64 = delay.trim_end_matches('s').parse().ok()?;
        Some(secs.ceil() as u64)
    })
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY {
        let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{}...", cut)
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_api_key() {
        let config = AnsweringConfig {
            api_key: None,
            api_key_env: "SCHOLAR_TEST_GEMINI_KEY_NOT_SET".to_string(),
            ..AnsweringConfig::default()
        };
        let err = GeminiClient::from_config(&config).unwrap_err();
        match err {
            ChatError::Configuration(msg) => {
                assert!(msg.contains("SCHOLAR_TEST_GEMINI_KEY_NOT_SET"))
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_config_builds_client() {
        let config = AnsweringConfig {
            api_key: Some("k".to_string()),
            base_url: "http://localhost:9/v1beta/".to_string(),
            ..AnsweringConfig::default()
        };
        let client = GeminiClient::from_config(&config).unwrap();
        assert_eq!(client.model(), "gemini-2.5-flash");
        assert_eq!(
            client.endpoint(),
            "http://localhost:9/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let client =
            GeminiClient::new("super-secret", "http://x", "m", Duration::from_secs(5)).unwrap();
        let dbg = format!("{:?}", client);
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn test_new_rejects_empty_model() {
        let result = GeminiClient::new("k", "http://x", "  ", Duration::from_secs(5));
        assert!(matches!(result, Err(ChatError::Configuration(_))));
    }

    #[test]
    fn test_request_body_shape() {
        let body = request_body("hello");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_parse_answer_joins_text_parts() {
        let data = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Acme U was " },
                    { "text": "founded in 1990." }
                ]},
                "finishReason": "STOP"
            }]
        });
        assert_eq!(parse_answer(&data).unwrap(), "Acme U was founded in 1990.");
    }

    #[test]
    fn test_parse_answer_skips_thought_parts() {
        let data = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "thinking about it", "thought": true },
                    { "text": "1990." }
                ]}
            }]
        });
        assert_eq!(parse_answer(&data).unwrap(), "1990.");
    }

    #[test]
    fn test_parse_answer_blocked_prompt() {
        let data = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert_eq!(
            parse_answer(&data).unwrap_err(),
            AnsweringError::NoAnswer("prompt blocked (SAFETY)".to_string())
        );
    }

    #[test]
    fn test_parse_answer_no_candidates() {
        let data = json!({ "candidates": [] });
        assert_eq!(
            parse_answer(&data).unwrap_err(),
            AnsweringError::NoAnswer("no candidates returned".to_string())
        );
    }

    #[test]
    fn test_parse_answer_empty_text_reports_finish_reason() {
        let data = json!({
            "candidates": [{ "content": { "parts": [] }, "finishReason": "MAX_TOKENS" }]
        });
        assert_eq!(
            parse_answer(&data).unwrap_err(),
            AnsweringError::NoAnswer("finish reason: MAX_TOKENS".to_string())
        );

        let data = json!({
            "candidates": [{ "content": { "parts": [{ "text": "  " }] }, "finishReason": "STOP" }]
        });
        assert_eq!(
            parse_answer(&data).unwrap_err(),
            AnsweringError::NoAnswer("empty answer".to_string())
        );
    }

    #[test]
    fn test_parse_answer_rejects_non_object() {
        assert!(matches!(
            parse_answer(&json!([1, 2])),
            Err(AnsweringError::Malformed(_))
        ));
    }

    #[test]
    fn test_classify_status() {
        let body = r#"{"error":{"code":403,"message":"API key not valid","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(
            classify_status(403, body, "m"),
            AnsweringError::Auth("API key not valid".to_string())
        );
        assert_eq!(
            classify_status(404, "", "gemini-x"),
            AnsweringError::ModelNotFound("gemini-x".to_string())
        );
        assert_eq!(
            classify_status(503, "overloaded", "m"),
            AnsweringError::Upstream {
                status: 503,
                message: "overloaded".to_string()
            }
        );
    }

    #[test]
    fn test_classify_rate_limit_retry_delay() {
        let body = r#"{"error":{"code":429,"message":"quota","details":[
            {"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"6.5s"}]}}"#;
        assert_eq!(
            classify_status(429, body, "m"),
            AnsweringError::RateLimited {
                retry_after_secs: Some(7)
            }
        );
        assert_eq!(
            classify_status(429, r#"{"error":{"retry_after":3}}"#, "m"),
            AnsweringError::RateLimited {
                retry_after_secs: Some(3)
            }
        );
        assert_eq!(
            classify_status(429, "slow down", "m"),
            AnsweringError::RateLimited {
                retry_after_secs: None
            }
        );
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(500);
        let t = truncate_body(&long);
        assert!(t.ends_with("..."));
        assert_eq!(t.len(), MAX_ERROR_BODY + 3);
        assert_eq!(truncate_body("short"), "short");
    }
}
