//! Chat proxy client (Ollama-style internal endpoint).
//!
//! Retrieval never depends on this module; it exists so the HTTP surface
//! can compose an answer from retrieved context when a deployment has a
//! chat model available.
//!
//! Upstream deployments disagree on response shape, so text extraction is
//! an ordered list of strategies — each a pure `response -> Option<text>`
//! probe — tried in priority order; first success wins, else empty string.

use serde_json::Value;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::PipelineError;

pub struct LlmClient {
    config: LlmConfig,
    client: reqwest::Client,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, PipelineError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PipelineError::connection)?;
        Ok(LlmClient {
            config,
            client,
            timeout,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Single-turn chat call. Returns the upstream response JSON verbatim;
    /// use [`extract_response_text`] to pull the text out.
    pub async fn chat(&self, prompt: &str, model: Option<&str>) -> Result<Value, PipelineError> {
        if !self.config.enabled {
            return Err(PipelineError::Connection(
                "chat proxy is disabled by configuration".to_string(),
            ));
        }

        let payload = serde_json::json!({
            "model": model.unwrap_or(&self.config.default_model),
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        });

        let url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.chat_path
        );

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    PipelineError::Timeout(self.timeout)
                } else {
                    PipelineError::connection(err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Connection(format!(
                "chat proxy returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|err| PipelineError::MalformedResponse(err.to_string()))
    }
}

// ============ Response-text extraction ============

type ExtractFn = fn(&Value) -> Option<String>;

/// Strategies in priority order; first `Some` wins.
const EXTRACTORS: [ExtractFn; 3] = [from_message, from_last_of_messages, from_response_field];

/// Pull the assistant text out of an upstream chat response, whatever its
/// shape. Returns an empty string when no strategy matches.
pub fn extract_response_text(response: &Value) -> String {
    EXTRACTORS
        .iter()
        .find_map(|extract| extract(response))
        .unwrap_or_default()
}

/// `{"message": {"content": "..."}}`
fn from_message(response: &Value) -> Option<String> {
    response
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

/// `{"messages": [..., {"content": "..."}]}`
fn from_last_of_messages(response: &Value) -> Option<String> {
    response
        .get("messages")?
        .as_array()?
        .last()?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

/// `{"response": "..."}`
fn from_response_field(response: &Value) -> Option<String> {
    response.get("response")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_content_wins_over_other_shapes() {
        let response = json!({
            "message": {"content": "primary"},
            "messages": [{"content": "secondary"}],
            "response": "tertiary",
        });
        assert_eq!(extract_response_text(&response), "primary");
    }

    #[test]
    fn falls_through_to_last_of_messages() {
        let response = json!({
            "messages": [{"content": "first"}, {"content": "last"}],
            "response": "tertiary",
        });
        assert_eq!(extract_response_text(&response), "last");
    }

    #[test]
    fn falls_through_to_response_field() {
        let response = json!({"response": "plain"});
        assert_eq!(extract_response_text(&response), "plain");
    }

    #[test]
    fn unknown_shapes_yield_empty_string() {
        assert_eq!(extract_response_text(&json!({"data": 42})), "");
        assert_eq!(extract_response_text(&json!({"message": {"content": 7}})), "");
        assert_eq!(extract_response_text(&json!({"messages": []})), "");
    }

    #[tokio::test]
    async fn disabled_proxy_refuses_without_network() {
        let client = LlmClient::new(LlmConfig::default()).unwrap();
        assert!(!client.is_enabled());
        let err = client.chat("hello", None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Connection(_)));
    }
}
