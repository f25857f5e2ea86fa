//! Google Gemini `generateContent` client: one prompt in, one text reply out.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProviderSettings;
use crate::error::RelayError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Provider client holding the credential. Only constructed in trusted processes.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, RelayError> {
        let model = model.into();
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model
        );
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RelayError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model,
            url,
        })
    }

    /// Build from start-up settings; `MissingCredential` when no key was configured.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, RelayError> {
        let key = settings
            .api_key
            .as_deref()
            .ok_or(RelayError::MissingCredential)?;
        Self::new(key, settings.model.as_str(), &settings.base_url)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `prompt` as the sole content and return the generated text.
    pub async fn generate(&self, prompt: &str) -> Result<String, RelayError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "calling generateContent");
        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(RelayError::Provider(err.error.message));
            }
            return Err(RelayError::Provider(format!("HTTP {status}: {body}")));
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| RelayError::Malformed(e.to_string()))?;
        parsed.into_text()
    }
}

// Gemini API types

#[derive(Debug, Serialize, Deserialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn into_text(self) -> Result<String, RelayError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(match self.prompt_feedback.and_then(|f| f.block_reason) {
                Some(reason) => RelayError::Provider(format!("Prompt blocked: {reason}")),
                None => RelayError::Provider("Model returned no candidates".to_string()),
            });
        };
        let parts: Vec<String> = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if parts.is_empty() {
            let reason = candidate.finish_reason.as_deref().unwrap_or("unspecified");
            return Err(RelayError::Provider(format!(
                "Model returned no text (finish reason: {reason})"
            )));
        }
        Ok(parts.concat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<String, RelayError> {
        serde_json::from_str::<GenerateContentResponse>(body)
            .unwrap()
            .into_text()
    }

    #[test]
    fn request_body_matches_provider_schema() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part {
                    text: Some("ping".into()),
                }],
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "contents": [{ "parts": [{ "text": "ping" }] }] })
        );
    }

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let body = r#"{"candidates":[
            {"content":{"role":"model","parts":[{"text":"Hello, "},{"text":"world"}]},"finishReason":"STOP"},
            {"content":{"role":"model","parts":[{"text":"ignored"}]}}
        ]}"#;
        assert_eq!(parse(body).unwrap(), "Hello, world");
    }

    #[test]
    fn blocked_prompt_reports_reason() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert_eq!(
            parse(body).unwrap_err(),
            RelayError::Provider("Prompt blocked: SAFETY".into())
        );
    }

    #[test]
    fn candidate_without_text_is_an_error() {
        let body = r#"{"candidates":[{"finishReason":"SAFETY","safetyRatings":[]}]}"#;
        assert_eq!(
            parse(body).unwrap_err(),
            RelayError::Provider("Model returned no text (finish reason: SAFETY)".into())
        );

        let body = r#"{"candidates":[{"content":{"role":"model","parts":[]}}]}"#;
        assert_eq!(
            parse(body).unwrap_err(),
            RelayError::Provider("Model returned no text (finish reason: unspecified)".into())
        );
    }

    #[test]
    fn missing_credential_refuses_to_build() {
        let settings = ProviderSettings {
            api_key: None,
            model: "gemini-2.5-flash".into(),
            base_url: "http://localhost".into(),
        };
        assert_eq!(
            GeminiClient::from_settings(&settings).err(),
            Some(RelayError::MissingCredential)
        );
    }
}
