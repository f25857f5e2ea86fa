//! Query relay: sends one prompt upstream and returns the model's text.
//!
//! Two deployments of the same contract:
//! - [`DirectRelay`] calls the provider with a credential held by this process.
//! - [`ProxiedRelay`] posts to the intermediary, which holds the credential.
//!
//! A process picks exactly one via [`build_relay`].
//!
//! Neither relay retries or cancels. Both HTTP clients carry a transport
//! timeout (120 s to the provider, 180 s to the intermediary) so a dead
//! connection still ends as an error reply instead of an endless wait.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::config::{Config, ProviderSettings, RelayMode};
use crate::error::{render_reply, RelayError};
use crate::gemini::GeminiClient;
use crate::messages::{GenerateReply, GenerateRequest};

const PROXY_TIMEOUT: Duration = Duration::from_secs(180);

/// Sends a prompt upstream and returns the generated text.
#[async_trait]
pub trait QueryRelay: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<String, RelayError>;
}

/// Run one query and fold the outcome into displayable text. Never fails.
pub async fn run_query(relay: &dyn QueryRelay, prompt: &str) -> String {
    let result = relay.query(prompt).await;
    render_reply(&result)
}

/// Calls the provider directly. Only safe inside a trusted process.
pub struct DirectRelay {
    client: Result<GeminiClient, RelayError>,
}

impl DirectRelay {
    pub fn new(settings: &ProviderSettings) -> Self {
        Self {
            client: GeminiClient::from_settings(settings),
        }
    }

    pub fn from_client(client: GeminiClient) -> Self {
        Self { client: Ok(client) }
    }
}

#[async_trait]
impl QueryRelay for DirectRelay {
    async fn query(&self, prompt: &str) -> Result<String, RelayError> {
        let client = self.client.as_ref().map_err(|e| e.clone())?;
        client.generate(prompt).await.inspect_err(|e| {
            error!(error = %e, "Gemini API error");
        })
    }
}

/// Posts `{ prompt }` to the intermediary and reads back `{ text }` or `{ error }`.
pub struct ProxiedRelay {
    client: reqwest::Client,
    endpoint: String,
}

impl ProxiedRelay {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(PROXY_TIMEOUT)
            .build()
            .map_err(|e| RelayError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn post(&self, prompt: &str) -> Result<String, RelayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest::new(prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Transport(format!("Failed to read response: {e}")))?;
        let reply = serde_json::from_str::<GenerateReply>(&body);

        if !status.is_success() {
            return Err(match reply {
                Ok(GenerateReply {
                    error: Some(message),
                    ..
                }) => RelayError::Upstream {
                    status: status.as_u16(),
                    message,
                },
                _ => RelayError::Status(status.as_u16()),
            });
        }

        match reply {
            Ok(GenerateReply {
                text: Some(text), ..
            }) => Ok(text),
            Ok(GenerateReply {
                error: Some(message),
                ..
            }) => Err(RelayError::Upstream {
                status: status.as_u16(),
                message,
            }),
            Ok(_) => Err(RelayError::Malformed("missing `text` field".to_string())),
            Err(e) => Err(RelayError::Malformed(e.to_string())),
        }
    }
}

#[async_trait]
impl QueryRelay for ProxiedRelay {
    async fn query(&self, prompt: &str) -> Result<String, RelayError> {
        self.post(prompt).await.inspect_err(|e| {
            error!(endpoint = %self.endpoint, error = %e, "relay request failed");
        })
    }
}

/// Build the single relay this process runs.
pub fn build_relay(
    mode: RelayMode,
    config: &Config,
    settings: &ProviderSettings,
) -> Result<Box<dyn QueryRelay>, RelayError> {
    match mode {
        RelayMode::Direct => {
            if !settings.has_credential() {
                warn!("direct mode without API_KEY; every query will report the missing credential");
            }
            Ok(Box::new(DirectRelay::new(settings)))
        }
        RelayMode::Proxied => Ok(Box::new(ProxiedRelay::new(config.relay_endpoint())?)),
    }
}
