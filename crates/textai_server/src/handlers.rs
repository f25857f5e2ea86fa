//! `POST /api/generate`: relays one prompt to the model provider.
//! The axum handlers delegate to the testable [`do_generate`].

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use textai_client::messages::{GenerateReply, GenerateRequest};
use textai_client::{GeminiClient, ProviderSettings, RelayError};
use tracing::error;

/// Shared handler state. The provider client exists only when a credential
/// was configured at start-up.
pub struct AppState {
    upstream: Option<GeminiClient>,
}

impl AppState {
    pub fn new(settings: &ProviderSettings) -> Result<Self, RelayError> {
        let upstream = match GeminiClient::from_settings(settings) {
            Ok(client) => Some(client),
            Err(RelayError::MissingCredential) => None,
            Err(e) => return Err(e),
        };
        Ok(Self { upstream })
    }

    pub fn has_credential(&self) -> bool {
        self.upstream.is_some()
    }
}

/// Failures of the intermediary, each with its status code.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("API_KEY environment variable not set on the server.")]
    MissingCredential,
    #[error("Prompt is required")]
    MissingPrompt,
    #[error("Server error: {0}")]
    Server(String),
    /// The body could not be buffered (too large, aborted).
    #[error("{message}")]
    Body { status: StatusCode, message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::MissingPrompt => StatusCode::BAD_REQUEST,
            ApiError::MissingCredential | ApiError::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Body { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(GenerateReply::error(self.to_string()));
        (self.status(), body).into_response()
    }
}

// ── Testable backend function ───────────────────────────────────────────

/// Handle one raw request body. The credential is checked before the body
/// is read.
pub async fn do_generate(state: &AppState, body: &[u8]) -> Result<GenerateReply, ApiError> {
    let upstream = state.upstream.as_ref().ok_or(ApiError::MissingCredential)?;

    let request: GenerateRequest = serde_json::from_slice(body).map_err(|e| {
        error!(error = %e, "unreadable request body");
        ApiError::Server(e.to_string())
    })?;
    let prompt = request.prompt().ok_or(ApiError::MissingPrompt)?;

    let text = upstream.generate(prompt).await.map_err(|e| {
        error!(model = upstream.model(), error = %e, "API error");
        ApiError::Server(e.to_string())
    })?;
    Ok(GenerateReply::text(text))
}

// ── axum wrappers ───────────────────────────────────────────────────────

pub async fn generate(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<GenerateReply>, ApiError> {
    if !state.has_credential() {
        return Err(ApiError::MissingCredential);
    }
    let body = body.map_err(|rejection| {
        error!(status = %rejection.status(), error = %rejection, "request body rejected");
        ApiError::Body {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    })?;
    do_generate(&state, &body).await.map(Json)
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_credential() -> AppState {
        AppState::new(&ProviderSettings {
            api_key: None,
            model: "gemini-2.5-flash".into(),
            base_url: "http://127.0.0.1:9".into(),
        })
        .unwrap()
    }

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ApiError::MissingPrompt.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::MissingCredential.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Server("x".into()).to_string(),
            "Server error: x"
        );
        let too_large = ApiError::Body {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "length limit exceeded".into(),
        };
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(too_large.to_string(), "length limit exceeded");
    }

    #[tokio::test]
    async fn credential_is_checked_before_body() {
        let state = no_credential();
        assert!(!state.has_credential());
        assert_eq!(
            do_generate(&state, b"not even json").await,
            Err(ApiError::MissingCredential)
        );
    }
}
