//! Shared text-AI client library (config, query relay, transcript controller).
//! Used by the `textai` terminal and the `textai-server` intermediary.

pub mod config;
pub mod error;
pub mod gemini;
pub mod messages;
pub mod relay;
pub mod transcript;

pub use config::{default_config_path, Config, ConfigError, ProviderSettings, RelayMode};
pub use error::{render_reply, RelayError};
pub use gemini::GeminiClient;
pub use relay::{build_relay, run_query, DirectRelay, ProxiedRelay, QueryRelay};
pub use transcript::{
    ControllerState, Message, Role, SubmitOutcome, Submission, Transcript, TranscriptController,
};
