//! Transcript state and the controller that feeds it through a [`QueryRelay`].
//!
//! The controller is a two-state machine: `Idle` accepts a submission,
//! `AwaitingResponse` rejects every submission until the outstanding relay
//! call completes. Each accepted submission appends exactly one user message
//! before the call and exactly one model message after it.

use std::fmt;

use crate::error::{render_reply, RelayError};
use crate::relay::QueryRelay;

pub const BANNER_ID: &str = "init";
pub const BANNER_TEXT: &str = "System Initialized. Awaiting input.";
/// Indicator rendered while a relay call is in flight.
pub const PROCESSING_TEXT: &str = "# processing...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
    System,
}

impl Role {
    /// Transcript line prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            Role::User => "> ",
            Role::Model => "# ",
            Role::System => "// ",
        }
    }
}

/// One transcript entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: String,
    role: Role,
    text: String,
}

impl Message {
    fn new(role: Role, text: impl Into<String>) -> Self {
        let tag = match role {
            Role::User => "user",
            Role::Model => "model",
            Role::System => "system",
        };
        Self {
            id: format!("{tag}-{}", uuid::Uuid::new_v4()),
            role,
            text: text.into(),
        }
    }

    /// The fixed start-up entry.
    pub fn banner() -> Self {
        Self {
            id: BANNER_ID.to_string(),
            role: Role::System,
            text: BANNER_TEXT.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.role.prefix(), self.text)
    }
}

/// Ordered, append-only list of messages.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    AwaitingResponse,
}

/// Token for an accepted submission. Consumed by [`TranscriptController::complete`],
/// so a call can only be completed once.
#[derive(Debug)]
pub struct PendingQuery {
    prompt: String,
}

impl PendingQuery {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// Result of trying to start a submission.
#[derive(Debug)]
pub enum Submission {
    /// Blank prompt; nothing appended, relay not called.
    Empty,
    /// A call is already in flight; nothing appended, relay not called.
    Busy,
    Accepted(PendingQuery),
}

/// Result of a full submit cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Empty,
    Busy,
    /// Model message appended with the reply text.
    Answered,
    /// Model message appended with the rendered error.
    Failed(RelayError),
}

impl SubmitOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SubmitOutcome::Failed(_))
    }
}

pub struct TranscriptController {
    relay: Box<dyn QueryRelay>,
    transcript: Transcript,
    state: ControllerState,
    draft: String,
}

impl TranscriptController {
    /// New controller with the system banner as its first entry.
    pub fn new(relay: Box<dyn QueryRelay>) -> Self {
        let mut transcript = Transcript::default();
        transcript.push(Message::banner());
        Self {
            relay,
            transcript,
            state: ControllerState::Idle,
            draft: String::new(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == ControllerState::AwaitingResponse
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Start a submission: validate, append the user message, clear the
    /// draft and enter `AwaitingResponse`.
    pub fn begin(&mut self, prompt: &str) -> Submission {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Submission::Empty;
        }
        if self.is_in_flight() {
            return Submission::Busy;
        }
        self.transcript.push(Message::new(Role::User, prompt));
        self.draft.clear();
        self.state = ControllerState::AwaitingResponse;
        Submission::Accepted(PendingQuery {
            prompt: prompt.to_string(),
        })
    }

    /// Issue the relay call for an accepted submission.
    pub async fn dispatch(&self, pending: &PendingQuery) -> Result<String, RelayError> {
        self.relay.query(&pending.prompt).await
    }

    /// Finish a submission: append the model message and return to `Idle`.
    pub fn complete(
        &mut self,
        pending: PendingQuery,
        result: Result<String, RelayError>,
    ) -> SubmitOutcome {
        drop(pending);
        self.transcript
            .push(Message::new(Role::Model, render_reply(&result)));
        self.state = ControllerState::Idle;
        match result {
            Ok(_) => SubmitOutcome::Answered,
            Err(e) => SubmitOutcome::Failed(e),
        }
    }

    /// Run a whole submission to completion.
    pub async fn submit(&mut self, prompt: &str) -> SubmitOutcome {
        let pending = match self.begin(prompt) {
            Submission::Accepted(pending) => pending,
            Submission::Empty => return SubmitOutcome::Empty,
            Submission::Busy => return SubmitOutcome::Busy,
        };
        let result = self.dispatch(&pending).await;
        self.complete(pending, result)
    }

    /// Submit whatever is in the draft input.
    pub async fn submit_draft(&mut self) -> SubmitOutcome {
        let draft = self.draft.clone();
        self.submit(&draft).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl QueryRelay for Echo {
        async fn query(&self, prompt: &str) -> Result<String, RelayError> {
            Ok(format!("echo: {prompt}"))
        }
    }

    #[test]
    fn starts_with_banner() {
        let controller = TranscriptController::new(Box::new(Echo));
        let messages = controller.transcript().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id(), "init");
        assert_eq!(messages[0].role(), Role::System);
        assert_eq!(messages[0].to_string(), "// System Initialized. Awaiting input.");
    }

    #[test]
    fn message_ids_are_unique_and_tagged() {
        let a = Message::new(Role::User, "x");
        let b = Message::new(Role::User, "x");
        assert_ne!(a.id(), b.id());
        assert!(a.id().starts_with("user-"));
        assert!(Message::new(Role::Model, "y").id().starts_with("model-"));
    }

    #[test]
    fn rejected_submission_keeps_draft() {
        let mut controller = TranscriptController::new(Box::new(Echo));
        controller.set_draft("   ");
        assert!(matches!(controller.begin("   "), Submission::Empty));
        assert_eq!(controller.draft(), "   ");
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn draft_is_cleared_on_accept() {
        let mut controller = TranscriptController::new(Box::new(Echo));
        controller.set_draft("  hi  ");
        let outcome = controller.submit_draft().await;
        assert_eq!(outcome, SubmitOutcome::Answered);
        assert_eq!(controller.draft(), "");
        let texts: Vec<String> = controller
            .transcript()
            .messages()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(texts, ["// System Initialized. Awaiting input.", "> hi", "# echo: hi"]);
    }
}
