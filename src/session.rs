use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::TransportError;
use crate::events::{ConversationMessage, SessionState};
use crate::transport::{SolveResult, SolveTransport};

/// Why a submission was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyInput,
    AwaitingResponse,
}

/// Result of asking the session to send a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Rejected(RejectReason),
}

/// Parameters attached to every solve request. Fixed for the session.
#[derive(Debug, Clone)]
pub struct RequestSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub base_url: String,
    pub reset_on_start: bool,
}

impl RequestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tokens: config.transport.max_tokens(),
            temperature: config.transport.default_temperature,
            base_url: config.transport.base_url.clone(),
            reset_on_start: config.transport.resets_on_start(),
        }
    }
}

type Completion = Result<SolveResult, TransportError>;

/// One conversation with the solver backend.
///
/// Owns the message list and the in-flight flag; the UI only reads them and
/// calls `submit`/`reset`. At most one request is outstanding at a time.
pub struct ChatSession {
    state: SessionState,
    transport: Arc<dyn SolveTransport>,
    settings: RequestSettings,
    new_chat_greeting: String,
    pending: Option<oneshot::Receiver<Completion>>,
}

impl ChatSession {
    pub fn new(
        transport: Arc<dyn SolveTransport>,
        settings: RequestSettings,
        greeting: &str,
        new_chat_greeting: impl Into<String>,
    ) -> Self {
        Self {
            state: SessionState::seeded(greeting),
            transport,
            settings,
            new_chat_greeting: new_chat_greeting.into(),
            pending: None,
        }
    }

    pub fn from_config(config: &Config, transport: Arc<dyn SolveTransport>) -> Self {
        Self::new(
            transport,
            RequestSettings::from_config(config),
            &config.greeting,
            config.new_chat_greeting.clone(),
        )
    }

    /// Best-effort "clear remote memory" call for backends that keep state.
    ///
    /// Runs in the background; errors are logged and never reach the
    /// conversation. Returns `None` when the backend is not configured for it.
    pub fn start_remote_reset(&self) -> Option<JoinHandle<()>> {
        if !self.settings.reset_on_start {
            return None;
        }

        let transport = Arc::clone(&self.transport);
        Some(tokio::spawn(async move {
            match transport.reset_remote_state().await {
                Ok(()) => tracing::info!("remote conversation memory cleared"),
                Err(e) => tracing::warn!(error = %e, "failed to clear remote conversation memory"),
            }
        }))
    }

    pub fn settings(&self) -> &RequestSettings {
        &self.settings
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.state.messages
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.state.is_awaiting_response
    }

    pub fn pending_input(&self) -> &str {
        &self.state.pending_input
    }

    pub fn set_pending_input(&mut self, text: impl Into<String>) {
        self.state.pending_input = text.into();
    }

    /// Whether the send affordance should be enabled
    pub fn can_send(&self) -> bool {
        !self.state.pending_input.trim().is_empty() && !self.state.is_awaiting_response
    }

    pub fn submit_pending(&mut self) -> SubmitOutcome {
        let text = self.state.pending_input.clone();
        self.submit(text)
    }

    /// Send one user turn.
    ///
    /// The user message is appended before this returns; the reply is
    /// appended once `poll_completion` or `settle` observes the result.
    pub fn submit(&mut self, text: impl Into<String>) -> SubmitOutcome {
        let text = text.into();

        if text.trim().is_empty() {
            return SubmitOutcome::Rejected(RejectReason::EmptyInput);
        }
        if self.state.is_awaiting_response {
            tracing::debug!("submission rejected, request already in flight");
            return SubmitOutcome::Rejected(RejectReason::AwaitingResponse);
        }

        self.state.messages.push(ConversationMessage::user(text.clone()));
        self.state.pending_input.clear();
        self.state.is_awaiting_response = true;

        let (tx, rx) = oneshot::channel();
        let transport = Arc::clone(&self.transport);
        let max_tokens = self.settings.max_tokens;
        let temperature = self.settings.temperature;

        tokio::spawn(async move {
            let result = transport.solve(&text, max_tokens, temperature).await;
            // Receiver is gone after a reset; the reply is discarded.
            let _ = tx.send(result);
        });

        self.pending = Some(rx);
        SubmitOutcome::Accepted
    }

    /// Apply a settled request, if any, without blocking.
    ///
    /// Returns true when the conversation changed.
    pub fn poll_completion(&mut self) -> bool {
        let Some(rx) = self.pending.as_mut() else {
            return false;
        };

        match rx.try_recv() {
            Ok(result) => {
                self.pending = None;
                self.apply_completion(result);
                true
            }
            Err(oneshot::error::TryRecvError::Empty) => false,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.pending = None;
                self.apply_completion(Err(TransportError::Network(
                    "request task ended without a response".to_string(),
                )));
                true
            }
        }
    }

    /// Wait for the in-flight request, if any, and apply it.
    pub async fn settle(&mut self) {
        let Some(rx) = self.pending.take() else {
            return;
        };

        let result = rx.await.unwrap_or_else(|_| {
            Err(TransportError::Network(
                "request task ended without a response".to_string(),
            ))
        });
        self.apply_completion(result);
    }

    /// Start a new chat.
    ///
    /// Any request still in flight keeps running but its reply is dropped
    /// when it arrives, so the user may submit again right away.
    pub fn reset(&mut self) {
        if self.pending.take().is_some() {
            tracing::debug!("reset while awaiting a response; the reply will be discarded");
        }
        self.state = SessionState::seeded(&self.new_chat_greeting);
    }

    fn apply_completion(&mut self, result: Completion) {
        let content = match result {
            Ok(reply) => reply.into_content(),
            Err(e) => {
                tracing::error!(error = %e, base_url = %self.settings.base_url, "solve request failed");
                self.error_message(&e)
            }
        };

        self.state.messages.push(ConversationMessage::assistant(content));
        self.state.is_awaiting_response = false;
    }

    fn error_message(&self, error: &TransportError) -> String {
        format!(
            "Error: Could not connect to the server. Please ensure the solver backend is running at {}.\n\nDetails: {}",
            self.settings.base_url, error
        )
    }
}
