//! Session state machine: the ordered log, the busy flag and the reply helpers.
//!
//! ```text
//! Idle --start--> Active --send--> AwaitingReply --reply/failure--> Active
//! ```
//!
//! The log is append-only in call order. A local message is appended before its
//! round-trip starts and is never withdrawn, even when the round-trip fails.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::components::Choice;
use super::config::ChatConfig;
use super::envelope::MessageEnvelope;
use super::error::{ChatError, ChatResult};
use super::ids::MessageId;
use super::thread::{Thread, ThreadSession};
use super::transport::{ChatTransport, HttpTransport};

/// Lifecycle phase of a session.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum SessionPhase {
    /// No thread established yet.
    #[default]
    Idle,
    /// Thread established, nothing in flight.
    Active,
    /// Exactly one reply is awaited.
    AwaitingReply,
}

/// Read-only view handed to a presentation layer.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    /// Messages in insertion order.
    pub log: Vec<MessageEnvelope>,
    /// Whether a reply is awaited.
    pub busy: bool,
    /// The established thread, if any.
    pub thread: Option<Thread>,
}

#[derive(Default)]
struct SessionState {
    phase: SessionPhase,
    log: Vec<MessageEnvelope>,
    ids: HashSet<MessageId>,
}

impl SessionState {
    /// Append an envelope, re-keying it if its id is already taken.
    fn append(&mut self, mut envelope: MessageEnvelope) -> MessageEnvelope {
        if !self.ids.insert(envelope.id.clone()) {
            let fresh = MessageId::generate();
            warn!(
                duplicate = %envelope.id,
                replacement = %fresh,
                "message id already in log, re-keying"
            );
            envelope.id = fresh;
            self.ids.insert(envelope.id.clone());
        }
        self.log.push(envelope.clone());
        envelope
    }
}

/// Clears the in-flight phase when a round-trip ends, however it ends.
struct InFlight<'a>(&'a Mutex<SessionState>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if state.phase == SessionPhase::AwaitingReply {
            state.phase = SessionPhase::Active;
        }
    }
}

/// One conversation with a remote agent.
pub struct ChatSession {
    threads: ThreadSession,
    config: ChatConfig,
    state: Mutex<SessionState>,
}

impl ChatSession {
    /// Create a session over an arbitrary transport.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(transport: Arc<dyn ChatTransport>, config: ChatConfig) -> ChatResult<Self> {
        config.validate()?;
        Ok(Self {
            threads: ThreadSession::new(transport, &config),
            config,
            state: Mutex::new(SessionState::default()),
        })
    }

    /// Create a session talking HTTP to the configured endpoint.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client cannot be built.
    pub fn connect(config: ChatConfig) -> ChatResult<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::new(Arc::new(transport), config)
    }

    /// Establish the conversation thread.
    ///
    /// The remote's opening message is appended to the log when it has
    /// something to show. Calling again after success is a no-op returning the
    /// same thread.
    ///
    /// # Errors
    /// Returns [`ChatError::Handshake`] on failure; the session stays idle.
    pub async fn start(&self) -> ChatResult<Thread> {
        let handshake = match self.threads.start().await {
            Ok(handshake) => handshake,
            Err(e) => {
                warn!(error = %e, "handshake failed, session stays idle");
                return Err(e);
            }
        };

        {
            let mut state = self.lock();
            if let Some(greeting) = handshake.greeting {
                if greeting.text.trim().is_empty()
                    && greeting.visible_components().next().is_none()
                {
                    debug!("handshake carried no greeting to show");
                } else {
                    state.append(greeting);
                }
            }
            if state.phase == SessionPhase::Idle {
                state.phase = SessionPhase::Active;
            }
        }
        Ok(handshake.thread)
    }

    /// Send free text and wait for the reply.
    ///
    /// The local message is in the log before this future first suspends, and
    /// stays there whatever the outcome.
    ///
    /// # Errors
    /// Returns [`ChatError::EmptyMessage`], [`ChatError::NotStarted`] or
    /// [`ChatError::Busy`] without touching the session, or the transport error
    /// if the round-trip fails.
    pub async fn send_free_text(&self, text: &str) -> ChatResult<MessageEnvelope> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let outgoing = {
            let mut state = self.lock();
            match state.phase {
                SessionPhase::Idle => return Err(ChatError::NotStarted),
                SessionPhase::AwaitingReply => return Err(ChatError::Busy),
                SessionPhase::Active => {}
            }
            let Some(thread) = self.threads.thread() else {
                return Err(ChatError::NotStarted);
            };
            let envelope = self.threads.codec().encode_outgoing(text, thread, None);
            let envelope = state.append(envelope);
            state.phase = SessionPhase::AwaitingReply;
            envelope
        };

        let _in_flight = InFlight(&self.state);
        match self.threads.transmit(&outgoing).await {
            Ok(reply) => {
                let reply = self.lock().append(reply);
                info!(message_id = %outgoing.id, reply_id = %reply.id, "reply received");
                Ok(reply)
            }
            Err(e) => {
                warn!(message_id = %outgoing.id, error = %e, "no reply, keeping local message");
                Err(e)
            }
        }
    }

    /// Answer yes or no in the working language.
    ///
    /// # Errors
    /// Same as [`send_free_text`](Self::send_free_text).
    pub async fn send_binary_reply(&self, is_yes: bool) -> ChatResult<MessageEnvelope> {
        self.send_free_text(self.config.binary_reply(is_yes)).await
    }

    /// Answer a choice prompt.
    ///
    /// Only the label goes over the wire; the id is accepted so callers do not
    /// have to change when the protocol learns reply-by-id.
    ///
    /// # Errors
    /// Same as [`send_free_text`](Self::send_free_text).
    pub async fn send_choice_reply(
        &self,
        choice_id: &str,
        choice_label: &str,
    ) -> ChatResult<MessageEnvelope> {
        debug!(choice_id, "choice reply, sending label only");
        self.send_free_text(choice_label).await
    }

    /// Answer a choice prompt with a decoded [`Choice`].
    ///
    /// # Errors
    /// Same as [`send_free_text`](Self::send_free_text).
    pub async fn send_choice(&self, choice: &Choice) -> ChatResult<MessageEnvelope> {
        self.send_choice_reply(&choice.id, &choice.label).await
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    /// Whether a reply is awaited.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.phase() == SessionPhase::AwaitingReply
    }

    /// Copy of the log in insertion order.
    #[must_use]
    pub fn log(&self) -> Vec<MessageEnvelope> {
        self.lock().log.clone()
    }

    /// The established thread, if any.
    #[must_use]
    pub fn thread(&self) -> Option<Thread> {
        self.threads.thread().cloned()
    }

    /// Everything a presentation layer reads, taken under one lock.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            log: state.log.clone(),
            busy: state.phase == SessionPhase::AwaitingReply,
            thread: self.threads.thread().cloned(),
        }
    }

    /// The session configuration.
    #[must_use]
    pub const fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Tear the conversation down: empty log, no thread, back to idle.
    pub fn reset(&mut self) {
        self.threads.reset();
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        *state = SessionState::default();
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
