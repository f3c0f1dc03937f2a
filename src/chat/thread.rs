//! Conversation thread identity and the handshake/transmit round-trips.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::config::{ChatConfig, WireFormat};
use super::envelope::{EnvelopeCodec, MessageEnvelope};
use super::error::{ChatError, ChatResult};
use super::ids::ThreadId;
use super::transport::ChatTransport;

/// One conversation, identified by the id the remote assigned at handshake.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Thread {
    id: ThreadId,
}

impl Thread {
    /// Wrap a thread id.
    #[must_use]
    pub const fn new(id: ThreadId) -> Self {
        Self { id }
    }

    /// The thread id.
    #[must_use]
    pub const fn id(&self) -> &ThreadId {
        &self.id
    }
}

/// Outcome of [`ThreadSession::start`].
#[derive(Clone, Debug)]
pub struct Handshake {
    /// The established thread.
    pub thread: Thread,
    /// The opening message, present only on the call that performed the handshake.
    pub greeting: Option<MessageEnvelope>,
}

/// Owns the thread identity and talks to the remote endpoint.
pub struct ThreadSession {
    transport: Arc<dyn ChatTransport>,
    codec: EnvelopeCodec,
    wire_format: WireFormat,
    thread: OnceCell<Thread>,
}

impl ThreadSession {
    /// Create a session that has not yet performed its handshake.
    #[must_use]
    pub fn new(transport: Arc<dyn ChatTransport>, config: &ChatConfig) -> Self {
        Self {
            transport,
            codec: EnvelopeCodec::new(config),
            wire_format: config.wire_format,
            thread: OnceCell::new(),
        }
    }

    /// The codec shared by outgoing and inbound messages.
    #[must_use]
    pub const fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }

    /// The established thread, if the handshake has completed.
    #[must_use]
    pub fn thread(&self) -> Option<&Thread> {
        self.thread.get()
    }

    /// Perform the handshake, at most once successfully.
    ///
    /// Later calls return the established thread without a round-trip. After a
    /// failure the session stays without a thread and a new call retries.
    ///
    /// # Errors
    /// Returns [`ChatError::Handshake`] if the remote cannot be reached or its
    /// answer carries no thread id.
    pub async fn start(&self) -> ChatResult<Handshake> {
        let mut greeting = None;
        let slot = &mut greeting;

        let thread = self
            .thread
            .get_or_try_init(|| async move {
                let raw = self
                    .transport
                    .handshake()
                    .await
                    .map_err(|e| ChatError::Handshake(e.to_string()))?;
                let envelope = self.codec.decode_incoming(raw);
                let id = envelope.thread_id.clone().ok_or_else(|| {
                    ChatError::Handshake("response carried no thread id".to_string())
                })?;

                info!(thread_id = %id, "conversation thread established");
                *slot = Some(envelope);
                Ok::<_, ChatError>(Thread::new(id))
            })
            .await?;

        Ok(Handshake {
            thread: thread.clone(),
            greeting,
        })
    }

    /// Send one envelope and decode the reply.
    ///
    /// # Errors
    /// Returns [`ChatError::NotStarted`] before a successful handshake, or the
    /// transport error if the round-trip fails.
    pub async fn transmit(&self, envelope: &MessageEnvelope) -> ChatResult<MessageEnvelope> {
        if self.thread.get().is_none() {
            return Err(ChatError::NotStarted);
        }

        let body = self.codec.to_wire(envelope, self.wire_format)?;
        debug!(message_id = %envelope.id, wire = ?self.wire_format, "transmitting");
        let raw = self.transport.exchange(body).await?;
        Ok(self.codec.decode_incoming(raw))
    }

    /// Forget the thread so the next [`start`](Self::start) handshakes again.
    pub fn reset(&mut self) {
        self.thread = OnceCell::new();
    }
}
