//! Scripted transport for exercising sessions without I/O.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::Notify;

use super::error::{ChatError, ChatResult};
use super::transport::{ChatTransport, TransportFuture};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transport that replays queued payloads and records what was sent.
#[derive(Default)]
pub struct ScriptedTransport {
    handshakes: Mutex<VecDeque<ChatResult<Value>>>,
    replies: Mutex<VecDeque<ChatResult<Value>>>,
    bodies: Mutex<Vec<Value>>,
    handshake_calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful handshake payload.
    pub fn with_handshake(self, raw: Value) -> Self {
        lock(&self.handshakes).push_back(Ok(raw));
        self
    }

    /// Queue a failing handshake.
    pub fn with_handshake_error(self, error: ChatError) -> Self {
        lock(&self.handshakes).push_back(Err(error));
        self
    }

    /// Hold every exchange until the returned gate is notified.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn queue_reply(&self, raw: Value) {
        lock(&self.replies).push_back(Ok(raw));
    }

    pub fn queue_error(&self, error: ChatError) {
        lock(&self.replies).push_back(Err(error));
    }

    /// Bodies passed to `exchange`, in call order.
    pub fn recorded_bodies(&self) -> Vec<Value> {
        lock(&self.bodies).clone()
    }

    pub fn handshake_calls(&self) -> usize {
        self.handshake_calls.load(Ordering::SeqCst)
    }
}

impl ChatTransport for ScriptedTransport {
    fn handshake(&self) -> TransportFuture<'_, ChatResult<Value>> {
        Box::pin(async move {
            self.handshake_calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.handshakes)
                .pop_front()
                .unwrap_or_else(|| Err(ChatError::Transport("no handshake scripted".to_string())))
        })
    }

    fn exchange(&self, body: Value) -> TransportFuture<'_, ChatResult<Value>> {
        Box::pin(async move {
            lock(&self.bodies).push(body);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            lock(&self.replies)
                .pop_front()
                .unwrap_or_else(|| Err(ChatError::Transport("no reply scripted".to_string())))
        })
    }
}
