//! Message envelope model and its wire codec.
//!
//! Outgoing envelopes are built locally with a fresh id. Inbound payloads are
//! normalized defensively: the remote endpoint's shape is not fixed, so every
//! field has a fallback and decoding never fails.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::components::{StructuredComponent, decode_components};
use super::config::{ChatConfig, WireFormat};
use super::ids::{MessageId, ThreadId};
use super::thread::Thread;

/// Role of a conversation participant.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Participant {
    /// The user driving this session.
    Local,
    /// The remote conversational agent.
    Remote,
}

impl Participant {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }

    /// The other participant.
    #[must_use]
    pub const fn counterpart(self) -> Self {
        match self {
            Self::Local => Self::Remote,
            Self::Remote => Self::Local,
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical record exchanged between participants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Unique message identifier.
    pub id: MessageId,
    /// Thread the message belongs to, when known.
    pub thread_id: Option<ThreadId>,
    /// Author role.
    pub sender: Participant,
    /// Addressee role.
    pub receiver: Participant,
    /// Creation time as reported by the author.
    pub timestamp: DateTime<Utc>,
    /// Displayable body.
    pub text: String,
    /// Structured attachments in display order.
    pub components: Vec<StructuredComponent>,
    /// Opaque auxiliary data, passed through untouched.
    pub extensions: Map<String, Value>,
}

impl MessageEnvelope {
    /// Whether the local participant wrote this message.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.sender == Participant::Local
    }

    /// Components that have something to render.
    pub fn visible_components(&self) -> impl Iterator<Item = &StructuredComponent> {
        self.components.iter().filter(|c| c.is_visible())
    }

    /// Look up an extension entry.
    #[must_use]
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }
}

/// Borrowed wire form of an envelope.
#[derive(Serialize)]
struct WireEnvelope<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<&'a str>,
    timestamp: String,
    sender: &'a str,
    receiver: &'a str,
    text: &'a str,
    components: &'a [StructuredComponent],
    extensions: &'a Map<String, Value>,
}

/// Translates between envelopes and their JSON wire form.
#[derive(Clone, Debug)]
pub struct EnvelopeCodec {
    local_address: String,
    remote_address: String,
    language: String,
}

impl EnvelopeCodec {
    /// Create a codec from the session configuration.
    #[must_use]
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            local_address: config.local_address.clone(),
            remote_address: config.remote_address.clone(),
            language: config.language(),
        }
    }

    /// Build an outgoing envelope from the local participant.
    #[must_use]
    pub fn encode_outgoing(
        &self,
        text: impl Into<String>,
        thread: &Thread,
        extensions: Option<Map<String, Value>>,
    ) -> MessageEnvelope {
        MessageEnvelope {
            id: MessageId::generate(),
            thread_id: Some(thread.id().clone()),
            sender: Participant::Local,
            receiver: Participant::Remote,
            timestamp: Utc::now(),
            text: text.into(),
            components: Vec::new(),
            extensions: extensions.unwrap_or_default(),
        }
    }

    /// Serialize an envelope into the request body for `format`.
    ///
    /// # Errors
    /// Returns an error if the envelope cannot be serialized.
    pub fn to_wire(
        &self,
        envelope: &MessageEnvelope,
        format: WireFormat,
    ) -> Result<Value, serde_json::Error> {
        match format {
            WireFormat::Minimal => Ok(json!({ "content": envelope.text })),
            WireFormat::Envelope => serde_json::to_value(WireEnvelope {
                id: envelope.id.as_str(),
                thread_id: envelope.thread_id.as_ref().map(ThreadId::as_str),
                timestamp: envelope
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                sender: self.address(envelope.sender),
                receiver: self.address(envelope.receiver),
                text: &envelope.text,
                components: &envelope.components,
                extensions: &envelope.extensions,
            }),
        }
    }

    /// Decode an inbound payload of any shape into an envelope.
    #[must_use]
    pub fn decode_incoming(&self, raw: Value) -> MessageEnvelope {
        let mut map = match unwrap_response(raw) {
            Value::Object(map) => map,
            other => {
                debug!("inbound payload is not an object, using it as the message text");
                return MessageEnvelope {
                    id: MessageId::generate(),
                    thread_id: None,
                    sender: Participant::Remote,
                    receiver: Participant::Local,
                    timestamp: Utc::now(),
                    text: flatten_text(&other),
                    components: Vec::new(),
                    extensions: Map::new(),
                };
            }
        };

        let id = match map.get("id") {
            Some(Value::String(id)) if !id.is_empty() => MessageId::new(id.as_str()),
            Some(Value::Number(n)) => MessageId::new(n.to_string()),
            _ => {
                debug!("inbound message has no usable id, generating one");
                MessageId::generate()
            }
        };

        let thread_id = map
            .get("thread_id")
            .or_else(|| map.get("threadId"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(ThreadId::new);

        let sender = match (
            map.get("sender").and_then(Value::as_str),
            map.get("receiver").and_then(Value::as_str),
        ) {
            (Some(sender), _) => self.participant(sender),
            (None, Some(receiver)) => self.participant(receiver).counterpart(),
            (None, None) => Participant::Remote,
        };
        let receiver = sender.counterpart();

        let timestamp = map
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        let text = match map.get("text") {
            Some(Value::Null) | None => map.get("content").map(flatten_text).unwrap_or_default(),
            Some(text) => flatten_text(text),
        };

        let components = match map.get("components") {
            Some(Value::Array(raw)) => decode_components(raw, &self.language),
            _ => Vec::new(),
        };

        let extensions = match map.remove("extensions") {
            Some(Value::Object(ext)) => ext,
            _ => Map::new(),
        };

        MessageEnvelope {
            id,
            thread_id,
            sender,
            receiver,
            timestamp,
            text,
            components,
            extensions,
        }
    }

    fn address(&self, participant: Participant) -> &str {
        match participant {
            Participant::Local => &self.local_address,
            Participant::Remote => &self.remote_address,
        }
    }

    fn participant(&self, address: &str) -> Participant {
        if address == self.local_address || address == Participant::Local.as_str() {
            Participant::Local
        } else {
            Participant::Remote
        }
    }
}

/// Peel `{"response": ...}` wrappers off a payload.
fn unwrap_response(raw: Value) -> Value {
    let mut current = raw;
    loop {
        match current {
            Value::Object(mut map) if !map.contains_key("text") && map.contains_key("response") => {
                current = map.remove("response").unwrap_or(Value::Null);
            }
            other => return other,
        }
    }
}

/// Reduce any JSON value to printable text.
///
/// Strings are kept, a nested string `text` field is preferred for objects,
/// and anything else is rendered as JSON. `null` becomes the empty string.
#[must_use]
pub fn flatten_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Object(map) => match map.get("text") {
            Some(Value::String(text)) => text.clone(),
            _ => value.to_string(),
        },
        other => other.to_string(),
    }
}

/// Parse a wire timestamp.
///
/// Accepts RFC 3339, naive ISO 8601 date-times (taken as UTC) and plain
/// `YYYY-MM-DD` dates (midnight UTC).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
