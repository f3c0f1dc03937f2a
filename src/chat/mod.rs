//! Client-side conversation with a remote agent.
//!
//! - `envelope`: message envelopes and the wire codec
//! - `components`: structured attachments (questions, choices, reservations)
//! - `thread`: thread identity, handshake and transmit
//! - `session`: the ordered log, busy state and reply helpers
//! - `transport`: the transport seam and its HTTP implementation
//! - `render`: terminal rendering of log entries

pub mod components;
pub mod config;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod render;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;
pub mod thread;
pub mod transport;

pub use components::{Choice, Reservation, StructuredComponent};
pub use config::{ChatConfig, WireFormat};
pub use envelope::{EnvelopeCodec, MessageEnvelope, Participant};
pub use error::{ChatError, ChatErrorKind, ChatResult};
pub use ids::{MessageId, ThreadId};
pub use session::{ChatSession, SessionPhase, SessionSnapshot};
pub use thread::{Handshake, Thread, ThreadSession};
pub use transport::{ChatTransport, HttpTransport, TransportFuture};
