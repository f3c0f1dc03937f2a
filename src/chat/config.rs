//! Configuration for the chat session layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::{ChatError, ChatResult};

/// Environment variable for the remote endpoint base URL.
const URL_ENV: &str = "COLLOQUY_URL";
/// Environment variable for the handshake path.
const START_PATH_ENV: &str = "COLLOQUY_START_PATH";
/// Environment variable for the message exchange path.
const MESSAGE_PATH_ENV: &str = "COLLOQUY_MESSAGE_PATH";
/// Environment variable for the working language.
const LOCALE_ENV: &str = "COLLOQUY_LOCALE";
/// Environment variable for the outgoing wire format.
const WIRE_ENV: &str = "COLLOQUY_WIRE";
/// Environment variable for the request timeout, in seconds.
const TIMEOUT_ENV: &str = "COLLOQUY_TIMEOUT_SECS";

/// Shape of the outgoing message body.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// The full message envelope.
    #[default]
    Envelope,
    /// A bare `{"content": text}` object.
    Minimal,
}

impl WireFormat {
    /// Parse a wire format name (`envelope` or `minimal`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "envelope" => Some(Self::Envelope),
            "minimal" => Some(Self::Minimal),
            _ => None,
        }
    }
}

/// Configuration for a chat session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the remote endpoint.
    pub base_url: String,
    /// Path of the handshake endpoint.
    pub start_path: String,
    /// Path of the message exchange endpoint.
    pub message_path: String,
    /// Request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Outgoing body shape.
    pub wire_format: WireFormat,
    /// Working language; also the primary key for localized choice labels.
    pub locale: String,
    /// Wire address of the local participant.
    pub local_address: String,
    /// Wire address of the remote agent.
    pub remote_address: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            start_path: "/api/start".to_string(),
            message_path: "/api/message".to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            wire_format: WireFormat::Envelope,
            locale: "fr".to_string(),
            local_address: "frontend@localhost".to_string(),
            remote_address: "bot@localhost".to_string(),
        }
    }
}

impl ChatConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from defaults overlaid with `COLLOQUY_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable is set to an unusable value.
    pub fn from_env() -> ChatResult<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(URL_ENV) {
            config.base_url = url;
        }
        if let Ok(path) = std::env::var(START_PATH_ENV) {
            config.start_path = path;
        }
        if let Ok(path) = std::env::var(MESSAGE_PATH_ENV) {
            config.message_path = path;
        }
        if let Ok(locale) = std::env::var(LOCALE_ENV) {
            config.locale = locale;
        }
        if let Ok(wire) = std::env::var(WIRE_ENV) {
            config.wire_format = WireFormat::parse(&wire)
                .ok_or_else(|| ChatError::Config(format!("{WIRE_ENV}: unknown format {wire:?}")))?;
        }
        if let Ok(secs) = std::env::var(TIMEOUT_ENV) {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| ChatError::Config(format!("{TIMEOUT_ENV}: not a number: {secs:?}")))?;
            config.request_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the remote endpoint base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the outgoing wire format.
    #[must_use]
    pub const fn with_wire_format(mut self, wire_format: WireFormat) -> Self {
        self.wire_format = wire_format;
        self
    }

    /// Set the working language.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        self.endpoint_url(&self.start_path)?;
        self.endpoint_url(&self.message_path)?;

        if self.request_timeout.is_zero() {
            return Err(ChatError::Config(
                "request_timeout must be > 0".to_string(),
            ));
        }

        if self.locale.trim().is_empty() {
            return Err(ChatError::Config("locale must not be empty".to_string()));
        }

        if self.local_address == self.remote_address {
            return Err(ChatError::Config(
                "local_address and remote_address must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve an endpoint path against the base URL.
    ///
    /// # Errors
    /// Returns an error if the base URL or the path cannot be parsed.
    pub fn endpoint_url(&self, path: &str) -> ChatResult<Url> {
        let base = Url::parse(&self.base_url)?;
        Ok(base.join(path)?)
    }

    /// Primary language subtag of the locale: `fr-FR` and `fr_CA` give `fr`.
    #[must_use]
    pub fn language(&self) -> String {
        self.locale
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// Canonical reply text for a yes/no answer in the working language.
    #[must_use]
    pub fn binary_reply(&self, is_yes: bool) -> &'static str {
        let french = self.language() == "fr";
        match (french, is_yes) {
            (true, true) => "oui",
            (true, false) => "non",
            (false, true) => "yes",
            (false, false) => "no",
        }
    }
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();
        assert_eq!(config.wire_format, WireFormat::Envelope);
        assert_eq!(config.locale, "fr");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ChatConfig::new()
            .with_base_url("http://127.0.0.1:9000")
            .with_timeout(Duration::from_secs(5))
            .with_wire_format(WireFormat::Minimal)
            .with_locale("en");

        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.wire_format, WireFormat::Minimal);
        let url = config.endpoint_url(&config.message_path).ok();
        assert_eq!(
            url.as_ref().map(Url::as_str),
            Some("http://127.0.0.1:9000/api/message")
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ChatConfig::new().with_base_url("not a url").validate().is_err());
        assert!(ChatConfig::new().with_timeout(Duration::ZERO).validate().is_err());

        let mut same = ChatConfig::new();
        same.remote_address = same.local_address.clone();
        assert!(matches!(same.validate(), Err(ChatError::Config(_))));
    }

    #[test]
    fn test_binary_reply_follows_locale() {
        let fr = ChatConfig::new();
        assert_eq!(fr.binary_reply(true), "oui");
        assert_eq!(fr.binary_reply(false), "non");

        let regional = ChatConfig::new().with_locale("fr-FR");
        assert_eq!(regional.language(), "fr");
        assert_eq!(regional.binary_reply(true), "oui");

        let en = ChatConfig::new().with_locale("en-US");
        assert_eq!(en.binary_reply(true), "yes");
        assert_eq!(en.binary_reply(false), "no");
    }

    #[test]
    fn test_wire_format_parse() {
        assert_eq!(WireFormat::parse("Minimal"), Some(WireFormat::Minimal));
        assert_eq!(WireFormat::parse(" envelope "), Some(WireFormat::Envelope));
        assert_eq!(WireFormat::parse("xml"), None);
    }

    #[test]
    fn test_config_serde_durations_as_seconds() {
        let json = serde_json::to_value(ChatConfig::default()).ok();
        let timeout = json.as_ref().and_then(|v| v.get("request_timeout")).cloned();
        assert_eq!(timeout, Some(serde_json::json!(30)));
    }
}
