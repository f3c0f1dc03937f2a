//! Transport to the remote conversational endpoint.
//!
//! The session layer only needs two round-trips: a body-less handshake and a
//! message exchange. Both return raw JSON; shaping it into envelopes is the
//! codec's job.

use std::future::Future;
use std::pin::Pin;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::config::ChatConfig;
use super::error::{ChatError, ChatResult};

/// Boxed future type for transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait abstraction over the remote endpoint.
pub trait ChatTransport: Send + Sync {
    /// Open a conversation; the payload carries the greeting and the thread id.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn handshake(&self) -> TransportFuture<'_, ChatResult<Value>>;
    /// Send one outgoing body and return the raw reply payload.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn exchange(&self, body: Value) -> TransportFuture<'_, ChatResult<Value>>;
}

/// HTTP implementation of [`ChatTransport`].
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    start_url: Url,
    message_url: Url,
}

impl HttpTransport {
    /// Create a transport from configuration.
    ///
    /// # Errors
    /// Returns an error if the endpoint URLs are invalid or the HTTP client cannot be built.
    pub fn new(config: &ChatConfig) -> ChatResult<Self> {
        let start_url = config.endpoint_url(&config.start_path)?;
        let message_url = config.endpoint_url(&config.message_path)?;
        let client = Self::build_client(config)?;

        Ok(Self {
            client,
            start_url,
            message_url,
        })
    }

    /// Build an HTTP client with JSON headers and configured timeouts.
    fn build_client(config: &ChatConfig) -> ChatResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| ChatError::HttpClient(e.to_string()))
    }

    /// Read a response body as JSON, falling back to a JSON string.
    async fn read_payload(response: reqwest::Response) -> ChatResult<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str::<Value>(&body).unwrap_or_else(|_| {
            debug!("remote payload is not JSON, keeping it as text");
            Value::String(body)
        }))
    }
}

impl ChatTransport for HttpTransport {
    fn handshake(&self) -> TransportFuture<'_, ChatResult<Value>> {
        Box::pin(async move {
            debug!(url = %self.start_url, "handshake");
            let response = self.client.get(self.start_url.clone()).send().await?;
            Self::read_payload(response).await
        })
    }

    fn exchange(&self, body: Value) -> TransportFuture<'_, ChatResult<Value>> {
        Box::pin(async move {
            debug!(url = %self.message_url, "exchange");
            let response = self
                .client
                .post(self.message_url.clone())
                .json(&body)
                .send()
                .await?;
            Self::read_payload(response).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Json;
    use serde_json::json;
    use std::time::Duration;

    /// Serve `router` on an ephemeral port and return a config pointing at it.
    async fn serve(router: Router) -> ChatConfig {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await;
        let Ok(listener) = listener else {
            unreachable!("cannot bind test listener");
        };
        let addr = listener.local_addr().ok();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        let port = addr.map_or(0, |a| a.port());
        ChatConfig::new().with_base_url(format!("http://127.0.0.1:{port}"))
    }

    #[test]
    fn test_transport_rejects_bad_url() {
        let config = ChatConfig::new().with_base_url("::nope::");
        assert!(matches!(
            HttpTransport::new(&config),
            Err(ChatError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_handshake_and_exchange_over_http() {
        let router = Router::new()
            .route(
                "/api/start",
                get(|| async { Json(json!({"id": "g1", "thread_id": "t1", "text": "Bonjour"})) }),
            )
            .route(
                "/api/message",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({"response": {"id": "r1", "text": body.get("content").cloned()}}))
                }),
            );
        let config = serve(router).await;
        let transport = HttpTransport::new(&config).ok();
        let Some(transport) = transport else {
            unreachable!("transport should build");
        };

        let greeting = transport.handshake().await.ok();
        assert_eq!(
            greeting.as_ref().and_then(|v| v.get("thread_id")),
            Some(&json!("t1"))
        );

        let reply = transport.exchange(json!({"content": "hello"})).await.ok();
        assert_eq!(
            reply
                .as_ref()
                .and_then(|v| v.get("response"))
                .and_then(|v| v.get("text")),
            Some(&json!("hello"))
        );
    }

    #[tokio::test]
    async fn test_slow_remote_times_out() {
        let router = Router::new().route(
            "/api/message",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"text": "too late"}))
            }),
        );
        let config = serve(router)
            .await
            .with_timeout(Duration::from_millis(200));
        let Ok(transport) = HttpTransport::new(&config) else {
            unreachable!("transport should build");
        };

        let result = transport.exchange(json!({"content": "hello"})).await;
        assert!(matches!(result, Err(ChatError::Timeout)));
        assert!(result.is_err_and(|e| e.is_retryable()));
    }

    #[tokio::test]
    async fn test_non_success_status_and_plain_text() {
        let router = Router::new()
            .route(
                "/api/start",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
            )
            .route("/api/message", post(|| async { "not json at all" }));
        let config = serve(router).await;
        let Ok(transport) = HttpTransport::new(&config) else {
            unreachable!("transport should build");
        };

        assert!(matches!(
            transport.handshake().await,
            Err(ChatError::HttpStatus(503))
        ));
        let reply = transport.exchange(json!({})).await.ok();
        assert_eq!(reply, Some(Value::String("not json at all".to_string())));
    }
}
