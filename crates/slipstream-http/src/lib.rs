//! Slipstream HTTP - `PollTransport` over HTTP
//!
//! Each poll is a single `POST` of the JSON-encoded `PollRequest` to the
//! configured endpoint; the body of a 2xx reply is decoded as a
//! `PollResponse`. Any other status is reported as [`Error::Status`] so the
//! poll loop backs off.
//!
//! ```rust,ignore
//! let transport = HttpTransport::new("https://game.example.com/poll")?;
//! tokio::spawn(PollLoop::new(engine, transport, TokioClock::new()).run());
//! ```

mod error;

pub use error::{Error, Result};

use reqwest::{Client, Url};
use slipstream_netcode::{PollRequest, PollResponse, PollTransport};
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Poll transport backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Create a transport posting to `endpoint` with the default timeout
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    /// Create a transport with an explicit per-request timeout
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(client, endpoint)
    }

    /// Create a transport sharing an existing client
    pub fn with_client(client: Client, endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| Error::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: format!("unsupported scheme '{}'", endpoint.scheme()),
            });
        }
        Ok(Self { client, endpoint })
    }

    /// The endpoint polls are posted to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl PollTransport for HttpTransport {
    type Error = Error;

    async fn poll(&self, request: &PollRequest) -> Result<PollResponse> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::debug!("poll to {} answered {}", self.endpoint, status);
            return Err(Error::Status(status.as_u16()));
        }

        Ok(response.json::<PollResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipstream_core::{EntityId, LocalInput, Vec3};

    #[test]
    fn test_new_parses_endpoint() {
        let transport = HttpTransport::new("http://localhost:8080/poll").unwrap();
        assert_eq!(transport.endpoint().path(), "/poll");
        assert_eq!(transport.endpoint().port(), Some(8080));
    }

    #[test]
    fn test_rejects_bad_endpoints() {
        assert!(matches!(
            HttpTransport::new("not a url"),
            Err(Error::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            HttpTransport::new("ftp://example.com/poll"),
            Err(Error::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_status_error_message() {
        assert_eq!(Error::Status(503).to_string(), "Server returned status 503");
    }

    #[test]
    fn test_request_body_shape() {
        let request = PollRequest {
            player_id: Some(EntityId::new("p1")),
            input: LocalInput::IDLE,
            position: Vec3::new(0.0, 0.0, 0.0),
            angle: None,
            client_time: 7,
            session_token: String::new(),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["player_id"], "p1");
        assert_eq!(body["client_time"], 7);
        assert!(body["angle"].is_null());
    }
}
