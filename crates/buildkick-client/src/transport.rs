//! HTTP transport to the CI server
//!
//! A single `reqwest::Client` is built once per run with basic-auth
//! credentials and reused for every call. Callers see response bodies as text
//! and decide themselves how to decode them.

use async_trait::async_trait;
use buildkick_utils::error::{TransportError, TransportErrorKind};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default connect timeout (30 seconds)
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default overall request timeout (100 seconds)
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(100);

/// Calls the executor makes against the CI server.
///
/// Every method takes a full address and returns the response body on a
/// success status.
#[async_trait]
pub trait CiTransport: Send + Sync {
    /// `GET` with `Accept: application/json`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` on connection failure or a non-success status.
    async fn get_json(&self, address: &str) -> Result<String, TransportError>;

    /// `POST` an XML document.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` on connection failure or a non-success status.
    async fn post_xml(&self, address: &str, body: &str) -> Result<String, TransportError>;

    /// `PUT` a plain-text value.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` on connection failure or a non-success status.
    async fn put_text(&self, address: &str, body: &str) -> Result<String, TransportError>;
}

/// reqwest-backed transport with HTTP basic authentication.
#[derive(Clone)]
pub struct HttpTransport {
    client: Arc<Client>,
    username: String,
    password: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Build the shared client.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the client cannot be constructed.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, TransportError> {
        Self::with_timeout(username, password, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Build the shared client with a custom per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the client cannot be constructed.
    pub fn with_timeout(
        username: impl Into<String>,
        password: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                TransportError::new(
                    "BUILD",
                    "http client",
                    TransportErrorKind::Connection(e.to_string()),
                )
            })?;

        Ok(Self {
            client: Arc::new(client),
            username: username.into(),
            password: password.into(),
        })
    }

    async fn send(
        &self,
        method: &'static str,
        address: &str,
        payload: Option<&str>,
        request: RequestBuilder,
    ) -> Result<String, TransportError> {
        debug!(method, address, "Sending request");

        let with_payload = |err: TransportError| match payload {
            Some(body) => err.with_payload(body),
            None => err,
        };

        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| with_payload(TransportError::new(method, address, classify(&e))))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| with_payload(TransportError::new(method, address, classify(&e))))?;

        if !status.is_success() {
            return Err(with_payload(TransportError::status(
                method,
                address,
                status.as_u16(),
                &body,
            )));
        }

        debug!(method, address, status = status.as_u16(), bytes = body.len(), "Response received");
        Ok(body)
    }
}

fn classify(error: &reqwest::Error) -> TransportErrorKind {
    if error.is_timeout() {
        TransportErrorKind::Timeout
    } else {
        TransportErrorKind::Connection(error.to_string())
    }
}

#[async_trait]
impl CiTransport for HttpTransport {
    async fn get_json(&self, address: &str) -> Result<String, TransportError> {
        let request = self
            .client
            .get(address)
            .header(ACCEPT, "application/json");
        self.send("GET", address, None, request).await
    }

    async fn post_xml(&self, address: &str, body: &str) -> Result<String, TransportError> {
        let request = self
            .client
            .post(address)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/xml")
            .body(body.to_string());
        self.send("POST", address, Some(body), request).await
    }

    async fn put_text(&self, address: &str, body: &str) -> Result<String, TransportError> {
        let request = self
            .client
            .put(address)
            .header(ACCEPT, "text/plain")
            .header(CONTENT_TYPE, "text/plain")
            .body(body.to_string());
        self.send("PUT", address, Some(body), request).await
    }
}
