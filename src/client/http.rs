//! Plain HTTP exchanges against the server under test.
//!
//! One [`HttpClient`] is built per invocation from the [`ProbeConfig`]; it
//! owns the timeout and TLS policy. Every call returns either the raw
//! response ([`HttpExchange`]) or a [`TransportFailure`]. A non-2xx status
//! is an observation, not a failure.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use crate::config::ProbeConfig;
use crate::error::{ProbeError, ProbeResult, TransportFailure};

use super::sse::EventStream;

/// Raw result of one HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpExchange {
    /// HTTP status code.
    pub status: u16,
    /// Lower-cased `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl HttpExchange {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns `true` if the content type mentions `application/json`.
    pub fn is_json(&self) -> bool {
        content_type_is(self.content_type.as_deref(), "application/json")
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Content type for messages, `missing` when absent.
    pub fn content_type_label(&self) -> &str {
        self.content_type.as_deref().unwrap_or("missing")
    }

    /// First 200 characters of the body, for messages.
    pub fn snippet(&self) -> String {
        String::from_utf8_lossy(&self.body).chars().take(200).collect()
    }
}

/// Case-insensitive media type check on an optional header value.
pub(crate) fn content_type_is(header: Option<&str>, media_type: &str) -> bool {
    header.is_some_and(|ct| ct.to_ascii_lowercase().contains(media_type))
}

/// HTTP client used by every probe in one run.
///
/// # Example
///
/// ```no_run
/// use a2a_check::client::HttpClient;
/// use a2a_check::ProbeConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let http = HttpClient::new(&ProbeConfig::default())?;
/// let exchange = http.get("http://localhost:9999/.well-known/agent-card.json").await?;
/// println!("HTTP {}", exchange.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
    authorization: Option<HeaderValue>,
}

impl HttpClient {
    /// Build a client from the probe configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::InvalidHeader`] if an extra header or the bearer
    /// token is not a valid header value.
    pub fn new(config: &ProbeConfig) -> ProbeResult<Self> {
        let mut default_headers = HeaderMap::new();
        for (key, value) in &config.extra_headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                ProbeError::InvalidHeader {
                    name: key.clone(),
                    reason: e.to_string(),
                }
            })?;
            let val = HeaderValue::from_str(value).map_err(|e| ProbeError::InvalidHeader {
                name: key.clone(),
                reason: e.to_string(),
            })?;
            default_headers.insert(name, val);
        }

        let authorization = match config.auth_bearer.as_deref() {
            Some(token) if !token.is_empty() => {
                let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                    ProbeError::InvalidHeader {
                        name: AUTHORIZATION.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                value.set_sensitive(true);
                Some(value)
            }
            _ => None,
        };

        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout,
            authorization,
        })
    }

    /// Returns `true` if requests carry a bearer token.
    pub fn has_credentials(&self) -> bool {
        self.authorization.is_some()
    }

    /// `GET url`.
    pub async fn get(&self, url: &str) -> Result<HttpExchange, TransportFailure> {
        self.exchange(Method::GET, url, None).await
    }

    /// `POST url` with a JSON body.
    pub async fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<HttpExchange, TransportFailure> {
        self.exchange(Method::POST, url, Some(body)).await
    }

    /// Send a request with the configured credentials attached.
    pub async fn exchange(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<HttpExchange, TransportFailure> {
        self.send(method, url, body, true).await
    }

    /// Send a request without the `Authorization` header, even when a
    /// bearer token is configured.
    pub async fn exchange_anonymous(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<HttpExchange, TransportFailure> {
        self.send(method, url, body, false).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        with_credentials: bool,
    ) -> Result<HttpExchange, TransportFailure> {
        tracing::debug!(%method, url, "sending request");

        let request = self
            .request(method, url, body, with_credentials)
            .timeout(self.timeout);
        let response = request.send().await.map_err(TransportFailure::from)?;

        let status = response.status().as_u16();
        let content_type = header_text(response.headers(), CONTENT_TYPE);
        let body = response
            .bytes()
            .await
            .map_err(TransportFailure::from)?
            .to_vec();

        tracing::debug!(
            url,
            status,
            content_type = ?content_type,
            bytes = body.len(),
            "response received"
        );

        Ok(HttpExchange {
            status,
            content_type,
            body,
        })
    }

    /// Open a server-sent event stream.
    ///
    /// Waiting for the response head is bounded by the request timeout; the
    /// body is not time-bounded here, the caller owns the read window.
    pub async fn open_event_stream(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<EventStream, TransportFailure> {
        tracing::debug!(%method, url, "opening event stream");

        let request = self
            .request(method, url, body, true)
            .header(ACCEPT, "text/event-stream");

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| {
                TransportFailure::timeout(format!(
                    "no response head from {url} within {:.1}s",
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(TransportFailure::from)?;

        Ok(EventStream::from_response(response))
    }

    fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        with_credentials: bool,
    ) -> reqwest::RequestBuilder {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        if with_credentials {
            if let Some(auth) = &self.authorization {
                request = request.header(AUTHORIZATION, auth.clone());
            }
        }
        request
    }
}

/// Lower-cased header value as text.
pub(crate) fn header_text(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase())
}
