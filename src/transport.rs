//! HTTP Transport for Hub RPC
//!
//! Abstracts the HTTP(S) connection for testability. Provides:
//! - Transport trait: one buffered request/response exchange
//! - HttpTransport: real HTTP(S) client for production
//! - MockTransport: scripted responses for unit tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::tls::TlsMaterial;

/// Transport trait for hub communication.
pub trait Transport: Send + Sync {
    /// Execute one request and return the fully buffered response.
    fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// HTTP method of a transport request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A single buffered HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL; the scheme selects plain or TLS transport.
    pub url: String,
    /// Header pairs in send order. Names match case-insensitively.
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Start a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Start a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// First value of a header, case-insensitive.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    /// Header pairs in receive order. Repeated names are kept.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeatable header, in receive order.
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),
}

/// Configuration for the real HTTP transport.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Per-request deadline. `None` disables it.
    pub timeout: Option<Duration>,
    /// Client TLS material for https endpoints; unused for plain http.
    pub tls: Option<TlsMaterial>,
}

/// Real HTTP(S) transport for production use.
///
/// Buffers whole request and response bodies, follows no redirects, and
/// keeps no cookie jar: session cookies are the caller's state, not the
/// connection's.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a transport. TLS material and the deadline are fixed for the
    /// transport's lifetime.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::blocking::Client::builder()
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.timeout);

        if let Some(tls) = &config.tls {
            if !tls.reject_unauthorized {
                builder = builder.danger_accept_invalid_certs(true);
            }
            if let Some(ca) = &tls.ca {
                let certificate = reqwest::Certificate::from_pem(ca)
                    .map_err(|e| TransportError::Tls(e.to_string()))?;
                builder = builder.add_root_certificate(certificate);
            }
            if let Some(identity_pem) = &tls.identity_pem {
                let identity = reqwest::Identity::from_pem(identity_pem)
                    .map_err(|e| TransportError::Tls(e.to_string()))?;
                builder = builder.identity(identity);
            }
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in prepared_headers(request) {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            let value = reqwest::header::HeaderValue::from_str(&value)
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            headers.append(name, value);
        }

        let mut builder = self.client.request(method, &request.url).headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        tracing::debug!(url = %request.url, method = ?request.method, "hub request");
        let response = builder.send().map_err(from_reqwest_error)?;

        let status = response.status();
        let header_pairs = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().map_err(from_reqwest_error)?;
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "hub response");

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers: header_pairs,
            body,
        })
    }
}

/// Headers to send: the caller's, plus a computed content-length when a
/// body is present and none was given.
fn prepared_headers(request: &HttpRequest) -> Vec<(String, String)> {
    let mut headers = request.headers.clone();
    if let Some(body) = &request.body {
        if request.header_value("content-length").is_none() {
            headers.push(("content-length".to_string(), body.len().to_string()));
        }
    }
    headers
}

fn from_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::ConnectionFailed(err.to_string())
    }
}

/// Scripted transport for unit tests.
///
/// Pops queued responses in order and records every request it sees. An
/// unscripted request fails loudly instead of inventing a response.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Create an empty mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn push_response(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a transport failure.
    pub fn push_error(&self, error: TransportError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::ConnectionFailed(
                    "mock transport: no scripted response".to_string(),
                ))
            })
    }
}
