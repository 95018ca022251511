//! HTTP transport seam and response handling
//!
//! The fetch pipeline only needs one capability from the network: "send a GET,
//! receive status, headers and body". [`Transport`] captures that seam so the
//! production [`http::ReqwestTransport`] and test stubs are interchangeable.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

pub mod http;
pub mod order_parser;
pub mod retry_formatter;

pub use http::ReqwestTransport;

/// Raw response handed back by a [`Transport`]
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Full response body
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Create a response with no headers
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Attach a header, ignoring values that are not valid header text
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    /// Raw `Retry-After` header value, if present and valid UTF-8
    pub fn retry_after(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
    }
}

/// Category of a transport-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Request or connect timeout
    Timeout,
    /// Connection refused, DNS failure, or similar
    Connect,
    /// Anything else below the HTTP layer (reset mid-body, protocol error)
    Other,
}

/// Transport-level failure: no usable HTTP response was received
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?} transport error: {message}")]
pub struct TransportError {
    /// Failure category
    pub kind: TransportErrorKind,
    /// Underlying error text
    pub message: String,
}

impl TransportError {
    /// Create a transport error
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Capability to issue a GET and return status, headers and body
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue `GET url`
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// Build the resource URL for one identifier: `<base>/item/{id}`
pub fn item_url(base_url: &str, id: crate::OrderId) -> String {
    format!("{}/item/{}", base_url.trim_end_matches('/'), id)
}
