//! The transport seam between the dispatcher and the network.
//!
//! [`HttpTransport`] is the production implementation on top of `reqwest`.
//! Other implementations are mostly useful in tests, for outcomes a real
//! HTTP stack rarely produces.

use crate::error::BoxError;
use crate::metadata::WireRequest;
use http::{HeaderMap, StatusCode};
use std::future::Future;

/// A received HTTP response, body fully buffered.
#[derive(Debug, Clone)]
pub struct WireResponse {
    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The raw body. Empty when the server sent none.
    pub body: Vec<u8>,
}

/// Outcome of sending one request.
///
/// `Ok(None)` means the exchange completed without response metadata.
pub type TransportResult = std::result::Result<Option<WireResponse>, BoxError>;

/// Sends wire requests.
pub trait Transport: Send + Sync + 'static {
    /// Sends `request` and buffers the whole response.
    fn send(&self, request: WireRequest) -> impl Future<Output = TransportResult> + Send;
}

/// A [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    default_headers: HeaderMap,
}

impl HttpTransport {
    /// Wraps an existing client. `default_headers` are added to every request.
    pub fn new(client: reqwest::Client, default_headers: HeaderMap) -> Self {
        Self {
            client,
            default_headers,
        }
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: WireRequest) -> TransportResult {
        let mut builder = self.client.request(request.method, request.url);

        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(Some(WireResponse {
            status,
            headers,
            body,
        }))
    }
}
