//! Transport port and its reqwest implementation
//!
//! The engine treats sending as a capability: connection pooling, TLS and
//! redirects belong to the transport.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::constants::{APP_NAME, APP_VERSION};
use crate::error::TransportError;
use crate::models::{HttpMethod, ResolvedRequest};

/// Raw result of a completed exchange
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Called with the running total of body bytes received
pub type Progress = dyn Fn(usize) + Send + Sync;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and read the whole body.
    ///
    /// Dropping the returned future aborts the exchange.
    async fn send(
        &self,
        request: &ResolvedRequest,
        timeout: Duration,
        progress: &Progress,
    ) -> Result<TransportResponse, TransportError>;
}

/// HTTP transport backed by a shared `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("{}/{}", APP_NAME, APP_VERSION))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| TransportError::Other(diagnostic(&e)))?;
        Ok(Self { client })
    }

    fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::GET => reqwest::Method::GET,
            HttpMethod::POST => reqwest::Method::POST,
            HttpMethod::PUT => reqwest::Method::PUT,
            HttpMethod::PATCH => reqwest::Method::PATCH,
            HttpMethod::DELETE => reqwest::Method::DELETE,
            HttpMethod::HEAD => reqwest::Method::HEAD,
            HttpMethod::OPTIONS => reqwest::Method::OPTIONS,
        }
    }

    fn map_error(error: &reqwest::Error) -> TransportError {
        let message = diagnostic(error);
        let lower = message.to_lowercase();
        let host = error
            .url()
            .and_then(|u| u.host_str())
            .unwrap_or("unknown")
            .to_string();

        if error.is_timeout() {
            TransportError::Timeout
        } else if error.is_connect() {
            if lower.contains("dns") || lower.contains("resolve") || lower.contains("lookup") {
                TransportError::Dns { host, message }
            } else if lower.contains("refused") {
                TransportError::ConnectionRefused { host }
            } else if lower.contains("certificate") || lower.contains("tls") || lower.contains("handshake") {
                TransportError::Tls(message)
            } else {
                TransportError::Connect(message)
            }
        } else if error.is_body() || error.is_decode() {
            TransportError::Body(message)
        } else {
            TransportError::Other(message)
        }
    }
}

/// Full error chain, outermost first
fn diagnostic(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &ResolvedRequest,
        timeout: Duration,
        progress: &Progress,
    ) -> Result<TransportResponse, TransportError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", e, request.url)))?;

        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method), url)
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| Self::map_error(&e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();

        let mut stream = response.bytes_stream();
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| Self::map_error(&e))?;
            body.extend_from_slice(&bytes);
            progress(body.len());
        }

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
