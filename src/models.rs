use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::NodeId;
use crate::constants::DEFAULT_REQUEST_URL;
use crate::error::ExecutionError;
use crate::variables::VariableMap;

/// HTTP Method enum
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HttpMethod {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }

    pub fn next(&self) -> HttpMethod {
        match self {
            HttpMethod::GET => HttpMethod::POST,
            HttpMethod::POST => HttpMethod::PUT,
            HttpMethod::PUT => HttpMethod::PATCH,
            HttpMethod::PATCH => HttpMethod::DELETE,
            HttpMethod::DELETE => HttpMethod::HEAD,
            HttpMethod::HEAD => HttpMethod::OPTIONS,
            HttpMethod::OPTIONS => HttpMethod::GET,
        }
    }

    pub fn parse(s: &str) -> Option<HttpMethod> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "PATCH" => Some(HttpMethod::PATCH),
            "DELETE" => Some(HttpMethod::DELETE),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }
}

/// Authentication attached to a request template. Every value is a template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Auth {
    #[default]
    None,
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl Auth {
    pub fn next(&self) -> Auth {
        match self {
            Auth::None => Auth::Bearer { token: String::new() },
            Auth::Bearer { .. } => Auth::Basic {
                username: String::new(),
                password: String::new(),
            },
            Auth::Basic { .. } => Auth::None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Auth::None)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Auth::None => "None",
            Auth::Bearer { .. } => "Bearer",
            Auth::Basic { .. } => "Basic",
        }
    }
}

/// A header or query parameter row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }
}

/// A stored request with `{{placeholder}}` templates in url, headers, query and body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestTemplate {
    /// Assigned by the collection tree on insertion
    pub id: NodeId,
    pub name: String,
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<KeyValue>,
    pub query: Vec<KeyValue>,
    pub body: Option<String>,
    pub auth: Auth,
    /// Request-local overrides, the narrowest scope
    pub variables: VariableMap,
}

impl RequestTemplate {
    pub fn new(name: impl Into<String>, method: HttpMethod, url: impl Into<String>) -> Self {
        RequestTemplate {
            id: NodeId::default(),
            name: name.into(),
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            auth: Auth::None,
            variables: VariableMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(KeyValue::new(key, value));
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(KeyValue::new(key, value));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

impl Default for RequestTemplate {
    fn default() -> Self {
        RequestTemplate::new("New Request", HttpMethod::GET, DEFAULT_REQUEST_URL)
            .with_header("Accept", "application/json")
    }
}

/// The fully expanded request that was actually sent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub request_id: NodeId,
    pub name: String,
    pub method: HttpMethod,
    /// Final URL, query parameters included
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ResolvedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// How a response body was classified for rendering
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Text,
    Binary,
}

impl BodyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyKind::Json => "json",
            BodyKind::Text => "text",
            BodyKind::Binary => "binary",
        }
    }
}

/// A completed HTTP exchange. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseRecord {
    pub request_id: NodeId,
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub elapsed: Duration,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub body_kind: BodyKind,
}

impl ResponseRecord {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Body formatted for display: pretty JSON, lossy text, or a size summary
    pub fn display_body(&self) -> String {
        match self.body_kind {
            BodyKind::Json => serde_json::from_slice::<serde_json::Value>(&self.body)
                .ok()
                .and_then(|json| serde_json::to_string_pretty(&json).ok())
                .unwrap_or_else(|| String::from_utf8_lossy(&self.body).into_owned()),
            BodyKind::Text => String::from_utf8_lossy(&self.body).into_owned(),
            BodyKind::Binary => format!(
                "<binary body: {} bytes{}>",
                self.body.len(),
                self.content_type()
                    .map(|ct| format!(", {}", ct))
                    .unwrap_or_default()
            ),
        }
    }
}

/// A dispatched call that never produced a response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureRecord {
    pub timestamp: DateTime<Utc>,
    pub elapsed: Duration,
    pub error: ExecutionError,
}

/// What a recorded execution produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Response(ResponseRecord),
    Failed(FailureRecord),
}

/// History entry: the resolved snapshot plus what came back
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub request_id: NodeId,
    pub snapshot: ResolvedRequest,
    pub outcome: Outcome,
}

impl HistoryEntry {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match &self.outcome {
            Outcome::Response(record) => record.timestamp,
            Outcome::Failed(failure) => failure.timestamp,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match &self.outcome {
            Outcome::Response(record) => record.elapsed,
            Outcome::Failed(failure) => failure.elapsed,
        }
    }

    pub fn response(&self) -> Option<&ResponseRecord> {
        match &self.outcome {
            Outcome::Response(record) => Some(record),
            Outcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureRecord> {
        match &self.outcome {
            Outcome::Response(_) => None,
            Outcome::Failed(failure) => Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(body: &[u8], kind: BodyKind) -> ResponseRecord {
        ResponseRecord {
            request_id: NodeId(1),
            timestamp: Utc::now(),
            status: 200,
            elapsed: Duration::from_millis(12),
            headers: vec![("Content-Type".into(), "application/octet-stream".into())],
            body: body.to_vec(),
            body_kind: kind,
        }
    }

    #[test]
    fn test_method_cycle_covers_all() {
        let mut method = HttpMethod::GET;
        for _ in 0..7 {
            method = method.next();
        }
        assert_eq!(method, HttpMethod::GET);
        assert_eq!(HttpMethod::parse("options"), Some(HttpMethod::OPTIONS));
        assert_eq!(HttpMethod::parse("TRACE"), None);
    }

    #[test]
    fn test_display_body_pretty_prints_json() {
        let rec = record(br#"{"a":1}"#, BodyKind::Json);
        assert_eq!(rec.display_body(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_display_body_summarizes_binary() {
        let rec = record(&[0, 159, 146, 150], BodyKind::Binary);
        assert_eq!(
            rec.display_body(),
            "<binary body: 4 bytes, application/octet-stream>"
        );
        assert_eq!(rec.content_type(), Some("application/octet-stream"));
    }
}
