//! Request resolution and dispatch
//!
//! `resolve` turns a template plus a scope chain into the concrete request that
//! will be sent; any template or variable failure stops here and nothing is
//! sent. `dispatch` performs the exchange under a deadline and classifies the
//! body. `execute_recorded` ties both together and appends to history.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::Utc;
use tokio::time::Instant;

use crate::constants::DEFAULT_SCHEME;
use crate::engine::transport::{Progress, Transport};
use crate::error::{ExecutionError, RequestLabel, TemplateError, TransportError};
use crate::history::{lock_history, SharedHistory};
use crate::models::{
    Auth, BodyKind, FailureRecord, HistoryEntry, Outcome, RequestTemplate, ResolvedRequest,
    ResponseRecord,
};
use crate::template::expand;
use crate::variables::ScopeChain;

/// Expand url, enabled headers, enabled query params, auth and body.
///
/// Declaration order of headers and query params is preserved.
pub fn resolve(template: &RequestTemplate, scopes: &ScopeChain) -> Result<ResolvedRequest, ExecutionError> {
    let label = RequestLabel::new(template.id, template.name.clone());
    let expand_field = |text: &str| -> Result<String, ExecutionError> {
        expand(text, scopes).map_err(|e: TemplateError| ExecutionError::from_template(label.clone(), e))
    };

    let url = expand_field(&template.url)?;

    let mut headers = Vec::with_capacity(template.headers.len() + 1);
    for header in template.headers.iter().filter(|h| h.enabled && !h.key.trim().is_empty()) {
        headers.push((header.key.trim().to_string(), expand_field(&header.value)?));
    }

    let mut query = Vec::with_capacity(template.query.len());
    for param in template.query.iter().filter(|p| p.enabled && !p.key.trim().is_empty()) {
        query.push((param.key.trim().to_string(), expand_field(&param.value)?));
    }

    match &template.auth {
        Auth::None => {}
        Auth::Bearer { token } => {
            headers.push(("Authorization".to_string(), format!("Bearer {}", expand_field(token)?)));
        }
        Auth::Basic { username, password } => {
            let credentials = format!("{}:{}", expand_field(username)?, expand_field(password)?);
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
            headers.push(("Authorization".to_string(), format!("Basic {}", encoded)));
        }
    }

    let body = match &template.body {
        Some(body) => Some(expand_field(body)?),
        None => None,
    };

    Ok(ResolvedRequest {
        request_id: template.id,
        name: template.name.clone(),
        method: template.method,
        url: compose_url(&url, &query),
        headers,
        body,
    })
}

/// Default the scheme and append query parameters in order
fn compose_url(base: &str, query: &[(String, String)]) -> String {
    let base = base.trim();
    let with_scheme = if base.contains("://") {
        base.to_string()
    } else {
        format!("{}{}", DEFAULT_SCHEME, base)
    };

    if query.is_empty() {
        return with_scheme;
    }

    match reqwest::Url::parse(&with_scheme) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            url.to_string()
        }
        // Left for the transport to reject with its own diagnostic
        Err(_) => {
            let separator = if with_scheme.contains('?') { '&' } else { '?' };
            let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            format!("{}{}{}", with_scheme, separator, pairs.join("&"))
        }
    }
}

/// Classify a body for rendering.
///
/// Only declared or sniffed JSON is parsed; a failed parse downgrades to text.
pub fn classify_body(content_type: Option<&str>, body: &[u8]) -> BodyKind {
    let parses_as_json = || serde_json::from_slice::<serde_json::Value>(body).is_ok();

    match content_type.map(|ct| ct.to_ascii_lowercase()) {
        Some(ct) if ct.contains("json") => {
            if parses_as_json() {
                BodyKind::Json
            } else {
                BodyKind::Text
            }
        }
        Some(ct)
            if ct.starts_with("text/")
                || ct.contains("xml")
                || ct.contains("javascript")
                || ct.contains("x-www-form-urlencoded") =>
        {
            BodyKind::Text
        }
        Some(ct) if !ct.trim().is_empty() => BodyKind::Binary,
        _ => match std::str::from_utf8(body) {
            Ok(text) => {
                let trimmed = text.trim_start();
                if (trimmed.starts_with('{') || trimmed.starts_with('[')) && parses_as_json() {
                    BodyKind::Json
                } else {
                    BodyKind::Text
                }
            }
            Err(_) => BodyKind::Binary,
        },
    }
}

/// Send a resolved request and build its response record.
///
/// The deadline covers the whole exchange including the body; a partial body
/// is discarded when it fires.
pub async fn dispatch(
    transport: &dyn Transport,
    request: &ResolvedRequest,
    timeout: Duration,
    progress: &Progress,
) -> Result<ResponseRecord, ExecutionError> {
    let label = || RequestLabel::new(request.request_id, request.name.clone());
    let start = Instant::now();

    let sent = tokio::time::timeout(timeout, transport.send(request, timeout, progress)).await;
    let elapsed = start.elapsed();

    let response = match sent {
        Err(_) | Ok(Err(TransportError::Timeout)) => {
            return Err(ExecutionError::Timeout {
                request: label(),
                timeout,
            })
        }
        Ok(Err(source)) => {
            return Err(ExecutionError::Transport {
                request: label(),
                source,
            })
        }
        Ok(Ok(response)) => response,
    };

    let content_type = response
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.as_str());
    let body_kind = classify_body(content_type, &response.body);

    Ok(ResponseRecord {
        request_id: request.request_id,
        timestamp: Utc::now(),
        status: response.status,
        elapsed,
        headers: response.headers,
        body: response.body,
        body_kind,
    })
}

/// Resolve and dispatch without touching history
pub async fn execute(
    transport: &dyn Transport,
    template: &RequestTemplate,
    scopes: &ScopeChain,
    timeout: Duration,
) -> Result<ResponseRecord, ExecutionError> {
    let request = resolve(template, scopes)?;
    dispatch(transport, &request, timeout, &|_: usize| {}).await
}

/// Resolve, dispatch and append the attempt to history.
///
/// Returns `Err` only for pre-flight failures, which are never recorded.
/// Transport failures and timeouts come back as recorded `Outcome::Failed`
/// entries. If this future is dropped before the exchange finishes, nothing
/// is appended.
pub async fn execute_recorded(
    transport: &dyn Transport,
    template: &RequestTemplate,
    scopes: &ScopeChain,
    timeout: Duration,
    history: &SharedHistory,
    progress: &Progress,
) -> Result<Arc<HistoryEntry>, ExecutionError> {
    let snapshot = resolve(template, scopes)?;
    let started = Instant::now();

    let outcome = match dispatch(transport, &snapshot, timeout, progress).await {
        Ok(record) => Outcome::Response(record),
        Err(error) => Outcome::Failed(FailureRecord {
            timestamp: Utc::now(),
            elapsed: started.elapsed(),
            error,
        }),
    };

    let entry = HistoryEntry {
        request_id: snapshot.request_id,
        snapshot,
        outcome,
    };
    let entry = lock_history(history).append(entry);
    tracing::debug!(request = %entry.request_id, failed = entry.failure().is_some(), "History entry appended");
    Ok(entry)
}
