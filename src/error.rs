//! Error taxonomy for templating, execution, the collection tree and storage
//!
//! Pre-flight errors (`TemplateError`, `UnresolvedVariable`) block dispatch.
//! Post-dispatch errors (`Transport`, `Timeout`) are recorded in history.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::collection::NodeId;

/// Identity of the request an error originated from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestLabel {
    pub id: NodeId,
    pub name: String,
}

impl RequestLabel {
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        RequestLabel {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for RequestLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" ({})", self.name, self.id)
    }
}

/// A placeholder name that no scope in the chain defines
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unresolved variable `{0}`")]
pub struct UnresolvedVariable(pub String);

/// Failure while expanding a template string
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// `{{` with no matching `}}`
    #[error("unterminated placeholder starting at byte {offset}")]
    Unterminated { offset: usize },

    /// `{{}}` or `{{   }}`
    #[error("empty placeholder at byte {offset}")]
    EmptyName { offset: usize },

    #[error(transparent)]
    Unresolved(#[from] UnresolvedVariable),
}

/// Failure reported by the transport collaborator
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("DNS lookup failed for {host}: {message}")]
    Dns { host: String, message: String },

    #[error("connection refused by {host}")]
    ConnectionRefused { host: String },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("error reading body: {0}")]
    Body(String),

    #[error("deadline exceeded")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

/// Failure of a single execution
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("{request}: unresolved variable `{name}`")]
    UnresolvedVariable { request: RequestLabel, name: String },

    #[error("{request}: {source}")]
    Template {
        request: RequestLabel,
        #[source]
        source: TemplateError,
    },

    #[error("{request}: {source}")]
    Transport {
        request: RequestLabel,
        #[source]
        source: TransportError,
    },

    #[error("{request}: timed out after {}s", .timeout.as_secs_f32())]
    Timeout {
        request: RequestLabel,
        timeout: Duration,
    },
}

impl ExecutionError {
    /// Wrap a template failure, splitting out unresolved variables
    pub fn from_template(request: RequestLabel, error: TemplateError) -> Self {
        match error {
            TemplateError::Unresolved(UnresolvedVariable(name)) => {
                ExecutionError::UnresolvedVariable { request, name }
            }
            source => ExecutionError::Template { request, source },
        }
    }

    pub fn request(&self) -> &RequestLabel {
        match self {
            ExecutionError::UnresolvedVariable { request, .. }
            | ExecutionError::Template { request, .. }
            | ExecutionError::Transport { request, .. }
            | ExecutionError::Timeout { request, .. } => request,
        }
    }

    /// Whether the error happened before anything was sent
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            ExecutionError::UnresolvedVariable { .. } | ExecutionError::Template { .. }
        )
    }
}

/// Failure while manipulating the collection tree
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("no node with id {0}")]
    UnknownNode(NodeId),

    #[error("{0} is a request and cannot hold children")]
    NotAContainer(NodeId),

    #[error("{0} is not a request")]
    NotARequest(NodeId),
}

/// Failure while manipulating environments
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    #[error("no environment named `{0}`")]
    UnknownEnvironment(String),
}

/// Failure from the persistence collaborator, passed through uninterpreted
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
