//! # Courier TUI
//!
//! A keyboard-driven terminal client for collections of templated HTTP requests.
//!
//! ## Features
//! - Collections and nested folders of request templates
//! - `{{name}}` placeholders resolved through request, folder, collection
//!   and environment scopes
//! - Named environments, one active at a time
//! - Concurrent, cancellable executions with per-request history
//! - cURL import/export
//! - JSON syntax highlighting
//!
//! ## Architecture
//! Actor-based with channels:
//! - UI Layer (Ratatui) - synchronous
//! - App Layer (State machine)
//! - Execution Layer (Tokio runtime)

pub mod models;
pub mod variables;
pub mod template;
pub mod collection;
pub mod history;
pub mod engine;
pub mod storage;
pub mod config;
pub mod error;
pub mod ui;
pub mod curl;
pub mod messages;
pub mod app;
pub mod constants;

// Re-export commonly used types
pub use models::{Auth, HistoryEntry, HttpMethod, KeyValue, RequestTemplate, ResolvedRequest, ResponseRecord};
pub use variables::{Environment, ScopeChain, VariableStore};
pub use collection::{CollectionTree, NodeId};
pub use history::HistoryLog;
pub use engine::{ExecutionActor, ReqwestTransport, Transport};
pub use curl::{parse_curl, to_curl};
pub use messages::{ExecutionCommand, ExecutionEvent, RenderState, UiEvent};
pub use app::{AppActor, AppState};
pub use storage::{Storage, YamlStorage};
pub use config::Config;
pub use error::{ExecutionError, StorageError};
