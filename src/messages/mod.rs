//! Message types for inter-layer communication in the actor-based architecture.
//!
//! This module defines all messages that flow between the UI, App, and Execution layers.

pub mod engine;
pub mod render;
pub mod ui_events;

pub use engine::{ExecutionCommand, ExecutionEvent, Ticket};
pub use render::RenderState;
pub use ui_events::UiEvent;
