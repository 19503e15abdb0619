//! App layer - central state management and command processing
//!
//! The App actor receives UI events and execution events,
//! updates state, and emits execution commands and render state.

pub mod state;
pub mod actor;
pub mod commands;
pub mod editor;

pub use state::{AppState, Mode, ViewState};
pub use actor::AppActor;
pub use editor::{EditSession, EditTarget, Field};
