//! Engine messages - communication between the App and Execution layers

use std::sync::Arc;
use std::time::Duration;

use crate::collection::NodeId;
use crate::error::ExecutionError;
use crate::models::{HistoryEntry, RequestTemplate};
use crate::variables::ScopeChain;

/// Identifies one execution; distinct even when the same request runs twice
pub type Ticket = u64;

/// Commands sent from App layer to the execution engine
#[derive(Debug, Clone)]
pub enum ExecutionCommand {
    /// Resolve and send a request. Template and scopes are snapshots taken at
    /// dispatch, so later edits cannot reach this execution.
    Execute {
        ticket: Ticket,
        template: RequestTemplate,
        scopes: ScopeChain,
        timeout: Duration,
    },
    /// Abort an in-flight execution; no history entry is written for it
    Cancel(Ticket),
    /// Cancel everything and stop the engine
    Shutdown,
}

/// Events sent from the execution engine back to the App layer
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Body bytes received so far
    Progress {
        ticket: Ticket,
        bytes_received: usize,
    },
    /// Execution ended. `Ok` carries the appended history entry, which may
    /// itself be a recorded transport failure or timeout. `Err` is a
    /// pre-flight failure that was never sent.
    Finished {
        ticket: Ticket,
        request_id: NodeId,
        result: Result<Arc<HistoryEntry>, ExecutionError>,
    },
    /// Execution was aborted before completing
    Cancelled { ticket: Ticket, request_id: NodeId },
}

impl ExecutionEvent {
    pub fn ticket(&self) -> Ticket {
        match self {
            ExecutionEvent::Progress { ticket, .. }
            | ExecutionEvent::Finished { ticket, .. }
            | ExecutionEvent::Cancelled { ticket, .. } => *ticket,
        }
    }

    /// Check if this is a terminal event (no more events expected for this ticket)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionEvent::Progress { .. })
    }
}
