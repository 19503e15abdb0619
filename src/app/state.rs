//! App state - pure data structure with no I/O logic

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::app::editor::{Draft, EditSession, EditTarget, Field};
use crate::collection::{CollectionTree, NodeId, TreeRow};
use crate::constants::DEFAULT_SIDEBAR_WIDTH;
use crate::curl;
use crate::history::{lock_history, SharedHistory};
use crate::messages::render::{
    EditorView, ExecutingView, ModeView, ResponseView, SidebarRow,
};
use crate::messages::ui_events::InputMode;
use crate::messages::{RenderState, Ticket};
use crate::storage::Storage;
use crate::variables::{read_store, SharedVariables};

/// Interaction state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Browsing,
    Editing(EditSession),
    /// Focused on one in-flight execution
    Executing { ticket: Ticket, request_id: NodeId },
    Viewing(ViewState),
}

/// Which history entry of which request is on screen
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewState {
    pub request_id: NodeId,
    /// 0 = newest
    pub index: usize,
    pub scroll: u16,
    pub show_curl: bool,
    /// Pre-flight failure of the last run
    pub error: Option<String>,
}

impl ViewState {
    pub fn latest(request_id: NodeId) -> Self {
        ViewState {
            request_id,
            index: 0,
            scroll: 0,
            show_curl: false,
            error: None,
        }
    }
}

/// An execution that has been dispatched but not reported back
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InFlight {
    pub request_id: NodeId,
    pub bytes_received: usize,
}

/// Main application state - pure data, no I/O
pub struct AppState {
    pub mode: Mode,

    // Data
    pub tree: CollectionTree,
    pub variables: SharedVariables,
    pub history: SharedHistory,
    pub storage: Arc<dyn Storage>,
    pub timeout: Duration,

    // Sidebar
    pub selected: Option<NodeId>,
    pub expanded: HashSet<NodeId>,
    pub show_sidebar: bool,
    pub sidebar_width: u16,

    // Executions
    pub in_flight: HashMap<Ticket, InFlight>,
    pub next_ticket: Ticket,

    // Status line and popups
    pub notice: Option<String>,
    pub show_help: bool,
    pub curl_import: Option<String>,
}

impl AppState {
    /// Starts in `Browsing` at the first collection, with collections expanded
    pub fn new(
        tree: CollectionTree,
        variables: SharedVariables,
        history: SharedHistory,
        storage: Arc<dyn Storage>,
        timeout: Duration,
    ) -> Self {
        let expanded = tree.roots().iter().copied().collect();
        let selected = tree.roots().first().copied();
        AppState {
            mode: Mode::Browsing,
            tree,
            variables,
            history,
            storage,
            timeout,
            selected,
            expanded,
            show_sidebar: true,
            sidebar_width: DEFAULT_SIDEBAR_WIDTH,
            in_flight: HashMap::new(),
            next_ticket: 1,
            notice: None,
            show_help: false,
            curl_import: None,
        }
    }

    /// Generate a unique execution ticket
    pub fn allocate_ticket(&mut self) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    pub fn rows(&self) -> Vec<TreeRow> {
        self.tree.visible_rows(&self.expanded)
    }

    /// Position of the selection among visible rows
    pub fn selected_index(&self, rows: &[TreeRow]) -> Option<usize> {
        let selected = self.selected?;
        rows.iter().position(|row| row.id == selected)
    }

    /// Whether any in-flight execution targets a node at or below `node`
    pub fn has_in_flight_within(&self, node: NodeId) -> bool {
        self.in_flight
            .values()
            .any(|f| self.tree.is_within(f.request_id, node))
    }

    pub fn input_mode(&self) -> InputMode {
        match &self.mode {
            Mode::Browsing => InputMode::Browsing,
            Mode::Editing(session) => InputMode::Editing {
                multiline: session.field == Field::Body,
            },
            Mode::Executing { .. } => InputMode::Executing,
            Mode::Viewing(_) => InputMode::Viewing,
        }
    }

    fn request_name(&self, id: NodeId) -> String {
        self.tree
            .get(id)
            .map(|node| node.name().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    fn editor_view(&self, session: &EditSession) -> EditorView {
        let (title, method, auth) = match (&session.target, &session.draft) {
            (EditTarget::Request(_), Draft::Request { template, .. }) => (
                format!("Edit request: {}", template.name),
                Some(template.method),
                Some(template.auth.label()),
            ),
            (EditTarget::Container(id), _) => (format!("Edit variables: {}", self.request_name(*id)), None, None),
            (EditTarget::Environment(name), _) => (format!("Edit environment: {}", name), None, None),
            (EditTarget::Request(id), _) => (format!("Edit: {}", self.request_name(*id)), None, None),
        };
        EditorView {
            title,
            method,
            auth,
            rows: session.view_rows(),
            cursor: session.cursor,
        }
    }

    fn response_view(&self, view: &ViewState) -> ResponseView {
        let (entry, total) = {
            let history = lock_history(&self.history);
            (history.get(view.request_id, view.index), history.len(view.request_id))
        };
        let curl = if view.show_curl {
            entry.as_ref().map(|e| curl::to_curl(&e.snapshot))
        } else {
            None
        };
        ResponseView {
            request_name: self.request_name(view.request_id),
            position: view.index,
            total,
            entry,
            error: view.error.clone(),
            scroll: view.scroll,
            curl,
        }
    }

    /// Convert state to RenderState for UI
    pub fn to_render_state(&self) -> RenderState {
        let tree_rows = self.rows();
        let selected = self.selected_index(&tree_rows).unwrap_or(0);
        let busy: HashSet<NodeId> = self.in_flight.values().map(|f| f.request_id).collect();
        // A collapsed container stands in for the running requests it hides
        let rows = tree_rows
            .into_iter()
            .map(|row| {
                let hides_busy = row.has_children
                    && !row.expanded
                    && busy.iter().any(|id| *id != row.id && self.tree.is_within(*id, row.id));
                SidebarRow {
                    in_flight: busy.contains(&row.id) || hides_busy,
                    row,
                }
            })
            .collect();

        let mode = match &self.mode {
            Mode::Browsing => ModeView::Browsing,
            Mode::Editing(session) => ModeView::Editing(self.editor_view(session)),
            Mode::Executing { ticket, request_id } => {
                let method = self
                    .tree
                    .request(*request_id)
                    .map(|r| r.method)
                    .unwrap_or_default();
                ModeView::Executing(ExecutingView {
                    request_name: self.request_name(*request_id),
                    method,
                    bytes_received: self.in_flight.get(ticket).map_or(0, |f| f.bytes_received),
                })
            }
            Mode::Viewing(view) => ModeView::Viewing(self.response_view(view)),
        };

        RenderState {
            input_mode: self.input_mode(),
            mode,
            rows,
            selected,
            show_sidebar: self.show_sidebar,
            sidebar_width: self.sidebar_width,
            environment: read_store(&self.variables).active().map(|e| e.name.clone()),
            in_flight: self.in_flight.len(),
            notice: self.notice.clone(),
            show_help: self.show_help,
            curl_import: self.curl_import.clone(),
        }
    }
}
