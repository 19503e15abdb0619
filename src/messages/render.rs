//! Render state - data structure sent from App layer to UI for rendering

use std::sync::Arc;

use crate::collection::TreeRow;
use crate::messages::ui_events::InputMode;
use crate::models::{HistoryEntry, HttpMethod};

/// Complete state needed by the UI to render
#[derive(Debug, Clone)]
pub struct RenderState {
    pub input_mode: InputMode,
    pub mode: ModeView,

    // Sidebar
    pub rows: Vec<SidebarRow>,
    pub selected: usize,
    pub show_sidebar: bool,
    pub sidebar_width: u16,

    // Status bar
    pub environment: Option<String>,
    pub in_flight: usize,
    pub notice: Option<String>,

    // Popups
    pub show_help: bool,
    /// Buffer of the open cURL import popup
    pub curl_import: Option<String>,
}

impl Default for RenderState {
    fn default() -> Self {
        RenderState {
            input_mode: InputMode::Browsing,
            mode: ModeView::Browsing,
            rows: Vec::new(),
            selected: 0,
            show_sidebar: true,
            sidebar_width: crate::constants::DEFAULT_SIDEBAR_WIDTH,
            environment: None,
            in_flight: 0,
            notice: None,
            show_help: false,
            curl_import: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SidebarRow {
    pub row: TreeRow,
    /// At least one execution of this request is running
    pub in_flight: bool,
}

/// What the main pane shows
#[derive(Debug, Clone, Default)]
pub enum ModeView {
    #[default]
    Browsing,
    Editing(EditorView),
    Executing(ExecutingView),
    Viewing(ResponseView),
}

#[derive(Debug, Clone)]
pub struct EditorView {
    pub title: String,
    /// Set when a request is being edited
    pub method: Option<HttpMethod>,
    pub auth: Option<&'static str>,
    pub rows: Vec<EditorRow>,
    pub cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorRow {
    pub label: String,
    pub value: String,
    pub focused: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct ExecutingView {
    pub request_name: String,
    pub method: HttpMethod,
    pub bytes_received: usize,
}

#[derive(Debug, Clone)]
pub struct ResponseView {
    pub request_name: String,
    /// Index into the request's history, 0 = newest
    pub position: usize,
    pub total: usize,
    pub entry: Option<Arc<HistoryEntry>>,
    /// Pre-flight failure of the last run, which has no history entry
    pub error: Option<String>,
    pub scroll: u16,
    /// cURL export of the entry's snapshot, when toggled on
    pub curl: Option<String>,
}
