//! App actor - message loop processing UI events and execution events

use tokio::sync::mpsc;

use crate::app::state::AppState;
use crate::messages::{ExecutionCommand, ExecutionEvent, RenderState, UiEvent};

/// App actor that owns the interaction state and talks to the execution engine
pub struct AppActor {
    state: AppState,
    exec_tx: mpsc::UnboundedSender<ExecutionCommand>,
    render_tx: mpsc::UnboundedSender<RenderState>,
}

impl AppActor {
    pub fn new(
        state: AppState,
        exec_tx: mpsc::UnboundedSender<ExecutionCommand>,
        render_tx: mpsc::UnboundedSender<RenderState>,
    ) -> Self {
        AppActor {
            state,
            exec_tx,
            render_tx,
        }
    }

    /// Run the actor message loop
    pub async fn run(
        mut self,
        mut ui_rx: mpsc::UnboundedReceiver<UiEvent>,
        mut exec_rx: mpsc::UnboundedReceiver<ExecutionEvent>,
    ) {
        let _ = self.render_tx.send(self.state.to_render_state());

        loop {
            tokio::select! {
                Some(event) = ui_rx.recv() => {
                    if self.handle_ui_event(event) {
                        let _ = self.exec_tx.send(ExecutionCommand::Shutdown);
                        break;
                    }
                    let _ = self.render_tx.send(self.state.to_render_state());
                }
                Some(event) = exec_rx.recv() => {
                    tracing::debug!(ticket = event.ticket(), terminal = event.is_terminal(), "Execution event");
                    self.state.handle_execution_event(event);
                    let _ = self.render_tx.send(self.state.to_render_state());
                }
                else => break,
            }
        }
    }

    fn send(&self, cmd: Option<ExecutionCommand>) {
        if let Some(cmd) = cmd {
            if self.exec_tx.send(cmd).is_err() {
                tracing::error!("Execution engine is gone");
            }
        }
    }

    /// Handle a UI event, returns true if quit was requested
    fn handle_ui_event(&mut self, event: UiEvent) -> bool {
        match event {
            // Tree navigation
            UiEvent::CursorUp => self.state.cursor_up(),
            UiEvent::CursorDown => self.state.cursor_down(),
            UiEvent::CursorHome => self.state.cursor_home(),
            UiEvent::CursorEnd => self.state.cursor_end(),
            UiEvent::Select => self.state.select(),
            UiEvent::Back => self.state.back(),

            // Tree actions
            UiEvent::EditSelected => self.state.edit_selected(),
            UiEvent::EditEnvironment => self.state.edit_environment(),
            UiEvent::Run => {
                let cmd = self.state.run();
                self.send(cmd);
            }
            UiEvent::NewRequest => self.state.new_request(),
            UiEvent::NewFolder => self.state.new_folder(),
            UiEvent::NewCollection => self.state.new_collection(),
            UiEvent::DeleteSelected => self.state.delete_selected(),
            UiEvent::CycleEnvironment => self.state.cycle_environment(),

            // Editing
            UiEvent::CharInput(c) => self.state.edit(|s| s.insert_char(c)),
            UiEvent::Backspace => self.state.edit(|s| s.backspace()),
            UiEvent::CursorLeft => self.state.edit(|s| s.cursor_left()),
            UiEvent::CursorRight => self.state.edit(|s| s.cursor_right()),
            UiEvent::NextField => self.state.edit(|s| s.next_field()),
            UiEvent::PrevField => self.state.edit(|s| s.prev_field()),
            UiEvent::CycleMethod => self.state.edit(|s| s.cycle_method()),
            UiEvent::CycleAuth => self.state.edit(|s| s.cycle_auth()),
            UiEvent::AddRow => self.state.edit(|s| s.add_row()),
            UiEvent::AddQueryParam => self.state.edit(|s| s.add_query_param()),
            UiEvent::DeleteRow => self.state.edit(|s| s.delete_row()),
            UiEvent::ToggleRow => self.state.edit(|s| s.toggle_row()),
            UiEvent::Save => self.state.save(),
            UiEvent::CancelEdit => self.state.cancel_edit(),

            // Executing
            UiEvent::CancelRun => {
                let cmd = self.state.cancel_run();
                self.send(cmd);
            }

            // Viewing
            UiEvent::ScrollUp => self.state.scroll_up(),
            UiEvent::ScrollDown => self.state.scroll_down(),
            UiEvent::HistoryOlder => self.state.history_older(),
            UiEvent::HistoryNewer => self.state.history_newer(),
            UiEvent::ToggleCurl => self.state.toggle_curl(),

            // cURL
            UiEvent::ShowCurlImport => self.state.show_curl_import(),
            UiEvent::CurlImportChar(c) => self.state.curl_import_char(c),
            UiEvent::CurlImportBackspace => self.state.curl_import_backspace(),
            UiEvent::ImportCurl => self.state.import_curl(),
            UiEvent::CancelCurlImport => self.state.cancel_curl_import(),

            // Layout and popups
            UiEvent::ToggleSidebar => self.state.toggle_sidebar(),
            UiEvent::ToggleHelp => self.state.toggle_help(),
            UiEvent::CloseHelp => self.state.close_help(),

            // System
            UiEvent::Quit => return true,
        }

        false
    }
}
