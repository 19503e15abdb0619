//! Courier TUI - Actor-based HTTP collection client
//!
//! Architecture:
//! - UI Layer (Ratatui) - synchronous terminal rendering
//! - App Layer - central state machine processing events
//! - Execution Layer (Tokio) - async HTTP execution

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::*, widgets::*};
use tokio::sync::mpsc;

use courier_tui::app::{AppActor, AppState};
use courier_tui::collection::CollectionTree;
use courier_tui::config::{default_data_dir, Config};
use courier_tui::constants::{APP_NAME, APP_VERSION};
use courier_tui::engine::{ExecutionActor, ReqwestTransport};
use courier_tui::history::HistoryLog;
use courier_tui::messages::render::{EditorView, ExecutingView, ModeView, ResponseView};
use courier_tui::messages::ui_events::{key_to_ui_event, InputMode};
use courier_tui::messages::{ExecutionCommand, ExecutionEvent, RenderState, UiEvent};
use courier_tui::models::{BodyKind, Outcome};
use courier_tui::storage::{Storage, YamlStorage};
use courier_tui::ui::{centered_rect, highlight_json, method_color, status_color, tree_prefix};
use courier_tui::variables::VariableStore;

/// Terminal cleanup guard
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Log to a file in the data directory; the terminal belongs to the UI
fn init_logging(config: &Config, data_dir: &Path) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_path = config.log_path(data_dir);
    let dir = log_path.parent().unwrap_or(data_dir);
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let file_name = log_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| courier_tui::constants::DEFAULT_LOG_FILE.to_string());

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_max_level(config.tracing_level())
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = default_data_dir();
    let config = Config::load(&data_dir)?;
    let _log_guard = init_logging(&config, &data_dir)?;
    tracing::info!(version = APP_VERSION, data_dir = %data_dir.display(), "Starting");

    // Load persisted collections and environments
    let storage = Arc::new(YamlStorage::new(&data_dir));
    let tree = storage.load_collections().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load collections");
        CollectionTree::new()
    });
    let environments = storage.load_environments().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load environments");
        Vec::new()
    });
    tracing::info!(nodes = tree.len(), environments = environments.len(), "Loaded data");

    let variables = VariableStore::new(environments).into_shared();
    let history = HistoryLog::new(config.history_capacity).into_shared();
    let transport = Arc::new(ReqwestTransport::new()?);

    let mut state = AppState::new(tree, variables, history.clone(), storage, config.request_timeout());
    state.sidebar_width = config.sidebar_width;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let _guard = TerminalGuard;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create channels
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (exec_cmd_tx, exec_cmd_rx) = mpsc::unbounded_channel::<ExecutionCommand>();
    let (exec_event_tx, exec_event_rx) = mpsc::unbounded_channel::<ExecutionEvent>();
    let (render_tx, mut render_rx) = mpsc::unbounded_channel::<RenderState>();

    // Spawn execution actor
    let execution_actor = ExecutionActor::new(transport, history, exec_event_tx);
    tokio::spawn(execution_actor.run(exec_cmd_rx));

    // Spawn app actor
    let app_actor = AppActor::new(state, exec_cmd_tx, render_tx);
    tokio::spawn(app_actor.run(ui_rx, exec_event_rx));

    // Run UI loop (synchronous with async polling)
    run_ui_loop(&mut terminal, ui_tx, &mut render_rx).await?;

    tracing::info!("Shutting down");
    Ok(())
}

/// Run the synchronous UI rendering loop
async fn run_ui_loop(
    terminal: &mut Terminal<impl Backend>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
    render_rx: &mut mpsc::UnboundedReceiver<RenderState>,
) -> anyhow::Result<()> {
    let mut current_state = RenderState::default();

    loop {
        terminal.draw(|f| draw_ui(f, &current_state))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if let Some(event) = key_to_ui_event(
                    key,
                    current_state.input_mode,
                    current_state.show_help,
                    current_state.curl_import.is_some(),
                ) {
                    let quit = matches!(event, UiEvent::Quit);
                    let _ = ui_tx.send(event);
                    if quit {
                        break;
                    }
                }
            }
        }

        // Check for state updates (non-blocking)
        while let Ok(state) = render_rx.try_recv() {
            current_state = state;
        }
    }

    Ok(())
}

// ============================================================================
// UI Drawing Functions
// ============================================================================

fn draw_ui(f: &mut Frame, state: &RenderState) {
    let area = f.area();

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    draw_title_bar(f, state, main_chunks[0]);

    let content = if state.show_sidebar {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(state.sidebar_width), Constraint::Min(0)])
            .split(main_chunks[1]);
        draw_sidebar(f, state, chunks[0]);
        chunks[1]
    } else {
        main_chunks[1]
    };

    match &state.mode {
        ModeView::Browsing => draw_welcome(f, content),
        ModeView::Editing(editor) => draw_editor(f, editor, content),
        ModeView::Executing(executing) => draw_executing(f, executing, content),
        ModeView::Viewing(view) => draw_response(f, view, content),
    }

    draw_status_bar(f, state, main_chunks[2]);

    if state.show_help {
        draw_help_popup(f, area);
    }

    if let Some(buffer) = &state.curl_import {
        draw_curl_import_popup(f, buffer, area);
    }
}

fn draw_title_bar(f: &mut Frame, state: &RenderState, area: Rect) {
    let environment = match &state.environment {
        Some(name) => Span::styled(format!(" env: {} ", name), Style::default().fg(Color::Black).bg(Color::Green)),
        None => Span::styled(" env: none ", Style::default().fg(Color::Gray)),
    };
    let running = if state.in_flight > 0 {
        Span::styled(format!(" [{} running]", state.in_flight), Style::default().fg(Color::Yellow))
    } else {
        Span::raw("")
    };
    let line = Line::from(vec![
        Span::styled(format!(" {} ", APP_NAME), Style::default().fg(Color::Black).bg(Color::Cyan).bold()),
        Span::raw(" "),
        environment,
        running,
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn draw_sidebar(f: &mut Frame, state: &RenderState, area: Rect) {
    let focused = matches!(state.input_mode, InputMode::Browsing | InputMode::Executing);
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let items: Vec<ListItem> = state
        .rows
        .iter()
        .map(|sidebar_row| {
            let row = &sidebar_row.row;
            let mut spans = vec![Span::raw(tree_prefix(row.depth, row.kind, row.expanded, row.has_children))];
            match row.kind {
                courier_tui::collection::RowKind::Request(method) => {
                    spans.push(Span::styled(
                        format!("{:<4.4} ", method.as_str()),
                        Style::default().fg(method_color(method)),
                    ));
                    spans.push(Span::raw(row.name.clone()));
                }
                _ => spans.push(Span::styled(row.name.clone(), Style::default().bold())),
            }
            if sidebar_row.in_flight {
                spans.push(Span::styled(" ⟳", Style::default().fg(Color::Yellow)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(" Collections "),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).bold());

    let mut list_state = ListState::default();
    if !state.rows.is_empty() {
        list_state.select(Some(state.selected));
    }
    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_welcome(f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(format!(" {} {}", APP_NAME, APP_VERSION), Style::default().bold())),
        Line::from(""),
        Line::from(" Enter  open a request or folder"),
        Line::from(" r      run the selected request"),
        Line::from(" e      edit it, E edit the environment"),
        Line::from(" ?      all shortcuts"),
    ];
    let block = Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray));
    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_editor(f: &mut Frame, editor: &EditorView, area: Rect) {
    let mut title = vec![Span::raw(format!(" {} ", editor.title))];
    if let Some(method) = editor.method {
        title.push(Span::styled(
            format!("[{}] ", method.as_str()),
            Style::default().fg(method_color(method)).bold(),
        ));
    }
    if let Some(auth) = editor.auth {
        title.push(Span::styled(format!("[auth: {}] ", auth), Style::default().fg(Color::Magenta)));
    }

    let label_width = editor.rows.iter().map(|r| r.label.chars().count()).max().unwrap_or(0);
    let mut lines = Vec::new();
    for row in &editor.rows {
        let label_style = if row.focused {
            Style::default().fg(Color::Cyan).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        let value_style = if row.enabled {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray).crossed_out()
        };
        let label = Span::styled(format!(" {:<width$} ", row.label, width = label_width), label_style);

        let value_lines: Vec<&str> = if row.value.is_empty() {
            vec![""]
        } else {
            row.value.split('\n').collect()
        };
        for (i, part) in value_lines.iter().enumerate() {
            let prefix = if i == 0 {
                label.clone()
            } else {
                Span::raw(" ".repeat(label_width + 2))
            };
            lines.push(Line::from(vec![prefix, Span::styled(part.to_string(), value_style)]));
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(Line::from(title))
        .title_bottom(Line::from(" Ctrl+S:save  Esc:cancel ").right_aligned());
    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

fn draw_executing(f: &mut Frame, executing: &ExecutingView, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(
                format!(" {} ", executing.method.as_str()),
                Style::default().fg(method_color(executing.method)).bold(),
            ),
            Span::raw(executing.request_name.clone()),
        ]),
        Line::from(""),
        Line::from(format!(" Running... {} bytes received", executing.bytes_received)),
        Line::from(""),
        Line::from(Span::styled(
            " Esc:cancel  arrows:keep browsing while it runs",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Executing ");
    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_response(f: &mut Frame, view: &ResponseView, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();

    if let Some(error) = &view.error {
        lines.push(Line::from(Span::styled(format!(" {}", error), Style::default().fg(Color::Red))));
        lines.push(Line::from(""));
    }

    let (title, footer) = match &view.entry {
        None => {
            if view.error.is_none() {
                lines.push(Line::from(" No history yet. Press r to run this request."));
            }
            (Span::raw(format!(" {} ", view.request_name)), String::new())
        }
        Some(entry) => {
            let footer = format!(
                " {}/{}  {}  {}ms ",
                view.position + 1,
                view.total,
                entry.timestamp().format("%Y-%m-%d %H:%M:%S"),
                entry.elapsed().as_millis()
            );
            let snapshot = &entry.snapshot;
            lines.push(Line::from(vec![
                Span::styled(
                    format!(" {} ", snapshot.method.as_str()),
                    Style::default().fg(method_color(snapshot.method)).bold(),
                ),
                Span::raw(snapshot.url.clone()),
            ]));
            lines.push(Line::from(""));

            if let Some(curl) = &view.curl {
                lines.extend(curl.lines().map(|l| Line::from(l.to_string())));
                (Span::raw(format!(" {} - cURL ", view.request_name)), footer)
            } else {
                let title = match &entry.outcome {
                    Outcome::Response(record) => {
                        for (name, value) in &record.headers {
                            lines.push(Line::from(vec![
                                Span::styled(format!(" {}: ", name), Style::default().fg(Color::Cyan)),
                                Span::raw(value.clone()),
                            ]));
                        }
                        lines.push(Line::from(""));
                        let body = record.display_body();
                        match record.body_kind {
                            BodyKind::Json => lines.extend(highlight_json(&body)),
                            _ => lines.extend(body.lines().map(|l| Line::from(l.to_string()))),
                        }
                        Span::styled(
                            format!(" {} - {} ", view.request_name, record.status),
                            Style::default().fg(status_color(record.status)).bold(),
                        )
                    }
                    Outcome::Failed(failure) => {
                        lines.push(Line::from(Span::styled(
                            format!(" {}", failure.error),
                            Style::default().fg(Color::Red),
                        )));
                        Span::styled(
                            format!(" {} - failed ", view.request_name),
                            Style::default().fg(Color::Red).bold(),
                        )
                    }
                };
                (title, footer)
            }
        }
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title)
        .title_bottom(Line::from(footer).right_aligned());

    let response = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((view.scroll, 0));
    f.render_widget(response, area);
}

fn draw_status_bar(f: &mut Frame, state: &RenderState, area: Rect) {
    let hint = match state.input_mode {
        InputMode::Browsing => " Enter:open  r:run  e:edit  n:new  d:delete  v:env  ?:help  q:quit ",
        InputMode::Editing { .. } => " Tab:next field  Ctrl+T:method  Ctrl+A:auth  Ctrl+R:add row  Ctrl+S:save  Esc:cancel ",
        InputMode::Executing => " Esc:cancel  arrows:browse ",
        InputMode::Viewing => " [/]:history  c:cURL  r:run again  e:edit  Esc:back ",
    };

    let line = match &state.notice {
        Some(notice) => Line::from(vec![
            Span::styled(format!(" {} ", notice), Style::default().fg(Color::Yellow)),
            Span::styled(hint, Style::default().fg(Color::DarkGray)),
        ]),
        None => Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_help_popup(f: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 80, area);

    let help_text = r#"
 COURIER - Keyboard Shortcuts

 COLLECTIONS
   j / k, arrows      Move selection
   g / G              First / last row
   Enter / l          Open folder or view request
   h / Left           Collapse / go to parent
   n / f / N          New request / folder / collection
   d                  Delete selection (recursive)
   i                  Import cURL command

 REQUESTS
   r / s              Run (several can run at once)
   Esc / Ctrl+X       Cancel the focused run
   e                  Edit request or folder variables
   [ / ]              Older / newer history entry
   c                  Toggle cURL export

 ENVIRONMENTS
   v                  Cycle active environment
   E                  Edit active environment

 EDITOR
   Tab / Shift+Tab    Next / previous field
   Ctrl+T / Ctrl+A    Cycle method / auth
   Ctrl+R / Ctrl+P    Add row / query param
   Ctrl+D / Ctrl+K    Delete / toggle row
   Ctrl+S             Save

 GENERAL
   Ctrl+B             Toggle sidebar
   ?                  Toggle this help
   q / Ctrl+C         Quit

 Press any key to close...
"#;

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .style(Style::default().bg(Color::Black));

    let help = Paragraph::new(help_text).block(block).wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(help, popup_area);
}

fn draw_curl_import_popup(f: &mut Frame, buffer: &str, area: Rect) {
    let popup_area = centered_rect(80, 30, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Import cURL (Enter to import, Esc to cancel) ")
        .style(Style::default().bg(Color::Black));

    let content = if buffer.is_empty() {
        "Paste cURL command here..."
    } else {
        buffer
    };

    let input = Paragraph::new(content).block(block).wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(input, popup_area);
}
