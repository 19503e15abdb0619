//! UI events - messages from UI layer to App layer

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Events generated from user input in the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    // Tree navigation
    CursorUp,
    CursorDown,
    CursorHome,
    CursorEnd,
    /// Expand/collapse a container, or view a request
    Select,
    /// Collapse, go to parent, or leave the current view
    Back,

    // Tree actions
    EditSelected,
    EditEnvironment,
    Run,
    NewRequest,
    NewFolder,
    NewCollection,
    DeleteSelected,
    CycleEnvironment,

    // Editing
    CharInput(char),
    Backspace,
    CursorLeft,
    CursorRight,
    NextField,
    PrevField,
    CycleMethod,
    CycleAuth,
    AddRow,
    AddQueryParam,
    DeleteRow,
    ToggleRow,
    Save,
    CancelEdit,

    // Executing
    CancelRun,

    // Viewing
    ScrollUp,
    ScrollDown,
    HistoryOlder,
    HistoryNewer,
    ToggleCurl,

    // cURL import
    ShowCurlImport,
    CurlImportChar(char),
    CurlImportBackspace,
    ImportCurl,
    CancelCurlImport,

    // Layout and popups
    ToggleSidebar,
    ToggleHelp,
    CloseHelp,

    // System
    Quit,
}

/// Which key map applies
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum InputMode {
    #[default]
    Browsing,
    /// `multiline` when the focused field takes newlines (the body)
    Editing { multiline: bool },
    Executing,
    Viewing,
}

/// Convert a key event to a UiEvent based on current UI context
pub fn key_to_ui_event(
    key: KeyEvent,
    mode: InputMode,
    show_help: bool,
    show_curl_import: bool,
) -> Option<UiEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    if ctrl && key.code == KeyCode::Char('c') {
        return Some(UiEvent::Quit);
    }

    // Handle popups first
    if show_help {
        return Some(UiEvent::CloseHelp);
    }

    if show_curl_import {
        return match key.code {
            KeyCode::Esc => Some(UiEvent::CancelCurlImport),
            KeyCode::Enter => Some(UiEvent::ImportCurl),
            KeyCode::Backspace => Some(UiEvent::CurlImportBackspace),
            KeyCode::Char(c) if !ctrl => Some(UiEvent::CurlImportChar(c)),
            _ => None,
        };
    }

    match mode {
        InputMode::Editing { multiline } => editing_keys(key, ctrl, multiline),
        _ if ctrl => match key.code {
            KeyCode::Char('b') => Some(UiEvent::ToggleSidebar),
            KeyCode::Char('x') if mode == InputMode::Executing => Some(UiEvent::CancelRun),
            _ => None,
        },
        InputMode::Browsing => browsing_keys(key),
        InputMode::Executing => executing_keys(key),
        InputMode::Viewing => viewing_keys(key),
    }
}

fn browsing_keys(key: KeyEvent) -> Option<UiEvent> {
    match key.code {
        KeyCode::Char('q') => Some(UiEvent::Quit),
        KeyCode::Char('?') => Some(UiEvent::ToggleHelp),
        KeyCode::Up | KeyCode::Char('k') => Some(UiEvent::CursorUp),
        KeyCode::Down | KeyCode::Char('j') => Some(UiEvent::CursorDown),
        KeyCode::Home | KeyCode::Char('g') => Some(UiEvent::CursorHome),
        KeyCode::End | KeyCode::Char('G') => Some(UiEvent::CursorEnd),
        KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => Some(UiEvent::Select),
        KeyCode::Left | KeyCode::Char('h') => Some(UiEvent::Back),
        KeyCode::Char('e') => Some(UiEvent::EditSelected),
        KeyCode::Char('E') => Some(UiEvent::EditEnvironment),
        KeyCode::Char('r') | KeyCode::Char('s') => Some(UiEvent::Run),
        KeyCode::Char('n') => Some(UiEvent::NewRequest),
        KeyCode::Char('f') => Some(UiEvent::NewFolder),
        KeyCode::Char('N') => Some(UiEvent::NewCollection),
        KeyCode::Char('d') | KeyCode::Delete => Some(UiEvent::DeleteSelected),
        KeyCode::Char('v') => Some(UiEvent::CycleEnvironment),
        KeyCode::Char('i') => Some(UiEvent::ShowCurlImport),
        _ => None,
    }
}

fn editing_keys(key: KeyEvent, ctrl: bool, multiline: bool) -> Option<UiEvent> {
    if ctrl {
        return match key.code {
            KeyCode::Char('s') => Some(UiEvent::Save),
            KeyCode::Char('t') => Some(UiEvent::CycleMethod),
            KeyCode::Char('a') => Some(UiEvent::CycleAuth),
            KeyCode::Char('r') => Some(UiEvent::AddRow),
            KeyCode::Char('p') => Some(UiEvent::AddQueryParam),
            KeyCode::Char('d') => Some(UiEvent::DeleteRow),
            KeyCode::Char('k') => Some(UiEvent::ToggleRow),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Esc => Some(UiEvent::CancelEdit),
        KeyCode::Tab | KeyCode::Down => Some(UiEvent::NextField),
        KeyCode::BackTab | KeyCode::Up => Some(UiEvent::PrevField),
        KeyCode::Left => Some(UiEvent::CursorLeft),
        KeyCode::Right => Some(UiEvent::CursorRight),
        KeyCode::Backspace => Some(UiEvent::Backspace),
        KeyCode::Enter if multiline => Some(UiEvent::CharInput('\n')),
        KeyCode::Enter => Some(UiEvent::NextField),
        KeyCode::Char(c) => Some(UiEvent::CharInput(c)),
        _ => None,
    }
}

/// Navigation detaches from the running request; Esc cancels it
fn executing_keys(key: KeyEvent) -> Option<UiEvent> {
    match key.code {
        KeyCode::Esc => Some(UiEvent::CancelRun),
        KeyCode::Char('q') => Some(UiEvent::Quit),
        KeyCode::Char('?') => Some(UiEvent::ToggleHelp),
        KeyCode::Up | KeyCode::Char('k') => Some(UiEvent::CursorUp),
        KeyCode::Down | KeyCode::Char('j') => Some(UiEvent::CursorDown),
        KeyCode::Left | KeyCode::Char('h') => Some(UiEvent::Back),
        KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => Some(UiEvent::Select),
        _ => None,
    }
}

fn viewing_keys(key: KeyEvent) -> Option<UiEvent> {
    match key.code {
        KeyCode::Char('q') => Some(UiEvent::Quit),
        KeyCode::Char('?') => Some(UiEvent::ToggleHelp),
        KeyCode::Esc | KeyCode::Left | KeyCode::Char('h') => Some(UiEvent::Back),
        KeyCode::Up | KeyCode::Char('k') => Some(UiEvent::ScrollUp),
        KeyCode::Down | KeyCode::Char('j') => Some(UiEvent::ScrollDown),
        KeyCode::Char('[') => Some(UiEvent::HistoryOlder),
        KeyCode::Char(']') => Some(UiEvent::HistoryNewer),
        KeyCode::Char('r') | KeyCode::Char('s') => Some(UiEvent::Run),
        KeyCode::Char('e') => Some(UiEvent::EditSelected),
        KeyCode::Char('c') => Some(UiEvent::ToggleCurl),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_ctrl_c_always_quits() {
        for mode in [
            InputMode::Browsing,
            InputMode::Editing { multiline: false },
            InputMode::Executing,
            InputMode::Viewing,
        ] {
            assert_eq!(key_to_ui_event(ctrl('c'), mode, false, false), Some(UiEvent::Quit));
        }
        assert_eq!(key_to_ui_event(ctrl('c'), InputMode::Browsing, true, true), Some(UiEvent::Quit));
    }

    #[test]
    fn test_popups_capture_keys() {
        assert_eq!(
            key_to_ui_event(key(KeyCode::Char('q')), InputMode::Browsing, true, false),
            Some(UiEvent::CloseHelp)
        );
        assert_eq!(
            key_to_ui_event(key(KeyCode::Char('q')), InputMode::Browsing, false, true),
            Some(UiEvent::CurlImportChar('q'))
        );
    }

    #[test]
    fn test_editing_keys() {
        let editing = InputMode::Editing { multiline: false };
        assert_eq!(key_to_ui_event(key(KeyCode::Char('q')), editing, false, false), Some(UiEvent::CharInput('q')));
        assert_eq!(key_to_ui_event(ctrl('s'), editing, false, false), Some(UiEvent::Save));
        assert_eq!(key_to_ui_event(key(KeyCode::Esc), editing, false, false), Some(UiEvent::CancelEdit));
        assert_eq!(key_to_ui_event(key(KeyCode::Enter), editing, false, false), Some(UiEvent::NextField));
        assert_eq!(
            key_to_ui_event(key(KeyCode::Enter), InputMode::Editing { multiline: true }, false, false),
            Some(UiEvent::CharInput('\n'))
        );
    }

    #[test]
    fn test_executing_keys() {
        assert_eq!(key_to_ui_event(key(KeyCode::Esc), InputMode::Executing, false, false), Some(UiEvent::CancelRun));
        assert_eq!(key_to_ui_event(ctrl('x'), InputMode::Executing, false, false), Some(UiEvent::CancelRun));
        assert_eq!(key_to_ui_event(key(KeyCode::Down), InputMode::Executing, false, false), Some(UiEvent::CursorDown));
        assert_eq!(key_to_ui_event(ctrl('x'), InputMode::Browsing, false, false), None);
    }

    #[test]
    fn test_viewing_keys() {
        assert_eq!(key_to_ui_event(key(KeyCode::Char('[')), InputMode::Viewing, false, false), Some(UiEvent::HistoryOlder));
        assert_eq!(key_to_ui_event(key(KeyCode::Esc), InputMode::Viewing, false, false), Some(UiEvent::Back));
        assert_eq!(key_to_ui_event(ctrl('b'), InputMode::Viewing, false, false), Some(UiEvent::ToggleSidebar));
    }

    #[test]
    fn test_release_events_are_ignored() {
        let mut release = key(KeyCode::Char('q'));
        release.kind = KeyEventKind::Release;
        assert_eq!(key_to_ui_event(release, InputMode::Browsing, false, false), None);
    }
}
