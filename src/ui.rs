//! Rendering helpers shared by the draw functions

use ratatui::prelude::*;

use crate::collection::RowKind;
use crate::models::HttpMethod;

/// Simple JSON syntax highlighting, one `Line` per input line
pub fn highlight_json(text: &str) -> Vec<Line<'static>> {
    text.lines().map(highlight_json_line).collect()
}

fn highlight_json_line(line: &str) -> Line<'static> {
    let mut spans = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();

    let flush = |current: &mut String, spans: &mut Vec<Span<'static>>| {
        if current.is_empty() {
            return;
        }
        let word = std::mem::take(current);
        let style = match word.trim() {
            "true" | "false" | "null" => Style::default().fg(Color::Magenta),
            w if !w.is_empty() && w.parse::<f64>().is_ok() => Style::default().fg(Color::Yellow),
            _ => Style::default(),
        };
        spans.push(Span::styled(word, style));
    };

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                flush(&mut current, &mut spans);
                let mut string = String::from('"');
                let mut escaped = false;
                for s in chars.by_ref() {
                    string.push(s);
                    if escaped {
                        escaped = false;
                    } else if s == '\\' {
                        escaped = true;
                    } else if s == '"' {
                        break;
                    }
                }
                // A string followed by ':' is an object key
                let rest: String = chars.clone().collect();
                let color = if rest.trim_start().starts_with(':') {
                    Color::Cyan
                } else {
                    Color::Green
                };
                spans.push(Span::styled(string, Style::default().fg(color)));
            }
            '{' | '}' | '[' | ']' => {
                flush(&mut current, &mut spans);
                spans.push(Span::styled(c.to_string(), Style::default().fg(Color::Yellow)));
            }
            ':' | ',' => {
                flush(&mut current, &mut spans);
                spans.push(Span::styled(c.to_string(), Style::default().fg(Color::White)));
            }
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut spans);

    Line::from(spans)
}

/// Status code color
pub fn status_color(code: u16) -> Color {
    match code {
        200..=299 => Color::Green,
        300..=399 => Color::Cyan,
        400..=499 => Color::Red,
        500..=599 => Color::Magenta,
        _ => Color::Yellow,
    }
}

/// Method color
pub fn method_color(method: HttpMethod) -> Color {
    match method {
        HttpMethod::GET => Color::Green,
        HttpMethod::POST => Color::Yellow,
        HttpMethod::PUT => Color::Blue,
        HttpMethod::PATCH => Color::Cyan,
        HttpMethod::DELETE => Color::Red,
        HttpMethod::HEAD | HttpMethod::OPTIONS => Color::White,
    }
}

/// Indentation and expander glyph for a sidebar row
pub fn tree_prefix(depth: usize, kind: RowKind, expanded: bool, has_children: bool) -> String {
    let indent = "  ".repeat(depth);
    let marker = match kind {
        RowKind::Request(_) => "  ",
        _ if !has_children => "· ",
        _ if expanded => "▾ ",
        _ => "▸ ",
    };
    format!("{}{}", indent, marker)
}

/// Rectangle centered in `r`, sized as a percentage of it
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fg_of<'a>(line: &'a Line<'static>, text: &str) -> Option<Color> {
        line.spans
            .iter()
            .find(|s| s.content.as_ref() == text)
            .and_then(|s| s.style.fg)
    }

    #[test]
    fn test_highlight_keys_and_values() {
        let lines = highlight_json("{\n  \"id\": 42,\n  \"ok\": true,\n  \"name\": \"a:b\"\n}");
        assert_eq!(lines.len(), 5);
        assert_eq!(fg_of(&lines[1], "\"id\""), Some(Color::Cyan));
        assert_eq!(fg_of(&lines[1], " 42"), Some(Color::Yellow));
        assert_eq!(fg_of(&lines[2], " true"), Some(Color::Magenta));
        assert_eq!(fg_of(&lines[3], "\"a:b\""), Some(Color::Green));
    }

    #[test]
    fn test_highlight_keeps_text() {
        let source = r#"  "esc\"aped": [1, "x"]"#;
        let lines = highlight_json(source);
        let rendered: String = lines[0].spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(rendered, source);
    }

    #[test]
    fn test_status_color() {
        assert_eq!(status_color(204), Color::Green);
        assert_eq!(status_color(404), Color::Red);
        assert_eq!(status_color(503), Color::Magenta);
    }

    #[test]
    fn test_tree_prefix() {
        assert_eq!(tree_prefix(0, RowKind::Collection, true, true), "▾ ");
        assert_eq!(tree_prefix(1, RowKind::Folder, false, true), "  ▸ ");
        assert_eq!(tree_prefix(2, RowKind::Request(HttpMethod::GET), false, false), "      ");
    }
}
