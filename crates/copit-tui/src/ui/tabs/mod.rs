//! One renderer per main tab.

pub mod history;
pub mod local;
pub mod repositories;
pub mod templates;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::Line,
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, PREVIEW_LINES};

use super::styles;

/// Bordered block with a muted title, shared by every tab's list.
fn list_block(title: String) -> Block<'static> {
    Block::default()
        .title(title)
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
}

/// Split a tab into its list and a preview pane below it. The pane is only
/// carved out when something is being previewed.
fn split_for_preview(app: &App, area: Rect) -> (Rect, Option<Rect>) {
    if app.preview.is_none() {
        return (area, None);
    }
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(PREVIEW_LINES as u16 + 2),
        ])
        .split(area);
    (chunks[0], Some(chunks[1]))
}

fn render_preview(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ref preview) = app.preview else {
        return;
    };
    let title = match preview.path.file_name() {
        Some(name) => format!(" Preview: {} ", name.to_string_lossy()),
        None => " Preview ".to_string(),
    };
    let width = area.width.saturating_sub(2) as usize;

    let lines: Vec<Line> = match preview.lines {
        Ok(ref lines) if lines.is_empty() => {
            vec![Line::styled("(empty file)", styles::muted_style())]
        }
        Ok(ref lines) => lines
            .iter()
            .map(|l| Line::styled(truncate_line(l, width), styles::muted_style()))
            .collect(),
        Err(ref e) => vec![Line::styled(format!("Error: {}", e), styles::error_style())],
    };

    let block = Block::default()
        .title(title)
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Cut a line to `max_width` chars, marking the cut with `...`.
fn truncate_line(line: &str, max_width: usize) -> String {
    if line.chars().count() <= max_width {
        return line.to_string();
    }
    let kept: String = line.chars().take(max_width.saturating_sub(3)).collect();
    format!("{}...", kept)
}
