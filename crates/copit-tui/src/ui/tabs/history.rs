use ratatui::{
    layout::{Constraint, Rect},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::ui::styles;

use super::list_block;

/// Render the History tab, newest download first.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!(" Recent downloads ({}) - [Enter] download again [c]lear ", app.history.len());

    if app.history.is_empty() {
        let paragraph = Paragraph::new(" Nothing downloaded yet.")
            .style(styles::muted_style())
            .block(list_block(title));
        frame.render_widget(paragraph, area);
        return;
    }

    let rows: Vec<Row> = app
        .history
        .iter()
        .map(|h| {
            Row::new(vec![
                Cell::from(h.file_path.clone()),
                Cell::from(h.repository_name.clone()).style(styles::highlight_style()),
                Cell::from(h.age_display()).style(styles::muted_style()),
            ])
            .style(styles::list_item_style())
        })
        .collect();

    let widths = [
        Constraint::Fill(1),
        Constraint::Percentage(30),
        Constraint::Length(9),
    ];

    let table = Table::new(rows, widths)
        .block(list_block(title))
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.history_selection));
    frame.render_stateful_widget(table, area, &mut state);
}
