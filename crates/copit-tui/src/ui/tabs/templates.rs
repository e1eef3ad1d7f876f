use ratatui::{
    layout::{Constraint, Rect},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::ui::styles;

use super::{list_block, render_preview, split_for_preview};

/// Render the Templates tab.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!(
        " Templates ({}) - [Enter] apply to {} [x] delete ",
        app.templates.len(),
        app.working_dir.display()
    );

    if app.templates.is_empty() {
        let paragraph = Paragraph::new(" No templates yet. Register one from the Local tab with [r].")
            .style(styles::muted_style())
            .block(list_block(title));
        frame.render_widget(paragraph, area);
        return;
    }

    let rows: Vec<Row> = app
        .templates
        .iter()
        .map(|t| {
            Row::new(vec![
                Cell::from(t.name.clone()),
                Cell::from(t.relative_path.clone()).style(styles::highlight_style()),
                Cell::from(t.registered_at.format("%Y-%m-%d").to_string())
                    .style(styles::muted_style()),
            ])
            .style(styles::list_item_style())
        })
        .collect();

    let widths = [
        Constraint::Percentage(35),
        Constraint::Fill(1),
        Constraint::Length(10),
    ];

    let table = Table::new(rows, widths)
        .block(list_block(title))
        .row_highlight_style(styles::selected_style());

    let (list_area, preview_area) = split_for_preview(app, area);
    let mut state = TableState::default();
    state.select(Some(app.template_selection));
    frame.render_stateful_widget(table, list_area, &mut state);
    if let Some(preview_area) = preview_area {
        render_preview(frame, app, preview_area);
    }
}
