use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{List, ListItem, ListState},
    Frame,
};

use crate::app::App;
use crate::ui::styles;

use super::{list_block, render_preview, split_for_preview};

/// Render the Local tab: the working tree, for picking template files.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!(
        " {} - [Enter] open [r]egister as template ",
        app.local_dir.display()
    );

    let items: Vec<ListItem> = app
        .local_entries
        .iter()
        .map(|entry| {
            let line = if entry.is_parent_link() {
                Line::from(Span::styled("..", styles::muted_style()))
            } else if entry.is_dir {
                Line::from(Span::styled(format!("{}/", entry.name), styles::dir_style()))
            } else {
                Line::from(Span::styled(entry.name.clone(), styles::list_item_style()))
            };
            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(list_block(title))
        .highlight_style(styles::selected_style());

    let (list_area, preview_area) = split_for_preview(app, area);
    let mut state = ListState::default();
    state.select(Some(app.local_selection));
    frame.render_stateful_widget(list, list_area, &mut state);
    if let Some(preview_area) = preview_area {
        render_preview(frame, app, preview_area);
    }
}
