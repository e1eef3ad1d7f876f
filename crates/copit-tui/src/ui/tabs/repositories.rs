use ratatui::{
    layout::{Constraint, Rect},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::{App, RepoBrowser};
use crate::ui::styles;

use super::list_block;

/// Render the Repositories tab: the repository list, or the directory
/// browser once a repository is opened.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    match app.browser {
        Some(ref browser) => render_browser(frame, browser, area),
        None => render_repo_list(frame, app, area),
    }
}

fn render_repo_list(frame: &mut Frame, app: &App, area: Rect) {
    let title = match app.credential {
        Some(ref c) => format!(" {}'s repositories ({}) ", c.username, app.repositories.len()),
        None => " Repositories ".to_string(),
    };

    if app.repositories.is_empty() {
        let text = if app.repos_loading {
            "Loading repositories..."
        } else if app.credential.is_none() {
            "Not signed in."
        } else {
            "No repositories."
        };
        let paragraph = Paragraph::new(format!(" {}", text))
            .style(styles::muted_style())
            .block(list_block(title));
        frame.render_widget(paragraph, area);
        return;
    }

    let rows: Vec<Row> = app
        .repositories
        .iter()
        .map(|repo| {
            let visibility = if repo.private { "private" } else { "public" };
            Row::new(vec![
                Cell::from(repo.full_name.clone()),
                Cell::from(visibility).style(styles::muted_style()),
                Cell::from(repo.description_display().to_string()).style(styles::muted_style()),
            ])
            .style(styles::list_item_style())
        })
        .collect();

    let widths = [
        Constraint::Percentage(35),
        Constraint::Length(8),
        Constraint::Fill(1),
    ];

    let table = Table::new(rows, widths)
        .block(list_block(title))
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.repo_selection));
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_browser(frame: &mut Frame, browser: &RepoBrowser, area: Rect) {
    let location = if browser.path.is_empty() {
        browser.repo.full_name.clone()
    } else {
        format!("{}/{}", browser.repo.full_name, browser.path)
    };
    let title = format!(" {} - [Enter] open [d]ownload [Esc] back ", location);

    if browser.loading && browser.items.is_empty() {
        let paragraph = Paragraph::new(" Loading...")
            .style(styles::muted_style())
            .block(list_block(title));
        frame.render_widget(paragraph, area);
        return;
    }

    let rows: Vec<Row> = browser
        .items
        .iter()
        .map(|item| {
            let (name, style) = if item.is_dir() {
                (format!("{}/", item.name), styles::dir_style())
            } else {
                (item.name.clone(), styles::list_item_style())
            };
            Row::new(vec![
                Cell::from(name).style(style),
                Cell::from(format!("{:>10}", item.size_display())).style(styles::muted_style()),
            ])
        })
        .collect();

    let widths = [Constraint::Fill(1), Constraint::Length(11)];

    let table = Table::new(rows, widths)
        .block(list_block(title))
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(browser.selection));
    frame.render_stateful_widget(table, area, &mut state);
}
