//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{App, AppState, Tab, PAGE_SCROLL_SIZE};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.close_overlay();
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.quit();
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.close_overlay(),
                _ => {}
            }
            return Ok(false);
        }
        AppState::CheckingSession => {
            if key.code == KeyCode::Char('q') {
                app.open_overlay(AppState::ConfirmingQuit);
            }
            return Ok(false);
        }
        AppState::Authenticating => {
            match key.code {
                KeyCode::Esc => app.cancel_login(),
                KeyCode::Char('q') => app.open_overlay(AppState::ConfirmingQuit),
                _ => {}
            }
            return Ok(false);
        }
        AppState::SignedOut => {
            match key.code {
                KeyCode::Enter | KeyCode::Char('l') => app.start_login(),
                KeyCode::Char('q') => app.open_overlay(AppState::ConfirmingQuit),
                KeyCode::Char('?') => app.open_overlay(AppState::ShowingHelp),
                _ => {}
            }
            return Ok(false);
        }
        AppState::NamingTemplate => {
            handle_name_input(app, key);
            return Ok(false);
        }
        AppState::ConfirmingOverwrite | AppState::ConfirmingDelete => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    if app.state == AppState::ConfirmingOverwrite {
                        app.confirm_overwrite();
                    } else {
                        app.confirm_delete();
                    }
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.cancel_confirmation()
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::Quitting => return Ok(true),
        AppState::Normal => {}
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.open_overlay(AppState::ConfirmingQuit);
            return Ok(false);
        }
        KeyCode::Char('?') => {
            app.open_overlay(AppState::ShowingHelp);
            return Ok(false);
        }
        KeyCode::Char('L') => {
            app.logout();
            return Ok(false);
        }
        KeyCode::Char(c @ '1'..='4') => {
            let index = c as usize - '1' as usize;
            app.current_tab = Tab::ALL[index];
            return Ok(false);
        }
        KeyCode::Left | KeyCode::BackTab => {
            app.current_tab = app.current_tab.prev();
            return Ok(false);
        }
        KeyCode::Right | KeyCode::Tab => {
            app.current_tab = app.current_tab.next();
            return Ok(false);
        }
        KeyCode::Up | KeyCode::Char('k') => {
            app.move_selection(-1);
            return Ok(false);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            app.move_selection(1);
            return Ok(false);
        }
        KeyCode::PageUp => {
            app.move_selection(-(PAGE_SCROLL_SIZE as isize));
            return Ok(false);
        }
        KeyCode::PageDown => {
            app.move_selection(PAGE_SCROLL_SIZE as isize);
            return Ok(false);
        }
        KeyCode::Home => {
            app.select_first();
            return Ok(false);
        }
        KeyCode::End => {
            app.select_last();
            return Ok(false);
        }
        _ => {}
    }

    match app.current_tab {
        Tab::Repositories => handle_repositories_input(app, key),
        Tab::Templates => handle_templates_input(app, key),
        Tab::History => handle_history_input(app, key),
        Tab::Local => handle_local_input(app, key),
    }
    Ok(false)
}

fn handle_repositories_input(app: &mut App, key: KeyEvent) {
    if app.browser.is_some() {
        match key.code {
            KeyCode::Enter => app.open_selected_item(),
            KeyCode::Esc | KeyCode::Backspace => app.browse_up(),
            KeyCode::Char('d') => app.download_selected(),
            _ => {}
        }
    } else {
        match key.code {
            KeyCode::Enter => app.open_selected_repository(),
            KeyCode::Char('r') => app.refresh_repositories(),
            _ => {}
        }
    }
}

fn handle_templates_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.apply_selected_template(),
        KeyCode::Char('x') => app.delete_selected_template(),
        KeyCode::Char('r') => app.reload_templates(),
        _ => {}
    }
}

fn handle_history_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.redownload_selected_history(),
        KeyCode::Char('c') => app.clear_history(),
        KeyCode::Char('r') => app.reload_history(),
        _ => {}
    }
}

fn handle_local_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.open_selected_local(),
        KeyCode::Backspace => {
            if app.local_entries.first().is_some_and(|e| e.is_parent_link()) {
                app.local_selection = 0;
                app.open_selected_local();
            }
        }
        KeyCode::Char('r') => app.begin_template_registration(),
        _ => {}
    }
}

fn handle_name_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.confirm_template_registration(),
        KeyCode::Esc => app.cancel_template_registration(),
        KeyCode::Backspace => {
            app.template_name_input.pop();
        }
        KeyCode::Char(c) => app.push_template_name_char(c),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copit_core::config::Config;
    use crossterm::event::KeyModifiers;
    use tempfile::TempDir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app(dir: &TempDir) -> App {
        App::with_paths(
            Config::default(),
            dir.path().join("credentials.json"),
            None,
            dir.path().join("data"),
            dir.path().to_path_buf(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_number_keys_switch_tabs() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        app.state = AppState::Normal;

        handle_input(&mut app, key(KeyCode::Char('3'))).unwrap();
        assert_eq!(app.current_tab, Tab::History);

        handle_input(&mut app, key(KeyCode::Tab)).unwrap();
        assert_eq!(app.current_tab, Tab::Local);
    }

    #[tokio::test]
    async fn test_quit_requires_confirmation() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        app.state = AppState::Normal;

        assert!(!handle_input(&mut app, key(KeyCode::Char('q'))).unwrap());
        assert_eq!(app.state, AppState::ConfirmingQuit);

        assert!(!handle_input(&mut app, key(KeyCode::Char('n'))).unwrap());
        assert_eq!(app.state, AppState::Normal);

        handle_input(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert!(handle_input(&mut app, key(KeyCode::Char('y'))).unwrap());
        assert_eq!(app.state, AppState::Quitting);
    }

    #[tokio::test]
    async fn test_name_input_editing() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        app.state = AppState::NamingTemplate;

        for c in "CIx".chars() {
            handle_input(&mut app, key(KeyCode::Char(c))).unwrap();
        }
        handle_input(&mut app, key(KeyCode::Backspace)).unwrap();
        assert_eq!(app.template_name_input, "CI");

        handle_input(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.state, AppState::Normal);
        assert!(app.template_name_input.is_empty());
    }

    #[tokio::test]
    async fn test_help_overlay_closes_back_to_signed_out() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        app.state = AppState::SignedOut;

        handle_input(&mut app, key(KeyCode::Char('?'))).unwrap();
        assert_eq!(app.state, AppState::ShowingHelp);

        handle_input(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.state, AppState::SignedOut);
    }

    #[tokio::test]
    async fn test_delete_prompt_keys() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        let source = dir.path().join("ci.yml");
        std::fs::write(&source, "on: push").unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        copit_core::store::TemplateStore::new(dir.path().join("data"))
            .register(&source, "ci.yml", "CI", None)
            .unwrap();
        app.reload_templates();
        app.state = AppState::Normal;
        app.current_tab = Tab::Templates;

        handle_input(&mut app, key(KeyCode::Char('x'))).unwrap();
        assert_eq!(app.state, AppState::ConfirmingDelete);
        // Navigation keys are swallowed by the prompt.
        handle_input(&mut app, key(KeyCode::Char('2'))).unwrap();
        assert_eq!(app.state, AppState::ConfirmingDelete);
        handle_input(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.templates.len(), 1);

        handle_input(&mut app, key(KeyCode::Char('x'))).unwrap();
        handle_input(&mut app, key(KeyCode::Char('y'))).unwrap();
        assert_eq!(app.state, AppState::Normal);
        assert!(app.templates.is_empty());
    }
}
