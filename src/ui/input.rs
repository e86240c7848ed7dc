//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{App, AppState, LoginFocus, Tab};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    if matches!(app.state, AppState::LoggingIn) {
        return handle_login_input(app, key).await;
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => app.state = AppState::Quitting,
            _ => app.state = AppState::Normal,
        }
        return Ok(false);
    }

    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('1') => {
            app.current_tab = Tab::Dashboard;
        }
        KeyCode::Char('2') => {
            app.current_tab = Tab::Orders;
        }
        KeyCode::Char('r') => {
            app.spawn_refresh();
        }
        KeyCode::Char('L') => {
            app.logout();
        }
        KeyCode::Up | KeyCode::Char('k') => {
            if app.current_tab == Tab::Orders {
                app.orders_selection = app.orders_selection.saturating_sub(1);
            }
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if app.current_tab == Tab::Orders && !app.orders.is_empty() {
                app.orders_selection = (app.orders_selection + 1).min(app.orders.len() - 1);
            }
        }
        _ => {}
    }

    Ok(false)
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Only an authenticated user can dismiss the login screen
            if app.session.is_authenticated() {
                app.state = AppState::Normal;
            }
        }
        KeyCode::Tab | KeyCode::Down => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Username,
            };
        }
        KeyCode::BackTab | KeyCode::Up => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Username,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => {
                // Errors surface through login_error; stay on the form
                let _ = app.attempt_login().await;
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_username.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => app.login_username.push(c),
            LoginFocus::Password => app.login_password.push(c),
            LoginFocus::Button => {}
        },
        _ => {}
    }

    Ok(false)
}
