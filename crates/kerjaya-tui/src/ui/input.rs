//! Keyboard and mouse input handling for the TUI.
//!
//! Key presses, mouse movement and left clicks are also what keeps the
//! session alive: `activity_for` maps them onto the idle countdown's events.

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEventKind};
use kerjaya_core::ActivityEvent;

use crate::app::{
    can_add_email_char, can_add_password_char, can_add_path_char, can_add_username_char, App,
    AppState, LoginFocus, Tab, ToolKind,
};

/// Which terminal events count as user activity.
pub fn activity_for(event: &Event) -> Option<ActivityEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(ActivityEvent::KeyPress),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => Some(ActivityEvent::PointerMove),
            MouseEventKind::Down(MouseButton::Left) => Some(ActivityEvent::PrimaryClick),
            _ => None,
        },
        _ => None,
    }
}

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    if key.kind != KeyEventKind::Press {
        return Ok(false);
    }

    match app.state {
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::EnteringPath(_) => {
            handle_path_input(app, key);
            return Ok(false);
        }
        AppState::Normal | AppState::Quitting => {}
    }

    // Any key dismisses a transient status such as the expiry notice
    if app.status_message.is_some() && key.code != KeyCode::Esc {
        app.status_message = None;
    }

    if !app.is_authenticated() {
        return Ok(handle_login_input(app, key));
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('1') => app.switch_tab(Tab::Dashboard),
        KeyCode::Char('2') => app.switch_tab(Tab::Profile),
        KeyCode::Char('3') => app.switch_tab(Tab::Results),
        KeyCode::Char('l') => app.logout(),
        _ => match app.current_tab {
            Tab::Dashboard => handle_dashboard_input(app, key),
            Tab::Profile => handle_profile_input(app, key),
            Tab::Results => {}
        },
    }
    Ok(false)
}

fn handle_dashboard_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('h') => app.begin_upload(ToolKind::HealthCheck),
        KeyCode::Char('a') => app.begin_upload(ToolKind::AtsScan),
        KeyCode::Char('f') => app.switch_tab(Tab::Profile),
        _ => {}
    }
}

fn handle_profile_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('r') => {
            app.profile = None;
            app.fetch_profile();
        }
        KeyCode::Up | KeyCode::Char('k') => app.move_resume_selection(false),
        KeyCode::Down | KeyCode::Char('j') => app.move_resume_selection(true),
        KeyCode::Char('t') => app.run_on_selected(ToolKind::AtsRescan),
        KeyCode::Char('m') => app.run_on_selected(ToolKind::InternshipMatch),
        _ => {}
    }
}

fn handle_path_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.state = AppState::Normal,
        KeyCode::Enter => app.submit_path(),
        KeyCode::Backspace => {
            app.path_input.pop();
        }
        KeyCode::Char(c) => {
            if can_add_path_char(app.path_input.chars().count(), c) {
                app.path_input.push(c);
            }
        }
        _ => {}
    }
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => {
            app.state = AppState::Quitting;
            return true;
        }
        KeyCode::Down | KeyCode::Tab => app.cycle_focus(true),
        KeyCode::Up | KeyCode::BackTab => app.cycle_focus(false),
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username | LoginFocus::Email => app.cycle_focus(true),
            LoginFocus::Password | LoginFocus::Button => app.submit_form(),
            LoginFocus::Switch => app.toggle_auth_mode(),
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_username.pop();
            }
            LoginFocus::Email => {
                app.login_email.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button | LoginFocus::Switch => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_username_char(app.login_username.chars().count(), c) {
                    app.login_username.push(c);
                }
            }
            LoginFocus::Email => {
                if can_add_email_char(app.login_email.chars().count(), c) {
                    app.login_email.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button | LoginFocus::Switch => {}
        },
        _ => {}
    }
    false
}
