use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::host::ComposeItem;
use crate::taskpane::state::{AppState, Focus};
use crate::taskpane::{Taskpane, open_external_status};

/// Applies one key press. Returns true when the pane should close.
pub fn handle_key(key: KeyEvent, state: &mut AppState, pane: &Taskpane<'_>) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    match key.code {
        KeyCode::Esc => {
            if state.focus == Focus::Help {
                state.toggle_help();
                return false;
            }
            return true;
        }

        KeyCode::F(1) => {
            state.toggle_help();
            return false;
        }

        KeyCode::Enter => {
            let status = pane.lookup(&state.input);
            state.set_status(status);
            return false;
        }

        KeyCode::F(2) => {
            let item = state.draft.as_ref().map(|d| d as &dyn ComposeItem);
            let status = pane.apply(item, &state.input);
            state.set_status(status);
            return false;
        }

        KeyCode::F(3) => {
            if let Some(status) = open_external_status(&state.links.list_url) {
                state.set_status(status);
            }
            return false;
        }

        KeyCode::F(4) => {
            if let Some(status) = open_external_status(&state.links.new_item_url) {
                state.set_status(status);
            }
            return false;
        }

        _ => {}
    }

    if state.focus == Focus::Input {
        match key.code {
            KeyCode::Char(c) => state.push_char(c),
            KeyCode::Backspace => state.pop_char(),
            KeyCode::Delete => state.clear_input(),
            _ => {}
        }
    }
    false
}
