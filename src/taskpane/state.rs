use crate::host::draft::DraftMessage;
use crate::taskpane::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Input,
    Help,
}

/// Links shown as task pane actions.
#[derive(Debug, Clone, Default)]
pub struct RegisterLinks {
    pub list_url: String,
    pub new_item_url: String,
}

pub struct AppState {
    pub input: String,
    pub status: Option<Status>,
    pub focus: Focus,

    /// The message the pane acts on, when running inside a host.
    pub draft: Option<DraftMessage>,
    pub links: RegisterLinks,
    /// Shown in the header: mode, host, version.
    pub debug_info: String,
}

impl AppState {
    pub fn new(draft: Option<DraftMessage>, links: RegisterLinks, debug_info: String) -> Self {
        Self {
            input: String::new(),
            status: None,
            focus: Focus::Input,
            draft,
            links,
            debug_info,
        }
    }

    pub fn push_char(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn pop_char(&mut self) {
        self.input.pop();
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
    }

    pub fn toggle_help(&mut self) {
        self.focus = match self.focus {
            Focus::Input => Focus::Help,
            Focus::Help => Focus::Input,
        };
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = Some(status);
    }
}
