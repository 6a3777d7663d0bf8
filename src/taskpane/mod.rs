//! Manual lookups, outside the automatic event flow.
//!
//! Unlike the event handlers, every failure here ends up in the status area.

pub mod events;
pub mod state;
pub mod ui;

use color_eyre::eyre::Result as EyreResult;

use crate::directory::Resolver;
use crate::domain::matches::DirectoryMatch;
use crate::domain::subject::SubjectTagger;
use crate::error::{CidError, Result};
use crate::host::{self, ComposeItem, gather_recipients};
use state::AppState;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Error,
    Info,
}

/// The line shown in the task pane's status area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub kind: StatusKind,
    pub message: String,
}

impl Status {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            message: message.into(),
        }
    }
}

fn describe(m: &DirectoryMatch) -> String {
    match &m.display_name {
        Some(name) => format!("{} ({name})", m.cid),
        None => m.cid.clone(),
    }
}

pub struct Taskpane<'a> {
    resolver: &'a Resolver,
    tagger: &'a SubjectTagger,
    host_context: bool,
}

impl<'a> Taskpane<'a> {
    pub fn new(resolver: &'a Resolver, tagger: &'a SubjectTagger, host_context: bool) -> Self {
        Self {
            resolver,
            tagger,
            host_context,
        }
    }

    pub fn host_context(&self) -> bool {
        self.host_context
    }

    /// Looks up a single typed address.
    pub fn lookup(&self, email: &str) -> Status {
        let email = email.trim();
        if email.is_empty() {
            return Status::error("Please enter an email address");
        }
        match self.resolver.resolve_addresses(&[email]) {
            Ok(matches) => match matches.first() {
                Some(m) => Status::success(format!("Found: {}", describe(m))),
                None => Status::error(format!("No CID found for {email}")),
            },
            Err(e) => {
                log::error!("lookup error: {e}");
                Status::error(format!("Error: {e}"))
            }
        }
    }

    /// Tags the open draft from its recipients. Without a host context the
    /// typed address stands in for the recipients and nothing is modified.
    pub fn apply(&self, item: Option<&dyn ComposeItem>, typed_email: &str) -> Status {
        match self.try_apply(item, typed_email) {
            Ok(status) => status,
            Err(e) => {
                log::error!("apply error: {e}");
                Status::error(format!("Error: {e}"))
            }
        }
    }

    fn try_apply(&self, item: Option<&dyn ComposeItem>, typed_email: &str) -> Result<Status> {
        let item = if self.host_context { item } else { None };

        let recipients = match item {
            Some(item) => gather_recipients(item)?.to_vec(),
            None => typed_email
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase)
                .collect(),
        };
        if recipients.is_empty() {
            let msg = if item.is_some() {
                "No recipients found. Add a To or CC recipient first."
            } else {
                "Not in Outlook. Enter an email above to test."
            };
            return Ok(Status::error(msg));
        }

        let matches = self.resolver.resolve_addresses(&recipients)?;
        let Some(m) = matches.first() else {
            return Ok(Status::error("No CID found for recipients"));
        };

        let Some(item) = item else {
            return Ok(Status::success(format!(
                "TEST: Would apply [{}]{} to subject",
                m.cid,
                m.display_name
                    .as_ref()
                    .map(|n| format!(" ({n})"))
                    .unwrap_or_default()
            )));
        };

        let subject = host::get_subject(item)?;
        if self.tagger.is_tagged(&subject, &m.cid) {
            return Ok(Status::info(format!("Subject already has a CID tag: {subject}")));
        }
        host::set_subject(item, &self.tagger.apply(&subject, &m.cid))?;
        Ok(Status::success(format!("Applied: {}", applied_label(m))))
    }
}

fn applied_label(m: &DirectoryMatch) -> String {
    match &m.display_name {
        Some(name) => format!("[{}] ({name})", m.cid),
        None => format!("[{}]", m.cid),
    }
}

/// Opens a register page in the system browser.
pub fn open_external(url: &str) -> Result<()> {
    open::that(url).map_err(|e| CidError::PopupBlocked(format!("{url}: {e}")))
}

/// Status to show after trying to open `url`, if any.
pub fn open_external_status(url: &str) -> Option<Status> {
    match open_external(url) {
        Ok(()) => None,
        Err(e) => {
            log::warn!("{e}");
            Some(Status::error(
                "Popup blocked. Allow popups for Outlook/add-ins, then try again.",
            ))
        }
    }
}

/// Runs the interactive task pane until the user quits.
pub fn run_taskpane(mut state: AppState, pane: &Taskpane<'_>) -> EyreResult<()> {
    color_eyre::install()?;

    let mut terminal = ratatui::init();
    let result = (|| -> EyreResult<()> {
        loop {
            terminal.draw(|f| ui::render(f, &state))?;
            if let crossterm::event::Event::Key(key) = crossterm::event::read()?
                && events::handle_key(key, &mut state, pane)
            {
                break;
            }
        }
        Ok(())
    })();

    ratatui::restore();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{ResolutionMode, StaticDirectory};
    use crate::domain::recipients::EmailAddressDetails;
    use crate::host::draft::{Accessor, DraftMessage};

    fn resolver() -> Resolver {
        Resolver::with_source(ResolutionMode::Static, Box::new(StaticDirectory::builtin()))
    }

    #[test]
    fn lookup_reports_each_outcome() {
        let r = resolver();
        let tagger = SubjectTagger::default();
        let pane = Taskpane::new(&r, &tagger, true);

        assert_eq!(pane.lookup("  "), Status::error("Please enter an email address"));
        assert_eq!(
            pane.lookup("Jennifer@WatervilleAudiology.com"),
            Status::success("Found: CID-2026-0002 (Waterville Audiology)")
        );
        assert_eq!(
            pane.lookup("nobody@nowhere.net"),
            Status::error("No CID found for nobody@nowhere.net")
        );
    }

    #[test]
    fn apply_tags_the_draft() {
        let r = resolver();
        let tagger = SubjectTagger::default();
        let pane = Taskpane::new(&r, &tagger, true);
        let draft = DraftMessage::new("Hearing test results")
            .with_to(vec![EmailAddressDetails::address("test@example.com")]);

        let status = pane.apply(Some(&draft), "");
        assert_eq!(status, Status::success("Applied: [CID-2026-0001] (Test Client)"));
        assert_eq!(draft.subject(), "Hearing test results - [CID-2026-0001]");

        let again = pane.apply(Some(&draft), "");
        assert_eq!(again.kind, StatusKind::Info);
        assert_eq!(draft.subject_writes(), 1);
    }

    #[test]
    fn apply_without_recipients_explains_itself() {
        let r = resolver();
        let tagger = SubjectTagger::default();
        let hosted = Taskpane::new(&r, &tagger, true);
        let draft = DraftMessage::new("");
        assert_eq!(
            hosted.apply(Some(&draft), ""),
            Status::error("No recipients found. Add a To or CC recipient first.")
        );

        let detached = Taskpane::new(&r, &tagger, false);
        assert_eq!(
            detached.apply(None, ""),
            Status::error("Not in Outlook. Enter an email above to test.")
        );
    }

    #[test]
    fn detached_apply_only_previews() {
        let r = resolver();
        let tagger = SubjectTagger::default();
        let pane = Taskpane::new(&r, &tagger, false);
        let draft = DraftMessage::new("Subject");

        let status = pane.apply(Some(&draft), "jennifer@watervilleaudiology.com");
        assert_eq!(
            status,
            Status::success("TEST: Would apply [CID-2026-0002] (Waterville Audiology) to subject")
        );
        assert_eq!(draft.subject(), "Subject");
    }

    #[test]
    fn apply_surfaces_host_errors() {
        let r = resolver();
        let tagger = SubjectTagger::default();
        let pane = Taskpane::new(&r, &tagger, true);
        let draft = DraftMessage::new("Subject")
            .with_to(vec![EmailAddressDetails::address("test@example.com")])
            .failing(Accessor::GetSubject);

        let status = pane.apply(Some(&draft), "");
        assert_eq!(status.kind, StatusKind::Error);
        assert!(status.message.starts_with("Error: Accessor error"));
    }
}
