use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::recipients::EmailAddressDetails;
use crate::host::{
    Callback, CompletedOptions, ComposeItem, HostError, HostEvent, Notice, RecipientField,
};

/// Accessors of [`DraftMessage`] that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessor {
    Recipients(RecipientField),
    GetSubject,
    SetSubject,
    Notification,
}

#[derive(Debug, Default)]
struct DraftState {
    to: Vec<EmailAddressDetails>,
    cc: Vec<EmailAddressDetails>,
    bcc: Option<Vec<EmailAddressDetails>>,
    subject: String,
    notices: BTreeMap<String, Notice>,
    subject_writes: usize,
    failing: HashSet<Accessor>,
}

/// An in-memory message being composed, answering accessors immediately.
#[derive(Debug, Clone, Default)]
pub struct DraftMessage {
    state: Arc<Mutex<DraftState>>,
}

impl DraftMessage {
    pub fn new(subject: &str) -> Self {
        let draft = Self::default();
        draft.lock().subject = subject.to_string();
        draft
    }

    fn lock(&self) -> MutexGuard<'_, DraftState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_to(self, recipients: Vec<EmailAddressDetails>) -> Self {
        self.lock().to = recipients;
        self
    }

    pub fn with_cc(self, recipients: Vec<EmailAddressDetails>) -> Self {
        self.lock().cc = recipients;
        self
    }

    /// Exposes a BCC field; drafts without one behave like hosts that hide it.
    pub fn with_bcc(self, recipients: Vec<EmailAddressDetails>) -> Self {
        self.lock().bcc = Some(recipients);
        self
    }

    pub fn failing(self, accessor: Accessor) -> Self {
        self.lock().failing.insert(accessor);
        self
    }

    pub fn subject(&self) -> String {
        self.lock().subject.clone()
    }

    pub fn subject_writes(&self) -> usize {
        self.lock().subject_writes
    }

    pub fn notice(&self, key: &str) -> Option<Notice> {
        self.lock().notices.get(key).cloned()
    }

    pub fn notices(&self) -> Vec<(String, Notice)> {
        self.lock()
            .notices
            .iter()
            .map(|(k, n)| (k.clone(), n.clone()))
            .collect()
    }

    fn check(&self, accessor: Accessor) -> Result<(), HostError> {
        if self.lock().failing.contains(&accessor) {
            Err(HostError::new(5001, format!("{accessor:?} unavailable")))
        } else {
            Ok(())
        }
    }
}

impl ComposeItem for DraftMessage {
    fn get_recipients(&self, field: RecipientField, callback: Callback<Vec<EmailAddressDetails>>) {
        let outcome = self.check(Accessor::Recipients(field)).map(|()| {
            let state = self.lock();
            match field {
                RecipientField::To => state.to.clone(),
                RecipientField::Cc => state.cc.clone(),
                RecipientField::Bcc => state.bcc.clone().unwrap_or_default(),
            }
        });
        callback(outcome);
    }

    fn supports_bcc(&self) -> bool {
        self.lock().bcc.is_some()
    }

    fn get_subject(&self, callback: Callback<String>) {
        let outcome = self.check(Accessor::GetSubject).map(|()| self.subject());
        callback(outcome);
    }

    fn set_subject(&self, subject: &str, callback: Callback<()>) {
        let outcome = self.check(Accessor::SetSubject).map(|()| {
            let mut state = self.lock();
            state.subject = subject.to_string();
            state.subject_writes += 1;
        });
        callback(outcome);
    }

    fn replace_notification(&self, key: &str, notice: Notice, callback: Callback<()>) {
        let outcome = self.check(Accessor::Notification).map(|()| {
            self.lock().notices.insert(key.to_string(), notice);
        });
        callback(outcome);
    }
}

/// Captures every completion of the events handed out by [`RecordedEvent::event`].
#[derive(Debug, Clone, Default)]
pub struct RecordedEvent {
    completions: Arc<Mutex<Vec<Option<CompletedOptions>>>>,
}

pub struct RecordingHandle {
    completions: Arc<Mutex<Vec<Option<CompletedOptions>>>>,
}

impl RecordedEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(&self) -> RecordingHandle {
        RecordingHandle {
            completions: Arc::clone(&self.completions),
        }
    }

    pub fn completions(&self) -> Vec<Option<CompletedOptions>> {
        self.completions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The single completion, if exactly one happened.
    pub fn only_completion(&self) -> Option<Option<CompletedOptions>> {
        let all = self.completions();
        if all.len() == 1 { all.into_iter().next() } else { None }
    }
}

impl HostEvent for RecordingHandle {
    fn completed(self, options: Option<CompletedOptions>) {
        self.completions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(options);
    }
}
