//! The mail client hosting the add-in.
//!
//! Host accessors report through callbacks; [`settle`] blocks on one until it
//! fires and folds the outcome into a [`Result`], so call sites never touch
//! callbacks directly.

pub mod draft;

use std::fmt;
use std::sync::mpsc;

use crate::domain::recipients::{EmailAddressDetails, RecipientSet};
use crate::error::{CidError, Result};

/// Error reported by the host for a failed accessor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    pub code: u32,
    pub message: String,
}

impl HostError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

pub type Callback<T> = Box<dyn FnOnce(std::result::Result<T, HostError>) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientField {
    To,
    Cc,
    Bcc,
}

impl fmt::Display for RecipientField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::To => "to",
            Self::Cc => "cc",
            Self::Bcc => "bcc",
        })
    }
}

/// An informational bar shown on the message being composed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub icon: String,
    pub persistent: bool,
}

impl Notice {
    pub fn informational(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            icon: "Icon.16x16".to_string(),
            persistent: false,
        }
    }
}

/// The message currently being composed.
pub trait ComposeItem {
    fn get_recipients(&self, field: RecipientField, callback: Callback<Vec<EmailAddressDetails>>);
    /// Some host surfaces do not expose BCC at all.
    fn supports_bcc(&self) -> bool;
    fn get_subject(&self, callback: Callback<String>);
    fn set_subject(&self, subject: &str, callback: Callback<()>);
    fn replace_notification(&self, key: &str, notice: Notice, callback: Callback<()>);
}

/// Options passed back when an event handler completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedOptions {
    pub allow_event: Option<bool>,
    pub error_message: Option<String>,
}

impl CompletedOptions {
    pub fn allow() -> Self {
        Self {
            allow_event: Some(true),
            error_message: None,
        }
    }

    pub fn block(message: impl Into<String>) -> Self {
        Self {
            allow_event: Some(false),
            error_message: Some(message.into()),
        }
    }
}

/// The host event that invoked a handler. Completing consumes it.
pub trait HostEvent {
    fn completed(self, options: Option<CompletedOptions>);
}

/// Runs a callback-style host call and waits for its outcome.
pub fn settle<T, F>(call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(Callback<T>),
{
    let (tx, rx) = mpsc::channel();
    call(Box::new(move |outcome| {
        let _ = tx.send(outcome);
    }));
    match rx.recv() {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CidError::Accessor(e.to_string())),
        Err(_) => Err(CidError::Accessor(
            "host dropped the callback without answering".into(),
        )),
    }
}

/// Reads To, CC and BCC (when exposed) into one normalized set.
pub fn gather_recipients(item: &dyn ComposeItem) -> Result<RecipientSet> {
    let mut fields = vec![RecipientField::To, RecipientField::Cc];
    if item.supports_bcc() {
        fields.push(RecipientField::Bcc);
    }

    let mut set = RecipientSet::new();
    for field in fields {
        let details = settle(|cb| item.get_recipients(field, cb))
            .map_err(|e| match e {
                CidError::Accessor(msg) => CidError::Accessor(format!("reading {field}: {msg}")),
                other => other,
            })?;
        set.extend_details(&details);
    }
    Ok(set)
}

pub fn get_subject(item: &dyn ComposeItem) -> Result<String> {
    settle(|cb| item.get_subject(cb))
}

pub fn set_subject(item: &dyn ComposeItem, subject: &str) -> Result<()> {
    settle(|cb| item.set_subject(subject, cb))
}

pub fn show_notice(item: &dyn ComposeItem, key: &str, message: &str) -> Result<()> {
    settle(|cb| item.replace_notification(key, Notice::informational(message), cb))
}
