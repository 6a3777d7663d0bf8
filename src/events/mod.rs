//! Compose, recipients-changed and send handlers.
//!
//! All three run [`Orchestrator::ensure_cid_tag`]. Passive triggers never
//! surface failures to the sender; the send trigger turns ambiguity or any
//! failure into a blocked send.

use std::collections::HashMap;
use std::fmt;

use crate::auth::TokenProvider;
use crate::config::{Config, NotificationKeys};
use crate::directory::{Environment, GraphDirectory, Resolver};
use crate::domain::matches::distinct_cids;
use crate::domain::subject::SubjectTagger;
use crate::error::{CidError, Result};
use crate::host::{
    self, CompletedOptions, ComposeItem, HostEvent, gather_recipients, show_notice,
};

pub const NO_MATCH_MESSAGE: &str =
    "No CID found for current recipients. Consider adding this contact to the CID Register if appropriate.";
pub const SEND_FAILURE_MESSAGE: &str =
    "CID validation failed. Please try again or check network/auth settings.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Compose,
    RecipientsChanged,
    Send,
}

impl Trigger {
    pub const ALL: [Trigger; 3] = [Trigger::Compose, Trigger::RecipientsChanged, Trigger::Send];

    /// Action id the host uses to route the event.
    pub fn action_id(self) -> &'static str {
        match self {
            Self::Compose => "onNewMessageCompose",
            Self::RecipientsChanged => "onRecipientsChanged",
            Self::Send => "onMessageSend",
        }
    }

    pub fn is_passive(self) -> bool {
        self != Self::Send
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action_id())
    }
}

/// Result of one recipient-to-subject pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    NoRecipients,
    NoMatch,
    Applied { cid: String, changed: bool },
    Ambiguous(Vec<String>),
}

/// Terminal state of a handled event.
#[derive(Debug)]
pub enum Disposition {
    Silent,
    NotifiedNoMatch,
    Tagged { cid: String, changed: bool },
    NotifiedAmbiguous(Vec<String>),
    BlockedSend(Vec<String>),
    Failed(CidError),
}

impl From<TagOutcome> for Disposition {
    fn from(outcome: TagOutcome) -> Self {
        match outcome {
            TagOutcome::NoRecipients => Self::Silent,
            TagOutcome::NoMatch => Self::NotifiedNoMatch,
            TagOutcome::Applied { cid, changed } => Self::Tagged { cid, changed },
            TagOutcome::Ambiguous(cids) => Self::NotifiedAmbiguous(cids),
        }
    }
}

pub fn ambiguity_notice(cids: &[String]) -> String {
    format!(
        "Multiple CIDs matched: {}. Choose the correct CID before sending.",
        cids.join(", ")
    )
}

pub fn ambiguity_block_message(cids: &[String]) -> String {
    format!(
        "Multiple CIDs matched: {}. Remove ambiguous recipients or select one CID.",
        cids.join(", ")
    )
}

/// Completes the wrapped event exactly once, when dropped.
struct Completion<E: HostEvent> {
    event: Option<E>,
    options: Option<CompletedOptions>,
}

impl<E: HostEvent> Completion<E> {
    fn new(event: E, fallback: Option<CompletedOptions>) -> Self {
        Self {
            event: Some(event),
            options: fallback,
        }
    }

    fn set(&mut self, options: Option<CompletedOptions>) {
        self.options = options;
    }
}

impl<E: HostEvent> Drop for Completion<E> {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            event.completed(self.options.take());
        }
    }
}

pub struct Orchestrator {
    resolver: Resolver,
    tagger: SubjectTagger,
    keys: NotificationKeys,
}

impl Orchestrator {
    pub fn new(resolver: Resolver, tagger: SubjectTagger, keys: NotificationKeys) -> Self {
        Self {
            resolver,
            tagger,
            keys,
        }
    }

    /// Wires the resolver for `env`; `tokens` is only called in live mode.
    pub fn from_config<F>(cfg: &Config, env: &Environment, tokens: F) -> Result<Self>
    where
        F: FnOnce() -> Box<dyn TokenProvider>,
    {
        let tagger = SubjectTagger::new(&cfg.cid_tag_pattern)?;
        let resolver = Resolver::for_environment(env, || {
            Ok(Box::new(GraphDirectory::new(cfg, tokens())?))
        })?;
        Ok(Self::new(resolver, tagger, cfg.notifications.clone()))
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn tagger(&self) -> &SubjectTagger {
        &self.tagger
    }

    pub fn ensure_cid_tag(&self, item: &dyn ComposeItem) -> Result<TagOutcome> {
        let recipients = gather_recipients(item)?;
        if recipients.is_empty() {
            return Ok(TagOutcome::NoRecipients);
        }

        let matches = self.resolver.resolve(&recipients)?;
        if matches.is_empty() {
            show_notice(item, &self.keys.no_match, NO_MATCH_MESSAGE)?;
            return Ok(TagOutcome::NoMatch);
        }

        let cids = distinct_cids(&matches);
        if cids.len() > 1 {
            show_notice(item, &self.keys.no_match, &ambiguity_notice(&cids))?;
            return Ok(TagOutcome::Ambiguous(cids));
        }

        let cid = cids.into_iter().next().unwrap_or_default();
        let subject = host::get_subject(item)?;
        let next = self.tagger.apply(&subject, &cid);
        let changed = next != subject;
        if changed {
            host::set_subject(item, &next)?;
        }
        show_notice(item, &self.keys.applied, &format!("CID applied: [{cid}]"))?;
        Ok(TagOutcome::Applied { cid, changed })
    }

    pub fn handle<E: HostEvent>(
        &self,
        trigger: Trigger,
        item: &dyn ComposeItem,
        event: E,
    ) -> Disposition {
        let fallback = (!trigger.is_passive()).then(|| CompletedOptions::block(SEND_FAILURE_MESSAGE));
        let mut completion = Completion::new(event, fallback);

        let result = self.ensure_cid_tag(item);
        let (options, disposition) = if trigger.is_passive() {
            (None, passive_disposition(trigger, result))
        } else {
            send_verdict(result)
        };
        completion.set(options);
        disposition
    }

    pub fn on_new_message_compose<E: HostEvent>(&self, item: &dyn ComposeItem, event: E) -> Disposition {
        self.handle(Trigger::Compose, item, event)
    }

    pub fn on_recipients_changed<E: HostEvent>(&self, item: &dyn ComposeItem, event: E) -> Disposition {
        self.handle(Trigger::RecipientsChanged, item, event)
    }

    pub fn on_message_send<E: HostEvent>(&self, item: &dyn ComposeItem, event: E) -> Disposition {
        self.handle(Trigger::Send, item, event)
    }
}

fn passive_disposition(trigger: Trigger, result: Result<TagOutcome>) -> Disposition {
    match result {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            if e.is_authentication() {
                log::error!(
                    "{trigger}: no directory credential, lookups will keep failing until sign-in is fixed: {e}"
                );
            } else {
                log::warn!("{trigger} error: {e}");
            }
            Disposition::Failed(e)
        }
    }
}

fn send_verdict(result: Result<TagOutcome>) -> (Option<CompletedOptions>, Disposition) {
    match result {
        Ok(TagOutcome::Ambiguous(cids)) => (
            Some(CompletedOptions::block(ambiguity_block_message(&cids))),
            Disposition::BlockedSend(cids),
        ),
        Ok(outcome) => (Some(CompletedOptions::allow()), outcome.into()),
        Err(e) => {
            log::error!("{} error: {e}", Trigger::Send);
            (
                Some(CompletedOptions::block(SEND_FAILURE_MESSAGE)),
                Disposition::Failed(e),
            )
        }
    }
}

/// Host action ids mapped to the trigger they fire.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Trigger>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three actions declared by the add-in manifest.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for trigger in Trigger::ALL {
            registry.associate(trigger.action_id(), trigger);
        }
        registry
    }

    pub fn associate(&mut self, action_id: &str, trigger: Trigger) {
        self.actions.insert(action_id.to_string(), trigger);
    }

    pub fn trigger(&self, action_id: &str) -> Option<Trigger> {
        self.actions.get(action_id).copied()
    }

    /// Routes `event` to its handler. Unknown actions are completed with no
    /// options and yield `None`.
    pub fn dispatch<E: HostEvent>(
        &self,
        orchestrator: &Orchestrator,
        action_id: &str,
        item: &dyn ComposeItem,
        event: E,
    ) -> Option<Disposition> {
        match self.trigger(action_id) {
            Some(trigger) => Some(orchestrator.handle(trigger, item, event)),
            None => {
                log::warn!("no handler associated with action '{action_id}'");
                event.completed(None);
                None
            }
        }
    }
}
