//! Recipient to CID resolution.
//!
//! The resolver owns one [`DirectorySource`], chosen once from an
//! [`Environment`] when it is built. A resolution opens a single
//! [`DirectorySession`] (credential and container lookups happen there) and
//! runs one query per batch of [`BATCH_SIZE`] addresses, one at a time.

pub mod graph;
pub mod static_table;

use crate::domain::matches::{DirectoryMatch, DirectoryRow, merge_rows};
use crate::domain::recipients::RecipientSet;
use crate::error::Result;

pub use graph::GraphDirectory;
pub use static_table::StaticDirectory;

/// Addresses per directory query; keeps the filter under URL length limits.
pub const BATCH_SIZE: usize = 10;

/// Where the resolver is running, as described by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    pub local_development: bool,
    /// A composed message from the host application is available.
    pub host_context: bool,
}

impl Environment {
    pub fn hosted() -> Self {
        Self {
            local_development: false,
            host_context: true,
        }
    }

    /// Builds a descriptor from the origin the add-in is served from.
    pub fn from_origin(origin: &url::Url, host_context: bool) -> Self {
        let local_development = matches!(origin.host_str(), Some("localhost" | "127.0.0.1"));
        Self {
            local_development,
            host_context,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    Static,
    Live,
}

impl ResolutionMode {
    pub fn select(env: &Environment) -> Self {
        if env.local_development || !env.host_context {
            Self::Static
        } else {
            Self::Live
        }
    }
}

/// A directory backend. Opening a session may acquire credentials.
pub trait DirectorySource {
    fn open_session(&self) -> Result<Box<dyn DirectorySession + '_>>;
}

/// One resolution's worth of directory access.
pub trait DirectorySession {
    /// Rows whose primary or secondary email equals one of `batch`.
    fn query(&self, batch: &[String]) -> Result<Vec<DirectoryRow>>;
}

pub struct Resolver {
    mode: ResolutionMode,
    source: Box<dyn DirectorySource>,
}

impl Resolver {
    /// Picks the static table or the live source from `env`. `live` is only
    /// invoked when live mode is selected.
    pub fn for_environment<F>(env: &Environment, live: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn DirectorySource>>,
    {
        let mode = ResolutionMode::select(env);
        let source: Box<dyn DirectorySource> = match mode {
            ResolutionMode::Static => {
                let reason = if env.local_development {
                    "local development"
                } else {
                    "no host context"
                };
                log::info!("static directory mode ({reason})");
                Box::new(StaticDirectory::builtin())
            }
            ResolutionMode::Live => {
                log::info!("live directory mode");
                live()?
            }
        };
        Ok(Self { mode, source })
    }

    pub fn with_source(mode: ResolutionMode, source: Box<dyn DirectorySource>) -> Self {
        Self { mode, source }
    }

    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    pub fn resolve(&self, recipients: &RecipientSet) -> Result<Vec<DirectoryMatch>> {
        if recipients.is_empty() {
            return Ok(Vec::new());
        }
        let addresses = recipients.to_vec();
        let session = self.source.open_session()?;

        let mut rows = Vec::new();
        for (i, batch) in addresses.chunks(BATCH_SIZE).enumerate() {
            log::debug!("directory batch {} ({} addresses)", i + 1, batch.len());
            rows.extend(session.query(batch)?);
        }

        let matches = merge_rows(rows, recipients);
        log::debug!("{} directory match(es) for {} recipient(s)", matches.len(), recipients.len());
        Ok(matches)
    }

    /// Normalizes raw addresses, then resolves them.
    pub fn resolve_addresses<S: AsRef<str>>(&self, raw: &[S]) -> Result<Vec<DirectoryMatch>> {
        let set: RecipientSet = raw.iter().collect();
        self.resolve(&set)
    }
}
