//! CID tagging for outgoing mail: recipients are looked up in the CID
//! Register and the message subject is tagged with the matching Client ID.

pub mod auth;
pub mod config;
pub mod directory;
pub mod domain;
pub mod error;
pub mod events;
pub mod host;
pub mod taskpane;

pub use config::Config;
pub use error::{CidError, Result};
