pub mod matches;
pub mod recipients;
pub mod subject;

pub use matches::{DirectoryMatch, DirectoryRow};
pub use recipients::{EmailAddressDetails, RecipientSet};
pub use subject::SubjectTagger;
