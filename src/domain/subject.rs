use regex::Regex;
use std::sync::LazyLock;

use crate::config::DEFAULT_CID_TAG_PATTERN;
use crate::error::{CidError, Result};

static DEFAULT_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_CID_TAG_PATTERN).expect("Invalid CID tag pattern"));

/// Detects and appends the canonical `[CID-YYYY-NNNN]` subject tag.
///
/// A subject that already carries a tag is never touched again, even when
/// the tag names a different CID than the one being applied.
#[derive(Debug, Clone)]
pub struct SubjectTagger {
    pattern: Regex,
}

impl Default for SubjectTagger {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_TAG_REGEX.clone(),
        }
    }
}

impl SubjectTagger {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| CidError::Configuration(format!("invalid cid_tag_pattern: {e}")))?;
        Ok(Self { pattern })
    }

    /// The first canonical tag found in `subject`, brackets included.
    pub fn existing_tag<'s>(&self, subject: &'s str) -> Option<&'s str> {
        self.pattern.find(subject).map(|m| m.as_str())
    }

    pub fn is_tagged(&self, subject: &str, cid: &str) -> bool {
        if self.existing_tag(subject).is_some() {
            return true;
        }
        // CIDs outside the canonical shape (e.g. test records) still must not stack
        let tag = format!("[{cid}]").to_lowercase();
        subject.to_lowercase().contains(&tag)
    }

    pub fn apply(&self, subject: &str, cid: &str) -> String {
        if self.is_tagged(subject, cid) {
            return subject.to_string();
        }
        let trimmed = subject.trim();
        if trimmed.is_empty() {
            format!("[{cid}]")
        } else {
            format!("{trimmed} - [{cid}]")
        }
    }
}

/// Tags `subject` with the default pattern.
pub fn apply_cid_to_subject(subject: &str, cid: &str) -> String {
    SubjectTagger::default().apply(subject, cid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_subject_gets_bare_tag() {
        assert_eq!(apply_cid_to_subject("", "CID-2026-0001"), "[CID-2026-0001]");
        assert_eq!(apply_cid_to_subject("   ", "CID-2026-0001"), "[CID-2026-0001]");
    }

    #[test]
    fn untagged_subject_gets_suffix() {
        assert_eq!(
            apply_cid_to_subject("Quote Request", "CID-2026-0001"),
            "Quote Request - [CID-2026-0001]"
        );
        assert_eq!(
            apply_cid_to_subject("  Quote Request \n", "CID-2026-0001"),
            "Quote Request - [CID-2026-0001]"
        );
    }

    #[test]
    fn existing_tag_is_never_replaced() {
        assert_eq!(
            apply_cid_to_subject("Hello [CID-2024-0001]", "CID-2024-0002"),
            "Hello [CID-2024-0001]"
        );
        assert_eq!(
            apply_cid_to_subject("re: [cid-2024-0001] hi", "CID-2024-0002"),
            "re: [cid-2024-0001] hi"
        );
    }

    #[test]
    fn only_ascii_digits_count_as_a_tag() {
        assert_eq!(
            apply_cid_to_subject("Quote [CID-٢٠٢٤-٠٠٠١]", "CID-2026-0001"),
            "Quote [CID-٢٠٢٤-٠٠٠١] - [CID-2026-0001]"
        );
        assert_eq!(SubjectTagger::default().existing_tag("[CID-２０２４-０００１]"), None);
    }

    #[test]
    fn tagging_is_idempotent() {
        let subjects = ["", "  ", "Quote Request", "Hello [CID-2024-0001]", " RE: follow up "];
        let cids = ["CID-2026-0001", "CID-2026-TEST"];
        for s in subjects {
            for cid in cids {
                let once = apply_cid_to_subject(s, cid);
                assert_eq!(apply_cid_to_subject(&once, cid), once, "subject {s:?} cid {cid}");
            }
        }
    }

    #[test]
    fn existing_tag_is_reported() {
        let tagger = SubjectTagger::default();
        assert_eq!(
            tagger.existing_tag("Invoice - [CID-2025-0042]"),
            Some("[CID-2025-0042]")
        );
        assert_eq!(tagger.existing_tag("[CID-25-42]"), None);
    }

    #[test]
    fn invalid_pattern_is_a_configuration_error() {
        assert!(matches!(
            SubjectTagger::new("[CID-"),
            Err(CidError::Configuration(_))
        ));
    }
}
