use std::collections::{BTreeSet, HashMap};

use crate::domain::recipients::{RecipientSet, normalize_address};

/// One raw record returned by a directory query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryRow {
    pub cid: String,
    pub display_name: Option<String>,
    /// Email values stored on the record (primary, secondary).
    pub emails: Vec<String>,
}

impl DirectoryRow {
    pub fn new(cid: impl Into<String>, display_name: Option<&str>, emails: &[&str]) -> Self {
        Self {
            cid: cid.into(),
            display_name: display_name.map(|s| s.to_string()),
            emails: emails.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A directory record matched by one or more recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMatch {
    pub cid: String,
    pub display_name: Option<String>,
    /// Recipient addresses that matched this record; never empty.
    pub matched_addresses: BTreeSet<String>,
}

/// Folds raw rows into one match per CID, keeping first-seen order.
///
/// Matched address sets are unioned and the first non-empty display name
/// wins. Rows whose emails match none of `recipients` are dropped.
pub fn merge_rows<I>(rows: I, recipients: &RecipientSet) -> Vec<DirectoryMatch>
where
    I: IntoIterator<Item = DirectoryRow>,
{
    let mut out: Vec<DirectoryMatch> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let cid = row.cid.trim();
        if cid.is_empty() {
            continue;
        }
        let matched: BTreeSet<String> = row
            .emails
            .iter()
            .filter_map(|e| normalize_address(e))
            .filter(|e| recipients.contains(e))
            .collect();
        if matched.is_empty() {
            log::debug!("directory row {cid} matched no recipient, skipping");
            continue;
        }
        let display_name = row
            .display_name
            .filter(|n| !n.trim().is_empty());

        match index.get(cid) {
            Some(&pos) => {
                let existing = &mut out[pos];
                existing.matched_addresses.extend(matched);
                if existing.display_name.is_none() {
                    existing.display_name = display_name;
                }
            }
            None => {
                index.insert(cid.to_string(), out.len());
                out.push(DirectoryMatch {
                    cid: cid.to_string(),
                    display_name,
                    matched_addresses: matched,
                });
            }
        }
    }
    out
}

/// Distinct CIDs across `matches`, in first-seen order.
pub fn distinct_cids(matches: &[DirectoryMatch]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    matches
        .iter()
        .filter(|m| seen.insert(m.cid.as_str()))
        .map(|m| m.cid.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipients(addrs: &[&str]) -> RecipientSet {
        addrs.iter().collect()
    }

    #[test]
    fn rows_sharing_a_cid_are_merged() {
        let rcpts = recipients(&["a@x.com", "b@x.com", "c@y.com"]);
        let rows = vec![
            DirectoryRow::new("CID-2026-0001", None, &["A@x.com", ""]),
            DirectoryRow::new("CID-2026-0002", Some("Other"), &["c@y.com"]),
            DirectoryRow::new("CID-2026-0001", Some("Acme"), &["b@x.com", "nobody@x.com"]),
            DirectoryRow::new("CID-2026-0001", Some("Acme Later"), &["a@x.com"]),
        ];

        let merged = merge_rows(rows, &rcpts);
        assert_eq!(merged.len(), 2);

        let first = &merged[0];
        assert_eq!(first.cid, "CID-2026-0001");
        assert_eq!(first.display_name.as_deref(), Some("Acme"));
        assert_eq!(
            first.matched_addresses.iter().cloned().collect::<Vec<_>>(),
            vec!["a@x.com".to_string(), "b@x.com".to_string()]
        );
        assert_eq!(merged[1].cid, "CID-2026-0002");
    }

    #[test]
    fn blank_display_name_does_not_win() {
        let rcpts = recipients(&["a@x.com"]);
        let rows = vec![
            DirectoryRow::new("CID-2026-0001", Some("  "), &["a@x.com"]),
            DirectoryRow::new("CID-2026-0001", Some("Acme"), &["a@x.com"]),
        ];
        let merged = merge_rows(rows, &rcpts);
        assert_eq!(merged[0].display_name.as_deref(), Some("Acme"));
    }

    #[test]
    fn rows_without_cid_or_match_are_dropped() {
        let rcpts = recipients(&["a@x.com"]);
        let rows = vec![
            DirectoryRow::new("", Some("No id"), &["a@x.com"]),
            DirectoryRow::new("CID-2026-0003", None, &["z@x.com"]),
        ];
        assert!(merge_rows(rows, &rcpts).is_empty());
    }

    #[test]
    fn distinct_cids_keep_first_seen_order() {
        let m = |cid: &str| DirectoryMatch {
            cid: cid.to_string(),
            display_name: None,
            matched_addresses: BTreeSet::from(["a@x.com".to_string()]),
        };
        let matches = vec![m("CID-2026-0002"), m("CID-2026-0001"), m("CID-2026-0002")];
        assert_eq!(distinct_cids(&matches), vec!["CID-2026-0002", "CID-2026-0001"]);
    }
}
