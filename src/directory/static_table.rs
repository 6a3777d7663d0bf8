use std::collections::HashMap;

use crate::directory::{DirectorySession, DirectorySource};
use crate::domain::matches::DirectoryRow;
use crate::domain::recipients::normalize_address;
use crate::error::Result;

/// Fixed address table used when the live directory is out of reach.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    by_address: HashMap<String, DirectoryRow>,
}

impl StaticDirectory {
    /// The table shipped for local development and detached runs.
    pub fn builtin() -> Self {
        Self::from_entries(&[
            ("realty@julieandbryce.com", "CID-2026-TEST", "Test - Realty Account"),
            (
                "realty@watervilleaudiology.com",
                "CID-2026-0003",
                "Waterville Audiology - Realty",
            ),
            (
                "jennifer@watervilleaudiology.com",
                "CID-2026-0002",
                "Waterville Audiology",
            ),
            ("test@example.com", "CID-2026-0001", "Test Client"),
        ])
    }

    pub fn from_entries(entries: &[(&str, &str, &str)]) -> Self {
        let mut by_address = HashMap::new();
        for (address, cid, name) in entries {
            let Some(address) = normalize_address(address) else {
                continue;
            };
            let display_name = (!name.is_empty()).then(|| name.to_string());
            by_address.insert(
                address.clone(),
                DirectoryRow {
                    cid: cid.to_string(),
                    display_name,
                    emails: vec![address],
                },
            );
        }
        Self { by_address }
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

impl DirectorySource for StaticDirectory {
    fn open_session(&self) -> Result<Box<dyn DirectorySession + '_>> {
        Ok(Box::new(self))
    }
}

impl DirectorySession for &StaticDirectory {
    fn query(&self, batch: &[String]) -> Result<Vec<DirectoryRow>> {
        Ok(batch
            .iter()
            .filter_map(|addr| self.by_address.get(addr).cloned())
            .collect())
    }
}
