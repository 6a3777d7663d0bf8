use std::collections::BTreeSet;

/// One recipient as the host reports it. Empty strings mean "absent".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailAddressDetails {
    pub email_address: String,
    pub display_name: String,
}

impl EmailAddressDetails {
    pub fn new(email_address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            display_name: display_name.into(),
        }
    }

    pub fn address(email_address: impl Into<String>) -> Self {
        Self::new(email_address, "")
    }

    /// The address used for lookup: `email_address`, else `display_name`.
    pub fn lookup_key(&self) -> Option<String> {
        normalize_address(&self.email_address).or_else(|| normalize_address(&self.display_name))
    }
}

/// Trim and lowercase; `None` when nothing is left.
pub fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalized, deduplicated recipient addresses of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSet {
    addresses: BTreeSet<String>,
}

impl RecipientSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, raw: &str) -> bool {
        match normalize_address(raw) {
            Some(addr) => self.addresses.insert(addr),
            None => false,
        }
    }

    pub fn extend_details<'a, I>(&mut self, details: I)
    where
        I: IntoIterator<Item = &'a EmailAddressDetails>,
    {
        for d in details {
            if let Some(key) = d.lookup_key() {
                self.addresses.insert(key);
            }
        }
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.addresses.contains(addr)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.addresses.iter().cloned().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for RecipientSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for s in iter {
            set.insert(s.as_ref());
        }
        set
    }
}
