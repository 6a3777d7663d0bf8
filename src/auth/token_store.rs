use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "cid_tagger";

/// Save a refresh token into the OS keyring for the given account key
pub fn save_refresh_token(account: &str, refresh_token: &str) -> Result<()> {
    let entry = Entry::new(SERVICE, account);
    entry?
        .set_password(refresh_token)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Load a refresh token from the keyring for the given account key
pub fn load_refresh_token(account: &str) -> Result<Option<String>> {
    let entry = Entry::new(SERVICE, account);
    match entry?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Remove a stored refresh token; a missing entry is not an error
pub fn delete_refresh_token(account: &str) -> Result<()> {
    let entry = Entry::new(SERVICE, account);
    match entry?.delete_credential() {
        Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}
