pub mod oauth;
pub mod token_store;

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::{CLIENT_ID_PLACEHOLDER, Config};
use crate::error::Result;
use oauth::{AuthSettings, Tokens};

/// Issues bearer credentials for the directory API.
pub trait TokenProvider {
    /// `Ok(None)` when no credential can be obtained without error, e.g.
    /// the app registration is not configured.
    fn get_token(&self) -> Result<Option<String>>;
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Signed-in state for one user of the app registration.
///
/// Acquisition order: in-memory token, keyring refresh token, then the
/// interactive browser flow (when enabled).
pub struct AuthSession {
    settings: AuthSettings,
    interactive: bool,
    cached: Mutex<Option<CachedToken>>,
}

impl AuthSession {
    pub fn new(settings: AuthSettings, interactive: bool) -> Self {
        Self {
            settings,
            interactive,
            cached: Mutex::new(None),
        }
    }

    pub fn from_config(cfg: &Config, interactive: bool) -> Self {
        Self::new(
            AuthSettings::new(&cfg.azure_client_id, &cfg.azure_tenant_id, &cfg.redirect_uri),
            interactive,
        )
    }

    fn is_configured(&self) -> bool {
        let id = self.settings.client_id.as_str();
        !id.is_empty() && id != CLIENT_ID_PLACEHOLDER
    }

    /// Keyring account the refresh token is stored under.
    fn account_key(&self) -> String {
        format!("{}:{}", self.settings.tenant_id, self.settings.client_id)
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|t| Instant::now() < t.expires_at)
            .map(|t| t.access_token.clone())
    }

    fn remember(&self, tokens: Tokens) -> String {
        if let Some(rt) = &tokens.refresh_token
            && let Err(e) = token_store::save_refresh_token(&self.account_key(), rt)
        {
            log::warn!("couldn't save refresh token to keyring: {e}");
        }

        // renew a minute early
        let lifetime = tokens.expires_in.unwrap_or(3600).saturating_sub(60);
        let mut guard = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(CachedToken {
            access_token: tokens.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });
        tokens.access_token
    }

    pub fn sign_out(&self) -> anyhow::Result<()> {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = None;
        token_store::delete_refresh_token(&self.account_key())
    }
}

impl TokenProvider for AuthSession {
    fn get_token(&self) -> Result<Option<String>> {
        if !self.is_configured() {
            log::warn!("Azure client id not configured; no directory credential available");
            return Ok(None);
        }

        if let Some(token) = self.cached_token() {
            return Ok(Some(token));
        }

        match token_store::load_refresh_token(&self.account_key()) {
            Ok(Some(rt)) => match oauth::refresh_access_token(&self.settings, &rt) {
                Ok(t) => {
                    log::info!("token acquired silently");
                    return Ok(Some(self.remember(t)));
                }
                Err(e) => log::info!("silent token acquisition failed: {e}"),
            },
            Ok(None) => {}
            Err(e) => log::warn!("keyring unavailable: {e}"),
        }

        if !self.interactive {
            return Ok(None);
        }

        let t = oauth::perform_pkce_flow(&self.settings)?;
        log::info!("token acquired via interactive sign-in");
        Ok(Some(self.remember(t)))
    }
}
