use oauth2::TokenResponse;
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, CsrfToken, PkceCodeChallenge, RedirectUrl,
    RefreshToken, Scope, TokenUrl,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use url::Url;

use crate::error::{CidError, Result};

pub const GRAPH_SCOPES: &[&str] = &["https://graph.microsoft.com/.default", "offline_access"];
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Azure AD app registration used to obtain Graph tokens
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub client_id: String,
    pub tenant_id: String,
    pub redirect_uri: String,
    pub authority: String,
}

impl AuthSettings {
    pub fn new(client_id: &str, tenant_id: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.trim().to_string(),
            tenant_id: tenant_id.trim().to_string(),
            redirect_uri: redirect_uri.to_string(),
            authority: DEFAULT_AUTHORITY.to_string(),
        }
    }

    fn client(&self) -> Result<BasicClient> {
        let base = format!("{}/{}/oauth2/v2.0", self.authority, self.tenant_id);
        let auth_url = AuthUrl::new(format!("{base}/authorize")).map_err(config_err)?;
        let token_url = TokenUrl::new(format!("{base}/token")).map_err(config_err)?;

        // public client: no secret, client_id travels in the request body
        Ok(BasicClient::new(
            ClientId::new(self.client_id.clone()),
            None,
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody))
    }
}

fn config_err(e: url::ParseError) -> CidError {
    CidError::Configuration(format!("invalid authority url: {e}"))
}

/// Tokens returned by the oauth flow (in-memory)
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

fn scopes() -> impl Iterator<Item = Scope> {
    GRAPH_SCOPES.iter().map(|s| Scope::new(s.to_string()))
}

/// Exchange a refresh token for a new access token
pub fn refresh_access_token(settings: &AuthSettings, refresh_token: &str) -> Result<Tokens> {
    let rt = RefreshToken::new(refresh_token.to_string());
    let token = settings
        .client()?
        .exchange_refresh_token(&rt)
        .add_scopes(scopes())
        .request(http_client)
        .map_err(|e| CidError::Authentication(format!("refresh failed: {e}")))?;

    Ok(Tokens {
        access_token: token.access_token().secret().to_string(),
        refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
        expires_in: token.expires_in().map(|d| d.as_secs()),
    })
}

/// Authorization Code + PKCE. Opens the system browser and captures the
/// code on a loopback server bound to the redirect address.
pub fn perform_pkce_flow(settings: &AuthSettings) -> Result<Tokens> {
    let redirect_uri = settings.redirect_uri.as_str();
    let redirect = Url::parse(redirect_uri).map_err(|e| {
        CidError::Configuration(format!("Invalid redirect_uri '{redirect_uri}': {e}"))
    })?;

    let host = redirect
        .host_str()
        .ok_or_else(|| CidError::Configuration(format!("redirect_uri missing host: {redirect_uri}")))?;
    let port = redirect.port_or_known_default().ok_or_else(|| {
        CidError::Configuration(format!("redirect_uri missing/unknown port: {redirect_uri}"))
    })?;

    let bind_ip: IpAddr = match host {
        "localhost" | "127.0.0.1" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other.parse::<IpAddr>().map_err(|_| {
            CidError::Configuration(format!(
                "redirect_uri host must be localhost/127.0.0.1 or an IP: {other}"
            ))
        })?,
    };
    let bind_addr = SocketAddr::new(bind_ip, port);

    // listen before the browser can hit the redirect
    let server = Server::http(bind_addr).map_err(|e| {
        CidError::Authentication(format!("Failed to bind OAuth callback server on {bind_addr}: {e:?}"))
    })?;

    let oauth_client = settings.client()?.set_redirect_uri(
        RedirectUrl::new(redirect_uri.to_string()).map_err(config_err)?,
    );
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf) = oauth_client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(scopes())
        .set_pkce_challenge(pkce_challenge)
        .url();

    log::info!("opening Microsoft 365 sign-in");
    if let Err(e) = open::that(auth_url.as_str()) {
        eprintln!("Sign in manually at:\n{auth_url}");
        return Err(CidError::PopupBlocked(format!(
            "could not open the sign-in page: {e}"
        )));
    }

    let code = wait_for_code(&server, host, port, csrf.secret())?;

    let token = oauth_client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request(http_client)
        .map_err(|e| {
            log::debug!("token exchange failed: {e:#?}");
            CidError::Authentication("Authentication failed. Please sign in to Microsoft 365.".into())
        })?;

    Ok(Tokens {
        access_token: token.access_token().secret().to_string(),
        refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
        expires_in: token.expires_in().map(|d| d.as_secs()),
    })
}

fn wait_for_code(server: &Server, host: &str, port: u16, state: &str) -> Result<String> {
    let wait_until = Instant::now() + CALLBACK_TIMEOUT;

    while Instant::now() < wait_until {
        let Ok(maybe_request) = server.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };
        let Some(request) = maybe_request else {
            continue;
        };

        // request.url() is a path+query like "/callback?code=...&state=..."
        let full = format!("http://{}:{}{}", host, port, request.url());
        let Ok(parsed) = Url::parse(&full) else {
            let _ = request.respond(Response::from_string("Bad redirect"));
            continue;
        };

        let mut code = None;
        let mut returned_state = None;
        let mut error = None;
        for (k, v) in parsed.query_pairs() {
            match k.as_ref() {
                "code" => code = Some(v.into_owned()),
                "state" => returned_state = Some(v.into_owned()),
                "error_description" | "error" => error = Some(v.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            let _ = request.respond(Response::from_string("Sign-in failed. You can close this tab."));
            return Err(CidError::Authentication(error));
        }
        match code {
            Some(code) if returned_state.as_deref() == Some(state) => {
                let _ = request.respond(Response::from_string(
                    "Authorization received. You can close this tab.",
                ));
                return Ok(code);
            }
            Some(_) => {
                let _ = request.respond(Response::from_string("State mismatch. You can close this tab."));
                return Err(CidError::Authentication("OAuth state mismatch".into()));
            }
            None => {
                let _ = request.respond(Response::from_string(
                    "No code found in redirect. You can close this tab.",
                ));
            }
        }
    }

    Err(CidError::Authentication("No code received within timeout".into()))
}
