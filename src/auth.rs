use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use parking_lot::RwLock;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::session::Session;

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub key: String,
    pub secret: String,
    pub user_agent: String,
    pub timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth: acquiring token failed: {0:#}")]
    Acquire(#[source] anyhow::Error),
    #[error("auth: refreshing token failed: {0:#}")]
    Refresh(#[source] anyhow::Error),
    #[error("auth: no refresh token held")]
    MissingRefreshToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Talks to the token endpoints.
pub struct Flow {
    cfg: Config,
    client: Client,
}

impl Flow {
    pub fn new(cfg: Config) -> Result<Self> {
        if cfg.key.trim().is_empty() {
            bail!("auth: api key is required");
        }
        if cfg.user_agent.trim().is_empty() {
            bail!("auth: user agent is required");
        }
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("auth: build http client")?;
        Ok(Self { cfg, client })
    }

    /// Mints a new pair from the client credentials.
    pub fn acquire(&self) -> Result<TokenPair> {
        let url = self.cfg.base_url.join("auth")?;
        let body = ApkRequest {
            method: "apk",
            key: &self.cfg.key,
            secret: &self.cfg.secret,
        };
        self.post_token(url, &body, "token request")
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let url = self.cfg.base_url.join("auth/refresh")?;
        let body = RefreshRequest { refresh_token };
        self.post_token(url, &body, "refresh request")
    }

    fn post_token<B: Serialize>(&self, url: Url, body: &B, what: &str) -> Result<TokenPair> {
        let resp = self
            .client
            .post(url)
            .header(USER_AGENT, self.cfg.user_agent.clone())
            .json(body)
            .send()
            .with_context(|| format!("auth: {what}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<TokenError>(&body) {
                bail!("auth: {what} failed ({status}): {err}");
            }
            bail!("auth: {what} failed ({status}): {body}");
        }

        let payload: TokenResponse = resp
            .json()
            .with_context(|| format!("auth: decode {what} response"))?;
        let access_token = payload
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| anyhow!("auth: {what} response missing access token"))?;
        Ok(TokenPair {
            access_token,
            refresh_token: payload.refresh_token.filter(|token| !token.is_empty()),
        })
    }
}

/// Loading and failure flags for the initial acquisition and for re-auth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthStatus {
    pub auth_loading: bool,
    pub auth_failed: bool,
    pub reauth_loading: bool,
    pub reauth_failed: bool,
}

impl AuthStatus {
    pub fn loading(&self) -> bool {
        self.auth_loading || self.reauth_loading
    }

    pub fn failed(&self) -> bool {
        self.auth_failed || self.reauth_failed
    }
}

/// Keeps a usable access token in the session.
pub trait Authenticator: Send + Sync {
    /// Acquires a pair when no access token is held. Returns whether a new
    /// token was stored.
    fn ensure(&self) -> Result<bool, AuthError>;
    /// Exchanges the held refresh token for a new pair.
    fn reauth(&self) -> Result<(), AuthError>;
    fn status(&self) -> AuthStatus;
}

pub struct Manager {
    flow: Flow,
    session: Session,
    status: RwLock<AuthStatus>,
}

impl Manager {
    pub fn new(flow: Flow, session: Session) -> Self {
        Self {
            flow,
            session,
            status: RwLock::new(AuthStatus::default()),
        }
    }

    fn store_pair(&self, pair: &TokenPair) -> Result<()> {
        self.session.set_access_token(&pair.access_token)?;
        if let Some(refresh) = pair.refresh_token.as_deref() {
            self.session.set_refresh_token(refresh)?;
        }
        Ok(())
    }
}

impl Authenticator for Manager {
    fn ensure(&self) -> Result<bool, AuthError> {
        if self.session.has_access_token() {
            return Ok(false);
        }

        {
            let mut status = self.status.write();
            status.auth_loading = true;
            status.auth_failed = false;
        }
        tracing::info!("no access token held; requesting a new pair");

        let result = self
            .flow
            .acquire()
            .and_then(|pair| self.store_pair(&pair))
            .map_err(AuthError::Acquire);

        let mut status = self.status.write();
        status.auth_loading = false;
        match result {
            Ok(()) => {
                // a fresh pair also settles any earlier refresh failure
                status.reauth_failed = false;
                tracing::info!("access token acquired");
                Ok(true)
            }
            Err(err) => {
                status.auth_failed = true;
                tracing::error!("{err}");
                Err(err)
            }
        }
    }

    fn reauth(&self) -> Result<(), AuthError> {
        let refresh_token = match self.session.credentials() {
            Ok(creds) => creds.refresh_token,
            Err(err) => {
                tracing::warn!("reading credentials failed: {err:#}");
                None
            }
        };
        let Some(refresh_token) = refresh_token else {
            return Err(AuthError::MissingRefreshToken);
        };

        {
            let mut status = self.status.write();
            status.reauth_loading = true;
            status.reauth_failed = false;
        }
        tracing::info!("access token rejected; refreshing");

        let result = self
            .flow
            .refresh(&refresh_token)
            .and_then(|pair| self.store_pair(&pair))
            .map_err(AuthError::Refresh);

        let mut status = self.status.write();
        status.reauth_loading = false;
        match result {
            Ok(()) => {
                tracing::info!("access token refreshed");
                Ok(())
            }
            Err(err) => {
                status.reauth_failed = true;
                tracing::error!("{err}");
                // next ensure() mints a fresh pair from the client credentials
                if let Err(clear_err) = self.session.clear_credentials() {
                    tracing::warn!("clearing credentials failed: {clear_err:#}");
                }
                Err(err)
            }
        }
    }

    fn status(&self) -> AuthStatus {
        *self.status.read()
    }
}

#[derive(Serialize)]
struct ApkRequest<'a> {
    method: &'a str,
    key: &'a str,
    secret: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.error.is_empty(), self.message.is_empty()) {
            (true, true) => write!(f, "unknown token error"),
            (false, true) => write!(f, "{}", self.error),
            (true, false) => write!(f, "{}", self.message),
            (false, false) => write!(f, "{} ({})", self.error, self.message),
        }
    }
}
