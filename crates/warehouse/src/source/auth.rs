//! Delegated-access token acquisition
//!
//! Exchanges client credentials for a bearer token at the tenant's token
//! endpoint and caches it until shortly before it expires.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;
use ureq::Agent;
use url::Url;

use super::SourceError;
use super::api::TokenResponse;
use crate::config::SourceCredentials;

/// Scopes requested for every token
const SCOPE: &str = "seismic.reporting seismic.library.view seismic.user.manage seismic.user.view";

/// Tokens are treated as expired this long before the server says they are
const EXPIRY_MARGIN_SECS: i64 = 10;

/// A bearer token and when it stops being usable
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Build a cache entry from a token response received at `now`
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        let expires_at = response
            .expires_in
            .map(|secs| now + Duration::seconds(secs - EXPIRY_MARGIN_SECS));
        Self {
            access_token: response.access_token,
            expires_at,
        }
    }

    /// Whether the token can still be used at `now`
    ///
    /// A token without a known expiry is never considered fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at > now)
    }
}

/// Supplies bearer tokens, refreshing them before they expire
pub struct CredentialProvider {
    agent: Agent,
    credentials: SourceCredentials,
    token_url: Url,
    cached: Mutex<Option<CachedToken>>,
}

impl CredentialProvider {
    pub fn new(agent: Agent, credentials: SourceCredentials, auth_base: &Url) -> Result<Self> {
        let token_url = token_url(auth_base, &credentials.tenant)?;
        Ok(Self {
            agent,
            credentials,
            token_url,
            cached: Mutex::new(None),
        })
    }

    /// A token valid right now, from cache or freshly acquired
    pub fn access_token(&self) -> Result<String> {
        self.access_token_at(Utc::now())
    }

    fn access_token_at(&self, now: DateTime<Utc>) -> Result<String> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| anyhow!("Token cache lock poisoned"))?;

        if let Some(token) = cached.as_ref()
            && token.is_fresh(now)
        {
            return Ok(token.access_token.clone());
        }

        log::debug!("Getting a new access token");
        let response = self.request_token()?;
        let token = CachedToken::from_response(response, now);
        let access_token = token.access_token.clone();
        *cached = Some(token);

        Ok(access_token)
    }

    fn request_token(&self) -> Result<TokenResponse> {
        let endpoint = self.token_url.path();
        let mut response = self
            .agent
            .post(self.token_url.as_str())
            .header("Accept", "application/json")
            .send_form([
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("grant_type", "delegation"),
                ("scope", SCOPE),
                ("user_id", self.credentials.user_id.as_str()),
            ])
            .map_err(|e| SourceError::from_ureq(endpoint, e))
            .context("Failed to request access token")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        Ok(token)
    }
}

/// `{auth_base}/tenants/{tenant}/connect/token`
fn token_url(auth_base: &Url, tenant: &str) -> Result<Url> {
    let path = format!("tenants/{}/connect/token", urlencoding::encode(tenant));
    auth_base
        .join(&path)
        .with_context(|| format!("Could not build token URL for tenant {:?}", tenant))
}
