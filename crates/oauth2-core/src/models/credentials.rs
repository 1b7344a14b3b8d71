use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::{covers_scopes, parse_scopes, OAuth2Error, TokenResponse};

/// Write-back capability a persisted value can be bound to.
///
/// The storage adapter hands an implementation of this to every credential it
/// returns, so that a later token refresh lands in the same record.
#[async_trait]
pub trait PersistCallback<T>: Send + Sync {
    async fn persist(&self, value: &T) -> Result<(), OAuth2Error>;
}

pub type DynCredentialsStore = Arc<dyn PersistCallback<Credentials>>;

/// An OAuth2 token set plus the client data needed to refresh it.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_expiry: Option<DateTime<Utc>>,
    pub token_uri: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub invalid: bool,

    #[serde(skip)]
    store: Option<DynCredentialsStore>,
}

impl Credentials {
    pub fn new(
        access_token: String,
        client_id: String,
        client_secret: String,
        refresh_token: Option<String>,
        token_expiry: Option<DateTime<Utc>>,
        token_uri: String,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            access_token,
            client_id,
            client_secret,
            refresh_token,
            token_expiry,
            token_uri,
            user_agent,
            scopes: Vec::new(),
            invalid: false,
            store: None,
        }
    }

    pub fn with_scopes(mut self, scope: &str) -> Self {
        self.scopes = parse_scopes(scope);
        self
    }

    /// Bind the callback invoked whenever these credentials change.
    pub fn set_store(&mut self, store: DynCredentialsStore) {
        self.store = Some(store);
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.token_expiry.is_some_and(|expiry| expiry <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn has_scopes(&self, requested: &str) -> bool {
        covers_scopes(&self.scopes, requested)
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Form body for a `refresh_token` grant against `token_uri`.
    pub fn refresh_request_body(&self) -> Result<String, OAuth2Error> {
        let refresh_token = self
            .refresh_token
            .as_deref()
            .ok_or_else(|| OAuth2Error::invalid_grant("credentials have no refresh token"))?;

        serde_urlencoded::to_string([
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ])
        .map_err(|e| OAuth2Error::server_error(&e.to_string()))
    }

    /// Apply a refresh response and write the result through the bound store.
    pub async fn apply_token_response(
        &mut self,
        response: TokenResponse,
    ) -> Result<(), OAuth2Error> {
        self.apply_token_response_at(response, Utc::now()).await
    }

    pub async fn apply_token_response_at(
        &mut self,
        response: TokenResponse,
        now: DateTime<Utc>,
    ) -> Result<(), OAuth2Error> {
        let token_expiry = response.expiry_from(now)?;

        self.access_token = response.access_token;
        // Servers may omit the refresh token on refresh; keep the old one then.
        if let Some(refresh_token) = response.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        self.token_expiry = token_expiry;
        if let Some(scope) = response.scope {
            self.scopes = parse_scopes(&scope);
        }
        self.invalid = false;

        self.persist().await
    }

    /// Mark the credentials as rejected by the provider (e.g. `invalid_grant`).
    pub async fn invalidate(&mut self) -> Result<(), OAuth2Error> {
        self.invalid = true;
        self.persist().await
    }

    async fn persist(&self) -> Result<(), OAuth2Error> {
        match &self.store {
            Some(store) => store.persist(self).await,
            None => Ok(()),
        }
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.access_token == other.access_token
            && self.client_id == other.client_id
            && self.client_secret == other.client_secret
            && self.refresh_token == other.refresh_token
            && self.token_expiry == other.token_expiry
            && self.token_uri == other.token_uri
            && self.user_agent == other.user_agent
            && self.scopes == other.scopes
            && self.invalid == other.invalid
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secrets.
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("token_expiry", &self.token_expiry)
            .field("token_uri", &self.token_uri)
            .field("scopes", &self.scopes)
            .field("invalid", &self.invalid)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("has_store", &self.store.is_some())
            .finish()
    }
}
