use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{parse_scopes, Credentials, OAuth2Error, TokenResponse};

pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://accounts.google.com/o/oauth2/token";

/// State of an in-progress authorization code exchange (web server flow).
///
/// Step one produces the URL the user is sent to; step two turns the returned
/// code into [`Credentials`]. The flow is persisted between the two steps, which
/// is why it is serializable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flow {
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Extra query parameters appended to the authorization URL.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl Flow {
    pub fn new(client_id: String, client_secret: String, scope: String) -> Self {
        let mut params = BTreeMap::new();
        params.insert("access_type".to_string(), "offline".to_string());

        Self {
            client_id,
            client_secret,
            scope,
            user_agent: None,
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            redirect_uri: None,
            params,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_auth_uri(mut self, auth_uri: impl Into<String>) -> Self {
        self.auth_uri = auth_uri.into();
        self
    }

    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Step one: build the authorization URL and remember `redirect_uri` for step two.
    pub fn authorize_url(&mut self, redirect_uri: &str) -> Result<String, OAuth2Error> {
        self.redirect_uri = Some(redirect_uri.to_string());

        let mut query: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", self.scope.as_str()),
            ("response_type", "code"),
        ];
        query.extend(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let encoded = serde_urlencoded::to_string(&query)
            .map_err(|e| OAuth2Error::server_error(&e.to_string()))?;

        let sep = if self.auth_uri.contains('?') { '&' } else { '?' };
        Ok(format!("{}{sep}{encoded}", self.auth_uri))
    }

    /// Step two request: the form body to POST to `token_uri`.
    pub fn exchange_request_body(&self, code: &str) -> Result<String, OAuth2Error> {
        let redirect_uri = self.redirect_uri.as_deref().ok_or_else(|| {
            OAuth2Error::invalid_request("authorize_url must be called before exchanging a code")
        })?;

        serde_urlencoded::to_string([
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("scope", self.scope.as_str()),
        ])
        .map_err(|e| OAuth2Error::server_error(&e.to_string()))
    }

    /// Step two result: credentials built from the token endpoint response.
    pub fn credentials_from_response(
        &self,
        response: TokenResponse,
    ) -> Result<Credentials, OAuth2Error> {
        let token_expiry = response.expiry_from(chrono::Utc::now())?;
        let scopes = parse_scopes(response.scope.as_deref().unwrap_or(&self.scope));

        let mut credentials = Credentials::new(
            response.access_token,
            self.client_id.clone(),
            self.client_secret.clone(),
            response.refresh_token,
            token_expiry,
            self.token_uri.clone(),
            self.user_agent.clone(),
        );
        credentials.scopes = scopes;
        Ok(credentials)
    }
}
