use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::OAuth2Error;

/// Successful token endpoint response (RFC 6749 section 5.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in: None,
            refresh_token: None,
            scope: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Absolute expiry of the access token, counted from `now`.
    ///
    /// An `expires_in` that does not fit a timestamp is rejected.
    pub fn expiry_from(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, OAuth2Error> {
        let Some(seconds) = self.expires_in else {
            return Ok(None);
        };

        TimeDelta::try_seconds(seconds)
            .and_then(|delta| now.checked_add_signed(delta))
            .map(Some)
            .ok_or_else(|| {
                OAuth2Error::server_error(&format!(
                    "token endpoint returned an out-of-range expires_in: {seconds}"
                ))
            })
    }
}
