use serde::{Deserialize, Serialize};
use std::fmt;

/// RFC 6749 shaped error used across the workspace.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OAuth2Error {
    pub error: String,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
}

impl OAuth2Error {
    pub fn new(error: &str, description: Option<&str>) -> Self {
        Self {
            error: error.to_string(),
            error_description: description.map(|s| s.to_string()),
            error_uri: None,
        }
    }

    pub fn invalid_request(description: &str) -> Self {
        Self::new("invalid_request", Some(description))
    }

    pub fn invalid_grant(description: &str) -> Self {
        Self::new("invalid_grant", Some(description))
    }

    pub fn server_error(description: &str) -> Self {
        Self::new("server_error", Some(description))
    }

    /// A stored field value that could not be decoded back into an object.
    ///
    /// This signals data corruption or a schema mismatch and is never retried.
    pub fn corrupt_field(description: &str) -> Self {
        Self::server_error(&format!("corrupt field value: {description}"))
    }

    pub fn is_server_error(&self) -> bool {
        self.error == "server_error"
    }
}

impl fmt::Display for OAuth2Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuth2Error {}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for OAuth2Error {
    fn from(err: sqlx::Error) -> Self {
        // Provide a stable, non-leaky mapping for common constraint violations.
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err.code().unwrap_or_default();
            let msg = db_err.message();

            // Postgres unique violation: 23505
            // SQLite constraint error codes vary by extended code; also match by message.
            let is_unique = code == "23505"
                || code == "2067"
                || code == "1555"
                || msg.contains("UNIQUE constraint failed")
                || msg.contains("duplicate key");

            if is_unique {
                return Self::invalid_request("duplicate key");
            }
        }

        Self::server_error(&err.to_string())
    }
}
