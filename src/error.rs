// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error type shared by every module of the client.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while authorizing against or talking to Strava.
#[derive(Debug, Error)]
pub enum StravaError {
    /// The token endpoint rejected a code exchange or refresh.
    #[error("Token exchange failed (HTTP {status}): {body}")]
    TokenExchange { status: u16, body: String },

    /// An API call returned a non-success status.
    #[error("Strava API request failed (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// The athlete approved fewer scopes than were requested.
    #[error("Scope access not granted: requested '{requested}', granted '{granted}'")]
    ScopeNotGranted { requested: String, granted: String },

    /// The consent page redirected back with an error.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid state parameter in authorization redirect")]
    StateMismatch,

    #[error("Authorization cancelled by user")]
    Cancelled,

    #[error("Timed out waiting for the authorization redirect")]
    Timeout,

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Unknown sport type: {0}")]
    InvalidSport(String),

    /// A start timestamp that maps to no calendar date.
    #[error("Invalid start time: {0}")]
    InvalidStartTime(String),

    #[error("Cannot infer activity file type from '{0}'")]
    UnknownFileType(String),

    #[error("Client secret not available")]
    MissingClientSecret,

    /// Tokens are missing from the stored configuration.
    #[error("Not authorized: no access token stored")]
    NotAuthorized,

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl StravaError {
    /// HTTP status attached to the error, if it came from a Strava response.
    pub fn status(&self) -> Option<u16> {
        match self {
            StravaError::TokenExchange { status, .. } | StravaError::Api { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StravaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_exchange_error_carries_status_and_body() {
        let err = StravaError::TokenExchange {
            status: 400,
            body: r#"{"message":"Bad Request"}"#.to_string(),
        };

        assert_eq!(err.status(), Some(400));
        let msg = err.to_string();
        assert!(msg.contains("HTTP 400"));
        assert!(msg.contains("Bad Request"));
    }

    #[test]
    fn test_status_absent_for_local_errors() {
        assert_eq!(StravaError::Cancelled.status(), None);
        assert_eq!(StravaError::StateMismatch.status(), None);
    }
}
