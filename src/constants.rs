// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Constants Module
//!
//! Strava endpoints, OAuth parameter names and the environment lookups that
//! can override them.

/// API endpoints and URLs
pub mod endpoints {
    /// Strava REST API root
    pub const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
    /// Consent page the user is sent to
    pub const STRAVA_AUTH_URL: &str = "https://www.strava.com/oauth/authorize";
    /// Code exchange and refresh endpoint
    pub const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

    /// Paths relative to the API root
    pub const ACTIVITIES_PATH: &str = "/activities";
    pub const UPLOADS_PATH: &str = "/uploads";
    pub const ATHLETE_PATH: &str = "/athlete";
}

/// Environment-based configuration
pub mod env_config {
    use std::env;
    use std::path::PathBuf;

    /// Get Strava client ID from environment
    pub fn strava_client_id() -> Option<String> {
        env::var("STRAVA_CLIENT_ID").ok().filter(|v| !v.is_empty())
    }

    /// Get Strava client secret from environment
    pub fn strava_client_secret() -> Option<String> {
        env::var("STRAVA_CLIENT_SECRET").ok().filter(|v| !v.is_empty())
    }

    /// Directory holding the per-client config files
    pub fn config_dir() -> Option<PathBuf> {
        env::var("STRAVALINK_CONFIG_DIR").ok().map(PathBuf::from)
    }

    /// Get Strava API base URL from environment or default
    pub fn strava_api_base() -> String {
        env::var("STRAVA_API_BASE")
            .unwrap_or_else(|_| super::endpoints::STRAVA_API_BASE.to_string())
    }

    /// Get Strava auth URL from environment or default
    pub fn strava_auth_url() -> String {
        env::var("STRAVA_AUTH_URL")
            .unwrap_or_else(|_| super::endpoints::STRAVA_AUTH_URL.to_string())
    }

    /// Get Strava token URL from environment or default
    pub fn strava_token_url() -> String {
        env::var("STRAVA_TOKEN_URL")
            .unwrap_or_else(|_| super::endpoints::STRAVA_TOKEN_URL.to_string())
    }

    /// Get log level from environment or default
    pub fn log_level() -> String {
        env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string())
    }
}

/// OAuth scopes, parameter names and token lifetime
pub mod oauth {
    /// Scope requested when the caller does not name one
    pub const DEFAULT_SCOPE: &str = "read";

    /// Tokens with less than this many seconds left are refreshed before use
    pub const REFRESH_THRESHOLD_SECS: i64 = 600;

    /// Loopback address the redirect listener binds to
    pub const CALLBACK_HOST: &str = "127.0.0.1";

    pub const PARAM_CLIENT_ID: &str = "client_id";
    pub const PARAM_CLIENT_SECRET: &str = "client_secret";
    pub const PARAM_REDIRECT_URI: &str = "redirect_uri";
    pub const PARAM_RESPONSE_TYPE: &str = "response_type";
    pub const PARAM_APPROVAL_PROMPT: &str = "approval_prompt";
    pub const PARAM_SCOPE: &str = "scope";
    pub const PARAM_STATE: &str = "state";
    pub const PARAM_GRANT_TYPE: &str = "grant_type";
    pub const PARAM_CODE: &str = "code";
    pub const PARAM_REFRESH_TOKEN: &str = "refresh_token";
    pub const PARAM_ERROR: &str = "error";

    pub const RESPONSE_TYPE_CODE: &str = "code";
    pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
    pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";
}

/// Pages served back to the browser by the redirect listener
pub mod messages {
    pub const ACCESS_GRANTED_PAGE: &str = "<html><body>\
        <h1>Authorization successful!</h1>\
        <p>You can close this window and return to the terminal.</p>\
        </body></html>";

    pub const ACCESS_DENIED_PAGE: &str = "<html><body>\
        <h1>Authorization denied</h1>\
        <p>Strava did not grant access. You can close this window.</p>\
        </body></html>";

    pub const NOT_FOUND_PAGE: &str = "<html><body><h1>Not found</h1></body></html>";
}
