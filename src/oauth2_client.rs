// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! OAuth2 authorization-code grant against Strava's token endpoint

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::constants::{endpoints, env_config, oauth};
use crate::error::{Result, StravaError};
use crate::scope::AccessScope;

/// Where the OAuth and REST calls go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub api_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize_url: endpoints::STRAVA_AUTH_URL.to_string(),
            token_url: endpoints::STRAVA_TOKEN_URL.to_string(),
            api_base: endpoints::STRAVA_API_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Endpoints with `STRAVA_AUTH_URL`, `STRAVA_TOKEN_URL` and
    /// `STRAVA_API_BASE` applied on top of the defaults.
    pub fn from_env() -> Self {
        Self {
            authorize_url: env_config::strava_auth_url(),
            token_url: env_config::strava_token_url(),
            api_base: env_config::strava_api_base(),
        }
    }

    /// Mirror Strava's path layout under another host, e.g. a mock server.
    pub fn with_host(host: &str) -> Self {
        let host = host.trim_end_matches('/');
        Self {
            authorize_url: format!("{}/oauth/authorize", host),
            token_url: format!("{}/oauth/token", host),
            api_base: format!("{}/api/v3", host),
        }
    }
}

/// Whether Strava shows the consent page to an athlete who already approved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApprovalPrompt {
    #[default]
    Auto,
    Force,
}

impl ApprovalPrompt {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalPrompt::Auto => "auto",
            ApprovalPrompt::Force => "force",
        }
    }
}

/// The two grants this client performs against the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
}

impl GrantType {
    /// Value of the `grant_type` parameter
    pub fn grant_type(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => oauth::GRANT_AUTHORIZATION_CODE,
            GrantType::RefreshToken => oauth::GRANT_REFRESH_TOKEN,
        }
    }

    /// Name of the parameter carrying the code or refresh token
    pub fn param_name(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => oauth::PARAM_CODE,
            GrantType::RefreshToken => oauth::PARAM_REFRESH_TOKEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AthleteSummary {
    pub id: i64,
    pub username: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

/// Access and refresh token pair with its expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
    /// Only present on the initial code exchange
    pub athlete: Option<AthleteSummary>,
}

impl TokenSet {
    /// True when less than `threshold` of lifetime is left.
    pub fn needs_refresh(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.expires_at - now < threshold
    }
}

#[derive(Debug, Deserialize)]
struct StravaTokenResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
    expires_in: i64,
    athlete: Option<AthleteSummary>,
}

impl From<StravaTokenResponse> for TokenSet {
    fn from(response: StravaTokenResponse) -> Self {
        TokenSet {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: DateTime::from_timestamp(response.expires_at, 0).unwrap_or_else(Utc::now),
            expires_in: response.expires_in,
            athlete: response.athlete,
        }
    }
}

/// OAuth2 client bound to one Strava application.
#[derive(Debug, Clone)]
pub struct StravaOAuth {
    client_id: String,
    client_secret: String,
    endpoints: Endpoints,
    client: Client,
}

impl StravaOAuth {
    pub fn new(client_id: String, client_secret: String, endpoints: Endpoints) -> Self {
        Self::with_http_client(client_id, client_secret, endpoints, Client::new())
    }

    pub fn with_http_client(
        client_id: String,
        client_secret: String,
        endpoints: Endpoints,
        client: Client,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            endpoints,
            client,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Build the consent page URL the athlete is sent to.
    pub fn authorize_url(
        &self,
        redirect_uri: &str,
        scope: &AccessScope,
        state: &str,
        approval_prompt: ApprovalPrompt,
    ) -> Result<Url> {
        let mut url = Url::parse(&self.endpoints.authorize_url)?;

        url.query_pairs_mut()
            .append_pair(oauth::PARAM_CLIENT_ID, &self.client_id)
            .append_pair(oauth::PARAM_REDIRECT_URI, redirect_uri)
            .append_pair(oauth::PARAM_RESPONSE_TYPE, oauth::RESPONSE_TYPE_CODE)
            .append_pair(oauth::PARAM_APPROVAL_PROMPT, approval_prompt.as_str())
            .append_pair(oauth::PARAM_SCOPE, &scope.to_string())
            .append_pair(oauth::PARAM_STATE, state);

        Ok(url)
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        let token = self.token_exchange(GrantType::AuthorizationCode, code).await?;

        if let Some(athlete) = &token.athlete {
            info!(
                "Authenticated as Strava athlete: {} ({})",
                athlete.id,
                athlete.username.as_deref().unwrap_or("unknown")
            );
        }

        Ok(token)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        let token = self.token_exchange(GrantType::RefreshToken, refresh_token).await?;
        info!(expires_at = %token.expires_at, "Token refreshed successfully");
        Ok(token)
    }

    async fn token_exchange(&self, grant: GrantType, credential: &str) -> Result<TokenSet> {
        let params = [
            (oauth::PARAM_CLIENT_ID, self.client_id.as_str()),
            (oauth::PARAM_CLIENT_SECRET, self.client_secret.as_str()),
            (oauth::PARAM_GRANT_TYPE, grant.grant_type()),
            (grant.param_name(), credential),
        ];

        debug!(grant_type = grant.grant_type(), url = %self.endpoints.token_url, "Requesting token");

        let response = self
            .client
            .post(&self.endpoints.token_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StravaError::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }

        let response: StravaTokenResponse = response.json().await?;
        Ok(response.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use std::collections::HashMap;

    fn token_expiring_in(now: DateTime<Utc>, secs: i64) -> TokenSet {
        TokenSet {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: now + Duration::seconds(secs),
            expires_in: secs,
            athlete: None,
        }
    }

    #[test]
    fn test_needs_refresh_below_threshold_only() {
        let now = Utc::now();
        let threshold = Duration::seconds(oauth::REFRESH_THRESHOLD_SECS);

        assert!(token_expiring_in(now, 599).needs_refresh(now, threshold));
        assert!(token_expiring_in(now, -30).needs_refresh(now, threshold));
        assert!(!token_expiring_in(now, 600).needs_refresh(now, threshold));
        assert!(!token_expiring_in(now, 6 * 3600).needs_refresh(now, threshold));
    }

    #[test]
    fn test_grant_type_parameters() {
        assert_eq!(GrantType::AuthorizationCode.grant_type(), "authorization_code");
        assert_eq!(GrantType::AuthorizationCode.param_name(), "code");
        assert_eq!(GrantType::RefreshToken.grant_type(), "refresh_token");
        assert_eq!(GrantType::RefreshToken.param_name(), "refresh_token");
    }

    #[test]
    fn test_authorize_url_contains_required_parameters() {
        let oauth = StravaOAuth::new("1234".to_string(), "secret".to_string(), Endpoints::default());
        let scope = AccessScope::new([Scope::Read, Scope::ActivityWrite]);

        let url = oauth
            .authorize_url("http://127.0.0.1:40000", &scope, "state-1", ApprovalPrompt::Auto)
            .unwrap();

        assert!(url.as_str().starts_with("https://www.strava.com/oauth/authorize?"));
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "1234");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:40000");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["approval_prompt"], "auto");
        assert_eq!(params["scope"], "read,activity:write");
        assert_eq!(params["state"], "state-1");
        assert!(!params.contains_key("client_secret"));
    }

    #[test]
    fn test_endpoints_with_host() {
        let endpoints = Endpoints::with_host("http://127.0.0.1:1234/");
        assert_eq!(endpoints.authorize_url, "http://127.0.0.1:1234/oauth/authorize");
        assert_eq!(endpoints.token_url, "http://127.0.0.1:1234/oauth/token");
        assert_eq!(endpoints.api_base, "http://127.0.0.1:1234/api/v3");
    }

    #[test]
    fn test_token_response_conversion() {
        let response: StravaTokenResponse = serde_json::from_str(
            r#"{
                "token_type": "Bearer",
                "expires_at": 1700000000,
                "expires_in": 21600,
                "refresh_token": "r1",
                "access_token": "a1",
                "athlete": {"id": 42, "username": "runner"}
            }"#,
        )
        .unwrap();

        let token = TokenSet::from(response);
        assert_eq!(token.access_token, "a1");
        assert_eq!(token.refresh_token, "r1");
        assert_eq!(token.expires_at.timestamp(), 1_700_000_000);
        assert_eq!(token.expires_in, 21600);
        assert_eq!(token.athlete.unwrap().id, 42);
    }
}
