// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-application credential file
//!
//! One flat TOML file per Strava client id holding the client secret, the
//! current token pair and the scope the athlete granted.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use crate::constants::env_config;
use crate::error::{Result, StravaError};
use crate::oauth2_client::TokenSet;
use crate::scope::AccessScope;

const APP_DIR: &str = "stravalink";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Unix seconds
    pub expires_at: Option<i64>,
    pub expires_in: Option<i64>,
    /// Scope list as granted on the last authorization
    pub scope: Option<String>,
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// `$STRAVALINK_CONFIG_DIR/<client_id>.toml`, falling back to the
    /// platform config directory.
    pub fn default_path(client_id: &str) -> PathBuf {
        let dir = env_config::config_dir().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|p| p.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        dir.join(format!("{}.toml", client_id))
    }

    /// Load the file at `path`; a missing file yields an empty config.
    pub fn load(path: &Path, client_id: &str) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file yet, starting empty");
            return Ok(Self::new(client_id));
        }

        let content = fs::read_to_string(path).map_err(|source| StravaError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ClientConfig =
            toml::from_str(&content).map_err(|source| StravaError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;

        if config.client_id.is_empty() {
            config.client_id = client_id.to_string();
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        let write_err = |source| StravaError::ConfigWrite {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path).map_err(write_err)?;
        file.write_all(content.as_bytes()).map_err(write_err)?;

        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    pub fn store_tokens(&mut self, tokens: &TokenSet) {
        self.access_token = Some(tokens.access_token.clone());
        self.refresh_token = Some(tokens.refresh_token.clone());
        self.expires_at = Some(tokens.expires_at.timestamp());
        self.expires_in = Some(tokens.expires_in);
    }

    /// Stored token pair, if complete.
    pub fn token_set(&self) -> Option<TokenSet> {
        let expires_at = DateTime::from_timestamp(self.expires_at?, 0)?;
        Some(TokenSet {
            access_token: self.access_token.clone()?,
            refresh_token: self.refresh_token.clone()?,
            expires_at,
            expires_in: self.expires_in.unwrap_or_default(),
            athlete: None,
        })
    }

    pub fn granted_scope(&self) -> AccessScope {
        self.scope
            .as_deref()
            .map(AccessScope::from_granted)
            .unwrap_or_default()
    }

    pub fn set_granted_scope(&mut self, scope: &AccessScope) {
        self.scope = Some(scope.to_string());
    }
}
