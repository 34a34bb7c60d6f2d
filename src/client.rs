// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Authenticated Strava API client
//!
//! [`ClientBuilder::connect`] makes sure a usable token pair with the
//! requested scope is stored, running the consent flow when it is not. Every
//! call on [`StravaClient`] then refreshes the access token if it is close to
//! expiry before sending the request.

use chrono::{Duration, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::browser::{AuthorizationPrompt, SystemBrowser};
use crate::config::ClientConfig;
use crate::constants::{endpoints, env_config, oauth};
use crate::error::{Result, StravaError};
use crate::flow::{self, FlowOptions};
use crate::logging::AppLogger;
use crate::models::{ActivityUpload, ManualActivity};
use crate::oauth2_client::{Endpoints, StravaOAuth};
use crate::scope::AccessScope;

pub struct ClientBuilder {
    client_id: String,
    scope: AccessScope,
    config_path: Option<PathBuf>,
    endpoints: Option<Endpoints>,
    client_secret: Option<String>,
    prompt: Option<Box<dyn AuthorizationPrompt>>,
    flow_options: FlowOptions,
    force_authorization: bool,
    http: Option<Client>,
}

impl ClientBuilder {
    pub fn new(client_id: impl Into<String>, scope: AccessScope) -> Self {
        Self {
            client_id: client_id.into(),
            scope,
            config_path: None,
            endpoints: None,
            client_secret: None,
            prompt: None,
            flow_options: FlowOptions::default(),
            force_authorization: false,
            http: None,
        }
    }

    /// Defaults to [`ClientConfig::default_path`].
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Defaults to [`Endpoints::from_env`].
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Overrides the stored secret.
    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Defaults to [`SystemBrowser`].
    pub fn prompt(mut self, prompt: impl AuthorizationPrompt + 'static) -> Self {
        self.prompt = Some(Box::new(prompt));
        self
    }

    pub fn flow_options(mut self, options: FlowOptions) -> Self {
        self.flow_options = options;
        self
    }

    /// Run the consent flow even when stored tokens look usable.
    pub fn force_authorization(mut self, force: bool) -> Self {
        self.force_authorization = force;
        self
    }

    pub fn http_client(mut self, client: Client) -> Self {
        self.http = Some(client);
        self
    }

    pub async fn connect(self) -> Result<StravaClient> {
        let config_path = self
            .config_path
            .unwrap_or_else(|| ClientConfig::default_path(&self.client_id));
        let mut config = ClientConfig::load(&config_path, &self.client_id)?;
        let prompt = self
            .prompt
            .unwrap_or_else(|| Box::new(SystemBrowser::new()));

        let mut reauthorize = self.force_authorization;
        let mut dirty = false;

        let client_secret = match (config.client_secret.clone(), self.client_secret) {
            (Some(stored), Some(given)) if stored != given => {
                config.client_secret = Some(given.clone());
                dirty = true;
                given
            }
            (Some(stored), _) => stored,
            (None, given) => {
                let secret = match given.or_else(env_config::strava_client_secret) {
                    Some(secret) => secret,
                    None => prompt.read_client_secret().await?,
                };
                config.client_secret = Some(secret.clone());
                dirty = true;
                reauthorize = true;
                secret
            }
        };

        if !config.granted_scope().covers(&self.scope) {
            info!(
                requested = %self.scope,
                stored = config.scope.as_deref().unwrap_or(""),
                "Stored scope does not cover the requested scope"
            );
            reauthorize = true;
        }
        if config.token_set().is_none() {
            debug!("No stored tokens");
            reauthorize = true;
        }

        let http = self.http.unwrap_or_default();
        let endpoints = self.endpoints.unwrap_or_else(Endpoints::from_env);
        let oauth = StravaOAuth::with_http_client(
            self.client_id.clone(),
            client_secret,
            endpoints,
            http.clone(),
        );

        if reauthorize {
            let authorization =
                flow::authorize(&oauth, &self.scope, prompt.as_ref(), &self.flow_options).await;
            let authorization = match authorization {
                Ok(authorization) => authorization,
                Err(e) => {
                    AppLogger::log_oauth_event(&self.client_id, "authorization", false);
                    return Err(e);
                }
            };

            let tokens = oauth.exchange_code(&authorization.code).await?;
            config.store_tokens(&tokens);
            config.set_granted_scope(&authorization.granted);
            dirty = true;
            AppLogger::log_oauth_event(&self.client_id, "authorization", true);
        }

        if dirty {
            config.save(&config_path)?;
        }

        Ok(StravaClient {
            oauth,
            http,
            config,
            config_path,
            refresh_threshold: Duration::seconds(oauth::REFRESH_THRESHOLD_SECS),
        })
    }
}

pub struct StravaClient {
    oauth: StravaOAuth,
    http: Client,
    config: ClientConfig,
    config_path: PathBuf,
    refresh_threshold: Duration,
}

impl StravaClient {
    pub fn builder(client_id: impl Into<String>, scope: AccessScope) -> ClientBuilder {
        ClientBuilder::new(client_id, scope)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn granted_scope(&self) -> AccessScope {
        self.config.granted_scope()
    }

    /// Return a usable access token, refreshing and persisting a new pair
    /// when less than the refresh threshold of lifetime remains.
    pub async fn ensure_fresh_token(&mut self) -> Result<String> {
        let tokens = self.config.token_set().ok_or(StravaError::NotAuthorized)?;

        if !tokens.needs_refresh(Utc::now(), self.refresh_threshold) {
            return Ok(tokens.access_token);
        }

        info!(expires_at = %tokens.expires_at, "Access token near expiry, refreshing");
        let fresh = match self.oauth.refresh(&tokens.refresh_token).await {
            Ok(fresh) => fresh,
            Err(e) => {
                AppLogger::log_oauth_event(self.oauth.client_id(), "refresh", false);
                return Err(e);
            }
        };
        self.config.store_tokens(&fresh);
        self.config.save(&self.config_path)?;
        AppLogger::log_oauth_event(self.oauth.client_id(), "refresh", true);

        Ok(fresh.access_token)
    }

    /// Send an authenticated request and return the JSON body.
    ///
    /// `url` is either absolute or a path under the API root
    /// (`/athlete/activities`).
    pub async fn request(
        &mut self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        form: Option<&[(&str, String)]>,
    ) -> Result<Value> {
        let token = self.ensure_fresh_token().await?;
        let url = self.resolve_url(url);

        let mut request = self.http.request(method.clone(), &url).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(form) = form {
            request = request.form(form);
        }

        self.send(request, &method, &url).await
    }

    /// `POST /activities`
    pub async fn create_manual_activity(&mut self, activity: &ManualActivity) -> Result<Value> {
        let form = activity.to_form()?;
        info!(name = %activity.name, sport = %activity.sport_type, "Creating manual activity");
        self.request(Method::POST, endpoints::ACTIVITIES_PATH, &[], Some(&form[..]))
            .await
    }

    /// `POST /uploads` with the file at `path`.
    ///
    /// Strava processes uploads asynchronously; poll [`Self::upload_status`]
    /// with the returned `id`.
    pub async fn upload_activity(&mut self, path: &Path, upload: &ActivityUpload) -> Result<Value> {
        let token = self.ensure_fresh_token().await?;
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("activity.{}", upload.data_type));

        let mut form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        for (name, value) in upload.to_fields() {
            form = form.text(name, value);
        }

        info!(path = %path.display(), data_type = %upload.data_type, "Uploading activity file");
        let url = self.resolve_url(endpoints::UPLOADS_PATH);
        let request = self.http.post(&url).bearer_auth(token).multipart(form);
        self.send(request, &Method::POST, &url).await
    }

    /// `GET /uploads/{id}`
    pub async fn upload_status(&mut self, upload_id: i64) -> Result<Value> {
        let path = format!("{}/{}", endpoints::UPLOADS_PATH, upload_id);
        self.request(Method::GET, &path, &[], None).await
    }

    /// `GET /athlete`
    pub async fn athlete(&mut self) -> Result<Value> {
        self.request(Method::GET, endpoints::ATHLETE_PATH, &[], None).await
    }

    fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        format!(
            "{}/{}",
            self.oauth.endpoints().api_base.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }

    async fn send(&self, request: RequestBuilder, method: &Method, url: &str) -> Result<Value> {
        let started = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        AppLogger::log_api_request(
            method.as_str(),
            url,
            status.as_u16(),
            started.elapsed().as_millis() as u64,
        );

        if !status.is_success() {
            return Err(StravaError::Api {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}
