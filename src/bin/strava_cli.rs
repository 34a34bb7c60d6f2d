// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Method;
use std::path::PathBuf;
use std::time::Duration;
use stravalink::browser::SystemBrowser;
use stravalink::constants::{env_config, oauth};
use stravalink::flow::FlowOptions;
use stravalink::logging::LoggingConfig;
use stravalink::models::{ActivityFileType, ActivityUpload, ManualActivity, Sport, StartTime};
use stravalink::oauth2_client::ApprovalPrompt;
use stravalink::scope::{AccessScope, Scope};
use stravalink::{StravaClient, StravaError};
use tracing::info;

#[derive(Parser)]
#[command(name = "strava-cli")]
#[command(about = "Authorize against Strava and log activities")]
#[command(version)]
struct Cli {
    /// Strava application client ID (default: $STRAVA_CLIENT_ID)
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// Config file holding the tokens (default: per-client file in the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Comma-separated scopes to request, e.g. `read,activity:write`
    #[arg(long, global = true)]
    scope: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize the application and store the tokens
    Auth {
        /// Ask for consent even if stored tokens cover the scope
        #[arg(long)]
        force: bool,

        /// Print the consent URL without launching a browser
        #[arg(long)]
        no_browser: bool,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Create a manual activity
    CreateActivity {
        #[arg(long)]
        name: String,

        /// Sport type, e.g. Run, Ride, Swim
        #[arg(long)]
        sport: Sport,

        /// Local start time (`2024-05-01T07:30:00`) or Unix timestamp
        #[arg(long)]
        start: String,

        /// Elapsed time in seconds
        #[arg(long)]
        elapsed: u64,

        /// Distance in meters
        #[arg(long)]
        distance: Option<f64>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        trainer: bool,

        #[arg(long)]
        commute: bool,
    },

    /// Upload a FIT, TCX or GPX file
    Upload {
        file: PathBuf,

        /// File type (default: inferred from the file name)
        #[arg(long)]
        data_type: Option<ActivityFileType>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        external_id: Option<String>,

        #[arg(long)]
        trainer: bool,

        #[arg(long)]
        commute: bool,
    },

    /// Show the authorized athlete
    Athlete,

    /// Send an arbitrary authenticated request
    Request {
        /// HTTP method
        method: String,

        /// Path under the API root or absolute URL
        path: String,

        /// Query parameter `key=value`, repeatable
        #[arg(long = "query", short = 'q')]
        query: Vec<String>,

        /// Form field `key=value`, repeatable
        #[arg(long = "form", short = 'f')]
        form: Vec<String>,
    },
}

impl Commands {
    /// Scope requested when `--scope` is not given
    fn default_scope(&self) -> AccessScope {
        match self {
            Commands::CreateActivity { .. } | Commands::Upload { .. } => {
                AccessScope::new([Scope::Read, Scope::ActivityWrite])
            }
            _ => AccessScope::from_granted(oauth::DEFAULT_SCOPE),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    LoggingConfig::from_env().with_verbosity(cli.verbose).init()?;

    let client_id = cli
        .client_id
        .or_else(env_config::strava_client_id)
        .context("No client id: pass --client-id or set STRAVA_CLIENT_ID")?;
    let scope = match &cli.scope {
        Some(s) => s.parse::<AccessScope>()?,
        None => cli.command.default_scope(),
    };

    let mut builder = StravaClient::builder(client_id, scope);
    if let Some(path) = cli.config {
        builder = builder.config_path(path);
    }

    if let Commands::Auth {
        force,
        no_browser,
        timeout,
    } = &cli.command
    {
        builder = builder
            .force_authorization(*force)
            .prompt(SystemBrowser {
                print_only: *no_browser,
            })
            .flow_options(FlowOptions {
                approval_prompt: if *force {
                    ApprovalPrompt::Force
                } else {
                    ApprovalPrompt::Auto
                },
                timeout: timeout.map(Duration::from_secs),
            });
    }

    let mut client = builder.connect().await?;

    let output = match cli.command {
        Commands::Auth { .. } => {
            let tokens = client.config().token_set().ok_or(StravaError::NotAuthorized)?;
            info!(config = %client.config_path().display(), "Tokens stored");
            serde_json::json!({
                "scope": client.granted_scope().to_string(),
                "expires_at": tokens.expires_at.to_rfc3339(),
                "config": client.config_path().display().to_string(),
            })
        }
        Commands::CreateActivity {
            name,
            sport,
            start,
            elapsed,
            distance,
            description,
            trainer,
            commute,
        } => {
            let start: StartTime = match start.parse::<f64>() {
                Ok(timestamp) => timestamp.into(),
                Err(_) => start.into(),
            };
            let mut activity = ManualActivity::new(name, sport, start, elapsed)
                .trainer(trainer)
                .commute(commute);
            if let Some(distance) = distance {
                activity = activity.distance(distance);
            }
            if let Some(description) = description {
                activity = activity.description(description);
            }
            client.create_manual_activity(&activity).await?
        }
        Commands::Upload {
            file,
            data_type,
            name,
            description,
            external_id,
            trainer,
            commute,
        } => {
            let data_type = match data_type {
                Some(data_type) => data_type,
                None => ActivityFileType::from_path(&file)?,
            };
            let upload = ActivityUpload {
                name,
                description,
                external_id,
                trainer,
                commute,
                ..ActivityUpload::new(data_type)
            };
            client.upload_activity(&file, &upload).await?
        }
        Commands::Athlete => client.athlete().await?,
        Commands::Request {
            method,
            path,
            query,
            form,
        } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("Invalid HTTP method: {}", method))?;
            let query = parse_pairs(&query)?;
            let form = parse_pairs(&form)?;
            let form = if form.is_empty() { None } else { Some(&form[..]) };
            client.request(method, &path, &query, form).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn parse_pairs(raw: &[String]) -> Result<Vec<(&str, String)>> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k, v.to_string()))
                .ok_or_else(|| anyhow!("Expected key=value, got `{}`", pair))
        })
        .collect()
}
