// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # stravalink
//!
//! A personal Strava API client. It obtains access through the OAuth2
//! authorization-code grant, keeps the token pair in a per-application config
//! file, refreshes it shortly before expiry and wraps the few calls needed to
//! log activities.
//!
//! ## Authorization
//!
//! The first [`ClientBuilder::connect`] opens the Strava consent page in the
//! browser and listens on a loopback port for the redirect. The code it
//! carries is exchanged for tokens, which are stored together with the
//! granted scope. Later runs reuse the stored tokens as long as they cover the
//! requested scope.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use stravalink::models::{ManualActivity, Sport};
//! use stravalink::scope::{AccessScope, Scope};
//! use stravalink::StravaClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scope = AccessScope::new([Scope::Read, Scope::ActivityWrite]);
//!     let mut client = StravaClient::builder("12345", scope).connect().await?;
//!
//!     let run = ManualActivity::new("Lunch run", Sport::Run, "2024-05-01T12:30:00", 1800)
//!         .distance(5000.0);
//!     let created = client.create_manual_activity(&run).await?;
//!     println!("{}", created["id"]);
//!
//!     Ok(())
//! }
//! ```

/// Authenticated API client
pub mod client;

/// Activity payloads
pub mod models;

/// Per-client persisted settings and tokens
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Error types
pub mod error;

/// OAuth2 client for the Strava token endpoints
pub mod oauth2_client;

/// Strava permission scopes
pub mod scope;

/// Local redirect listener
pub mod callback;

/// Presenting the consent page
pub mod browser;

/// Interactive authorization flow
pub mod flow;

/// Logging and structured output
pub mod logging;

pub use client::{ClientBuilder, StravaClient};
pub use error::{Result, StravaError};
