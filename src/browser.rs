// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! User-facing side of authorization: showing the consent page and asking
//! for a missing client secret.

use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use std::process::{Command, Stdio};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, StravaError};

#[async_trait]
pub trait AuthorizationPrompt: Send + Sync {
    /// Send the athlete to the consent page at `url`.
    async fn present(&self, url: &Url) -> Result<()>;

    /// Obtain the application's client secret when none is stored.
    async fn read_client_secret(&self) -> Result<String>;
}

/// Opens the consent page in the default browser and reads the client
/// secret from the terminal.
#[derive(Debug, Clone, Default)]
pub struct SystemBrowser {
    /// Only print the URL
    pub print_only: bool,
}

impl SystemBrowser {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthorizationPrompt for SystemBrowser {
    async fn present(&self, url: &Url) -> Result<()> {
        println!("\nPlease visit this URL to authorize the application:");
        println!("{}\n", url);

        if !self.print_only {
            // The printed URL still works when no browser can be launched.
            if let Err(e) = open_url(url.as_str()) {
                warn!("Could not launch a browser: {}", e);
            }
        }
        Ok(())
    }

    async fn read_client_secret(&self) -> Result<String> {
        let line = tokio::task::spawn_blocking(read_secret_line)
            .await
            .map_err(io::Error::other)??;
        parse_secret(&line)
    }
}

fn read_secret_line() -> io::Result<String> {
    println!("Client Secret Not Found. Please Enter Client Secret:");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

fn parse_secret(line: &str) -> Result<String> {
    let secret = line.trim();
    if secret.is_empty() {
        return Err(StravaError::MissingClientSecret);
    }
    Ok(secret.to_string())
}

/// Launch the platform's URL handler.
pub fn open_url(url: &str) -> io::Result<()> {
    let mut command = browser_command(url);
    debug!(?command, "Launching browser");
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

fn browser_command(url: &str) -> Command {
    #[cfg(target_os = "macos")]
    {
        let mut command = Command::new("open");
        command.arg(url);
        command
    }

    #[cfg(target_os = "windows")]
    {
        let mut command = Command::new("cmd");
        command.args(["/c", "start", "", url]);
        command
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_command_receives_url() {
        let command = browser_command("https://www.strava.com/oauth/authorize?client_id=1");
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args.last().map(String::as_str),
            Some("https://www.strava.com/oauth/authorize?client_id=1")
        );
    }

    #[test]
    fn test_parse_secret() {
        assert_eq!(parse_secret("  abc123\n").unwrap(), "abc123");
        assert!(matches!(parse_secret("\n"), Err(StravaError::MissingClientSecret)));
    }

    #[tokio::test]
    async fn test_print_only_does_not_fail() {
        let prompt = SystemBrowser { print_only: true };
        let url = Url::parse("https://www.strava.com/oauth/authorize").unwrap();
        assert!(prompt.present(&url).await.is_ok());
    }
}
