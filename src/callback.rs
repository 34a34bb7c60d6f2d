// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Local listener receiving the OAuth redirect
//!
//! Strava sends the browser back to `http://127.0.0.1:<port>/?state=..&code=..&scope=..`
//! (or `error=access_denied`). The listener binds an ephemeral port, answers
//! that one redirect with a short HTML page and hands the outcome to the
//! waiting caller. Any other request (favicon, speculative connects) gets a
//! 404 and does not end the wait.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::{messages, oauth};
use crate::error::{Result, StravaError};
use crate::scope::AccessScope;

/// Connections that have not sent a complete request head by then are dropped.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// What the consent page sent back on approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessResponse {
    pub code: String,
    /// Scope as approved by the athlete
    pub scope: AccessScope,
    pub state: String,
}

pub struct CallbackServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CallbackServer {
    /// Bind the loopback interface on an ephemeral port.
    pub async fn bind() -> Result<Self> {
        Self::bind_to(SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    pub async fn bind_to(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        info!("Listening for OAuth callback on {}", addr);
        Ok(Self { listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://{}:{}", oauth::CALLBACK_HOST, self.addr.port())
    }

    /// Serve until the redirect arrives and return its outcome.
    ///
    /// Dropping the returned future stops the listener.
    pub async fn wait(self, expected_state: &str) -> Result<AccessResponse> {
        let (tx, mut rx) = mpsc::channel::<Result<AccessResponse>>(1);
        let listener = self.listener;
        let expected_state = expected_state.to_string();

        let _accept = AbortOnDrop(tokio::spawn(async move {
            // Dropped with this task, which aborts any connection still open.
            let mut connections: JoinSet<()> = JoinSet::new();
            loop {
                while connections.try_join_next().is_some() {}

                let (socket, peer) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                };
                debug!(%peer, "Callback connection accepted");

                let tx = tx.clone();
                let expected_state = expected_state.clone();
                connections.spawn(async move {
                    match handle_connection(socket, &expected_state).await {
                        Ok(Some(outcome)) => {
                            let _ = tx.send(outcome).await;
                        }
                        Ok(None) => {}
                        Err(e) => warn!(%peer, "Callback connection failed: {}", e),
                    }
                });
            }
        }));

        rx.recv().await.unwrap_or_else(|| {
            Err(StravaError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "callback listener stopped",
            )))
        })
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn handle_connection(
    socket: TcpStream,
    expected_state: &str,
) -> io::Result<Option<Result<AccessResponse>>> {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);

    let request_line = match tokio::time::timeout(READ_TIMEOUT, read_request_head(&mut reader)).await {
        Ok(Ok(Some(line))) => line,
        Ok(Ok(None)) | Err(_) => return Ok(None),
        Ok(Err(e)) => return Err(e),
    };

    let outcome = request_line
        .split_whitespace()
        .nth(1)
        .and_then(query_params)
        .and_then(|params| parse_redirect(&params, expected_state));

    let (status, body) = match &outcome {
        Some(Ok(_)) => ("200 OK", messages::ACCESS_GRANTED_PAGE),
        Some(Err(_)) => ("200 OK", messages::ACCESS_DENIED_PAGE),
        None => ("404 Not Found", messages::NOT_FOUND_PAGE),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.shutdown().await?;

    match &outcome {
        Some(Ok(_)) => info!("Access granted"),
        Some(Err(e)) => warn!("Access not granted: {}", e),
        None => debug!(request = %request_line.trim_end(), "Ignoring unrelated request"),
    }

    Ok(outcome)
}

/// Read the request line and drain the headers. `None` on EOF before a
/// request line.
async fn read_request_head<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await? == 0 {
        return Ok(None);
    }

    loop {
        let mut header = String::new();
        let n = reader.read_line(&mut header).await?;
        if n == 0 || header.trim_end().is_empty() {
            break;
        }
    }
    Ok(Some(request_line))
}

fn query_params(path: &str) -> Option<HashMap<String, String>> {
    let url = Url::parse(&format!("http://localhost{}", path)).ok()?;
    Some(url.query_pairs().into_owned().collect())
}

/// Classify redirect query parameters. `None` means the request was not the
/// redirect at all.
pub fn parse_redirect(
    params: &HashMap<String, String>,
    expected_state: &str,
) -> Option<Result<AccessResponse>> {
    if let Some(error) = params.get(oauth::PARAM_ERROR) {
        return Some(Err(StravaError::AccessDenied(error.clone())));
    }

    let code = params.get(oauth::PARAM_CODE)?;
    let state = params.get(oauth::PARAM_STATE).map(String::as_str).unwrap_or("");
    if state != expected_state {
        return Some(Err(StravaError::StateMismatch));
    }

    let scope = params
        .get(oauth::PARAM_SCOPE)
        .map(|s| AccessScope::from_granted(s))
        .unwrap_or_default();

    Some(Ok(AccessResponse {
        code: code.clone(),
        scope,
        state: state.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    fn local_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_redirect_with_code() {
        let outcome = parse_redirect(
            &params(&[("state", "abc"), ("code", "xyz"), ("scope", "read,activity:write")]),
            "abc",
        )
        .expect("redirect recognised")
        .expect("access granted");

        assert_eq!(outcome.code, "xyz");
        assert_eq!(outcome.scope, AccessScope::new([Scope::Read, Scope::ActivityWrite]));
    }

    #[test]
    fn test_parse_redirect_denied() {
        let outcome = parse_redirect(&params(&[("state", "abc"), ("error", "access_denied")]), "abc");
        assert!(matches!(outcome, Some(Err(StravaError::AccessDenied(e))) if e == "access_denied"));
    }

    #[test]
    fn test_parse_redirect_state_mismatch() {
        let outcome = parse_redirect(&params(&[("state", "evil"), ("code", "xyz")]), "abc");
        assert!(matches!(outcome, Some(Err(StravaError::StateMismatch))));
    }

    #[test]
    fn test_unrelated_request_is_ignored() {
        assert!(parse_redirect(&params(&[]), "abc").is_none());
        assert!(query_params("/favicon.ico").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wait_receives_redirect() {
        let server = CallbackServer::bind().await.unwrap();
        let redirect_uri = server.redirect_uri();
        assert!(redirect_uri.starts_with("http://127.0.0.1:"));

        let waiter = tokio::spawn(server.wait("state-1"));

        let client = local_client();
        let favicon = client
            .get(format!("{}/favicon.ico", redirect_uri))
            .send()
            .await
            .unwrap();
        assert_eq!(favicon.status(), 404);

        let page = client
            .get(format!("{}/?state=state-1&code=the-code&scope=read,activity:write", redirect_uri))
            .send()
            .await
            .unwrap();
        assert_eq!(page.status(), 200);
        assert!(page.text().await.unwrap().contains("Authorization successful"));

        let response = waiter.await.unwrap().unwrap();
        assert_eq!(response.code, "the-code");
        assert!(response.scope.contains(Scope::ActivityWrite));
    }

    #[tokio::test]
    async fn test_stalled_connection_is_closed_when_wait_returns() {
        use tokio::io::AsyncReadExt;

        let server = CallbackServer::bind().await.unwrap();
        let addr = server.local_addr();
        let redirect_uri = server.redirect_uri();
        let waiter = tokio::spawn(server.wait("state-1"));

        // Request line and one header, never the blank line ending the head.
        let mut stalled = TcpStream::connect(addr).await.unwrap();
        stalled
            .write_all(b"GET /?state=state-1&code=slow HTTP/1.1\r\nHost: 127.0.0.1\r\n")
            .await
            .unwrap();

        local_client()
            .get(format!("{}/?state=state-1&code=fast&scope=read", redirect_uri))
            .send()
            .await
            .unwrap();
        let response = waiter.await.unwrap().unwrap();
        assert_eq!(response.code, "fast");

        let mut buf = [0u8; 64];
        let read = tokio::time::timeout(Duration::from_secs(2), stalled.read(&mut buf))
            .await
            .expect("stalled connection left open");
        assert!(matches!(read, Ok(0) | Err(_)));
    }

    #[tokio::test]
    async fn test_wait_reports_denial() {
        let server = CallbackServer::bind().await.unwrap();
        let redirect_uri = server.redirect_uri();
        let waiter = tokio::spawn(server.wait("state-1"));

        let page = local_client()
            .get(format!("{}/?state=state-1&error=access_denied", redirect_uri))
            .send()
            .await
            .unwrap();
        assert!(page.text().await.unwrap().contains("denied"));

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(StravaError::AccessDenied(_))));
    }
}
