// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Interactive authorization: consent page out, redirect back in.

use std::time::Duration;
use tracing::{info, warn};

use crate::browser::AuthorizationPrompt;
use crate::callback::{AccessResponse, CallbackServer};
use crate::error::{Result, StravaError};
use crate::oauth2_client::{ApprovalPrompt, StravaOAuth};
use crate::scope::AccessScope;

#[derive(Debug, Clone, Default)]
pub struct FlowOptions {
    pub approval_prompt: ApprovalPrompt,
    /// No limit when `None`; Ctrl-C always cancels
    pub timeout: Option<Duration>,
}

/// Outcome of a successful consent round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// One-time code to exchange for tokens
    pub code: String,
    /// May be wider than requested, never narrower
    pub granted: AccessScope,
}

/// Run the consent round-trip for `scope`.
///
/// Fails with [`StravaError::ScopeNotGranted`] if the athlete unticked any
/// requested scope.
pub async fn authorize(
    oauth: &StravaOAuth,
    scope: &AccessScope,
    prompt: &dyn AuthorizationPrompt,
    options: &FlowOptions,
) -> Result<Authorization> {
    let server = CallbackServer::bind().await?;
    let state = uuid::Uuid::new_v4().to_string();
    let url = oauth.authorize_url(&server.redirect_uri(), scope, &state, options.approval_prompt)?;

    info!(scope = %scope, redirect_uri = %server.redirect_uri(), "Requesting Strava access");
    prompt.present(&url).await?;

    let response = await_redirect(server, &state, options.timeout).await?;
    check_granted(scope, response)
}

async fn await_redirect(
    server: CallbackServer,
    state: &str,
    timeout: Option<Duration>,
) -> Result<AccessResponse> {
    let deadline = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        response = server.wait(state) => response,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("Cancelled by user");
            Err(StravaError::Cancelled)
        }
        _ = deadline => Err(StravaError::Timeout),
    }
}

fn check_granted(requested: &AccessScope, response: AccessResponse) -> Result<Authorization> {
    if !response.scope.covers(requested) {
        return Err(StravaError::ScopeNotGranted {
            requested: requested.to_string(),
            granted: response.scope.to_string(),
        });
    }

    info!(granted = %response.scope, "Scope access granted");
    Ok(Authorization {
        code: response.code,
        granted: response.scope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    fn response(scope: &str) -> AccessResponse {
        AccessResponse {
            code: "code-1".to_string(),
            scope: AccessScope::from_granted(scope),
            state: "s".to_string(),
        }
    }

    #[test]
    fn test_check_granted_accepts_superset() {
        let requested = AccessScope::new([Scope::Read, Scope::ActivityWrite]);
        let auth = check_granted(&requested, response("read,activity:write,profile:read_all")).unwrap();

        assert_eq!(auth.code, "code-1");
        assert!(auth.granted.contains(Scope::ProfileReadAll));
    }

    #[test]
    fn test_check_granted_rejects_narrower_scope() {
        let requested = AccessScope::new([Scope::Read, Scope::ActivityWrite]);
        let err = check_granted(&requested, response("read")).unwrap_err();

        match err {
            StravaError::ScopeNotGranted { requested, granted } => {
                assert_eq!(requested, "read,activity:write");
                assert_eq!(granted, "read");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_await_redirect_times_out() {
        let server = CallbackServer::bind().await.unwrap();
        let result = await_redirect(server, "s", Some(Duration::from_millis(50))).await;
        assert!(matches!(result, Err(StravaError::Timeout)));
    }
}
