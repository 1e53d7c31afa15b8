//! Parsing of the `dropp://auth` callback the browser login redirects to.

use url::Url;
use zeroize::Zeroize;

use crate::error::{DroppError, Result};

pub const AUTH_SCHEME: &str = "dropp";
pub const AUTH_HOST: &str = "auth";

/// Credentials carried by a login callback.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize)]
pub struct AuthCallback {
    pub session_token: String,
    pub user_id: String,
}

/// Parse `dropp://auth?session_token=<token>&user_id=<id>`.
///
/// Both parameters must be present and non-empty. Values are percent-decoded.
pub fn parse_auth_link(link: &str) -> Result<AuthCallback> {
    let url = Url::parse(link.trim())
        .map_err(|e| DroppError::InvalidDeepLink(format!("{}", e)))?;

    if url.scheme() != AUTH_SCHEME {
        return Err(DroppError::InvalidDeepLink(format!(
            "expected scheme '{}', got '{}'",
            AUTH_SCHEME,
            url.scheme()
        )));
    }
    if url.host_str() != Some(AUTH_HOST) {
        return Err(DroppError::InvalidDeepLink(format!(
            "expected host '{}'",
            AUTH_HOST
        )));
    }

    let mut session_token = None;
    let mut user_id = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "session_token" => session_token = Some(value.into_owned()),
            "user_id" => user_id = Some(value.into_owned()),
            _ => {}
        }
    }

    let session_token = session_token
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DroppError::InvalidDeepLink("missing session_token".into()))?;
    let user_id = user_id
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DroppError::InvalidDeepLink("missing user_id".into()))?;

    Ok(AuthCallback {
        session_token,
        user_id,
    })
}
