//! Admin guard and acting-account extraction.
//!
//! Authentication itself lives in an external service; requests arrive
//! here already authenticated, carrying the acting account in
//! `x-account-id` / `x-account-name` headers.  The bearer-token guard on
//! the admin routes is a second fence for deployments that expose the
//! admin API directly – unset `MODSHELF_ADMIN_TOKEN` disables it.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// The authenticated account a request is acting as, as relayed by the
/// external authenticator.
#[derive(Debug, Clone)]
pub struct AccountRef {
    pub id: String,
    pub username: Option<String>,
}

/// Read the acting account from the request headers.  `None` means the
/// request is anonymous.
pub fn acting_account(headers: &HeaderMap) -> Option<AccountRef> {
    let id = headers
        .get("x-account-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())?;
    let username = headers
        .get("x-account-name")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned);
    Some(AccountRef {
        id: id.to_owned(),
        username,
    })
}

/// Reject admin requests lacking the configured bearer token.
pub async fn check_admin_auth(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(expected_token) = &state.config.admin_token {
        let provided = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match provided {
            Some(token) if token == expected_token => {}
            _ => {
                return (
                    StatusCode::UNAUTHORIZED,
                    axum::Json(serde_json::json!({ "error": "unauthorised" })),
                )
                    .into_response();
            }
        }
    }
    next.run(req).await
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn acting_account_requires_id() {
        let mut headers = HeaderMap::new();
        assert!(acting_account(&headers).is_none());

        headers.insert("x-account-name", "steve".parse().unwrap());
        assert!(acting_account(&headers).is_none());

        headers.insert("x-account-id", "acct-1".parse().unwrap());
        let account = acting_account(&headers).unwrap();
        assert_eq!(account.id, "acct-1");
        assert_eq!(account.username.as_deref(), Some("steve"));
    }

    #[test]
    fn blank_account_id_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert("x-account-id", "  ".parse().unwrap());
        assert!(acting_account(&headers).is_none());
    }
}
