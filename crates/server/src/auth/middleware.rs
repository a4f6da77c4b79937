use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use shared_types::AppError;

use super::cookies::{self, SESSION_COOKIE};
use super::principal::Principal;
use super::refresh::refresh_principal;
use crate::db::AppState;

/// Session middleware.
///
/// For every request carrying a session cookie:
/// 1. Validates the signed token. An invalid or expired token makes the
///    request anonymous and the cookie is cleared on the way out.
/// 2. Re-reads the user's roles and swaps in a replacement principal when
///    the role claims drifted.
/// 3. Inserts the final [`Principal`] into request extensions before the
///    handler runs.
/// 4. Re-issues the cookie when the principal was replaced or the session
///    is past half its lifetime.
///
/// Does NOT reject anonymous requests; extractors decide authorization.
/// A failed role lookup fails the request with 503.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut renewal: Option<Principal> = None;
    let mut clear_cookie = false;

    if let Some(token) = cookies::extract_session_token(req.headers()) {
        match state.sessions.validate(&token) {
            Ok(session) => {
                let sliding = session.needs_sliding_renewal(Utc::now());
                match refresh_principal(state.roles.as_ref(), session.principal).await {
                    Ok(outcome) => {
                        if outcome.should_renew() || sliding {
                            renewal = Some(outcome.principal().clone());
                        }
                        req.extensions_mut().insert(outcome.into_principal());
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Role lookup failed during session validation");
                        return AppError::service_unavailable(
                            "Unable to verify your roles right now. Please try again shortly.",
                        )
                        .into_response();
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Discarding invalid session cookie");
                clear_cookie = true;
            }
        }
    }

    let mut response = next.run(req).await;

    // Handlers that wrote their own session cookie (login, logout) win.
    if handler_set_session_cookie(&response) {
        return response;
    }

    if let Some(principal) = renewal {
        match state.sessions.issue(&principal) {
            Ok(issued) => {
                state
                    .cookies
                    .append_session(response.headers_mut(), &issued.token, issued.expires_at);
            }
            Err(e) => tracing::error!(error = %e, "Failed to re-issue session cookie"),
        }
    } else if clear_cookie {
        state.cookies.append_clear(response.headers_mut());
    }

    response
}

fn handler_set_session_cookie(response: &Response) -> bool {
    let prefix = format!("{SESSION_COOKIE}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}
