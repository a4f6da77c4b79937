use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use shared_types::AppError;
use tracing::{debug, info, warn};

use super::extractors::MaybeAuth;
use super::login_state::PendingLogin;
use crate::db::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(rename = "returnUrl")]
    pub return_url: Option<String>,
}

/// Query parameters received from the identity provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Only same-origin paths are honored; anything else lands on `/`.
pub fn sanitize_return_url(raw: Option<&str>) -> String {
    match raw {
        Some(url)
            if url.starts_with('/')
                && !url.starts_with("//")
                && !url.contains('\\')
                && !url.chars().any(char::is_control) =>
        {
            url.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Handler for `GET /login`.
///
/// Signed-in users go straight to `returnUrl`; everyone else is sent to the
/// identity provider.
pub async fn login(
    State(state): State<AppState>,
    MaybeAuth(principal): MaybeAuth,
    Query(query): Query<LoginQuery>,
) -> Result<Response, AppError> {
    let return_url = sanitize_return_url(query.return_url.as_deref());

    if principal.as_ref().is_some_and(|p| p.id.is_some()) {
        return Ok(Redirect::to(&return_url).into_response());
    }

    let oidc = state
        .oidc
        .as_ref()
        .ok_or_else(|| AppError::service_unavailable("Sign-in is not configured"))?;

    let request = oidc.authorize();
    state
        .login_states
        .insert(
            request.csrf_state,
            PendingLogin {
                verifier: request.pkce_verifier,
                return_url,
            },
        )
        .await;

    debug!("Redirecting to identity provider");
    Ok(Redirect::to(&request.url).into_response())
}

/// Handler for `GET /signin-oidc`.
///
/// Exchanges the code, loads the user's roles, issues the session cookie,
/// and redirects to the stored return URL.
pub async fn signin_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    if let Some(error) = params.error {
        warn!(error = %error, description = ?params.error_description, "Identity provider returned an error");
        return Err(AppError::unauthorized("Sign-in was not completed"));
    }

    let (Some(code), Some(csrf)) = (params.code, params.state) else {
        return Err(AppError::bad_request("Missing code or state"));
    };

    let pending = state
        .login_states
        .take(&csrf)
        .await
        .ok_or_else(|| AppError::bad_request("Invalid or expired sign-in state"))?;

    let oidc = state
        .oidc
        .as_ref()
        .ok_or_else(|| AppError::service_unavailable("Sign-in is not configured"))?;

    let info = oidc.complete(code, pending.verifier).await.map_err(|e| {
        warn!(error = %e, "Sign-in callback failed");
        AppError::unauthorized("Sign-in failed")
    })?;

    let roles = state.roles.roles_for_user(&info.sub).await?;
    let principal = info.into_principal(roles);

    let issued = state.sessions.issue(&principal).map_err(|e| {
        tracing::error!(error = %e, "Failed to issue session");
        AppError::internal("Failed to create session")
    })?;

    let mut response = Redirect::to(&pending.return_url).into_response();
    state
        .cookies
        .append_session(response.headers_mut(), &issued.token, issued.expires_at);

    info!(user.id = ?principal.id, roles = ?principal.roles(), redirect = %pending.return_url, "Sign-in successful");
    Ok(response)
}

/// Handler for `GET|POST /logout`.
pub async fn logout(State(state): State<AppState>) -> Response {
    let mut response = Redirect::to("/").into_response();
    state.cookies.append_clear(response.headers_mut());
    response
}
