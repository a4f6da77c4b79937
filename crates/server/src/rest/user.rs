use axum::Json;
use shared_types::{AppError, CurrentUser};

use crate::auth::AuthRequired;

// ---------------------------------------------------------------------------
// GET /api/user/me
// ---------------------------------------------------------------------------

/// Profile and claims of the signed-in user.
#[utoipa::path(
    get,
    path = "/api/user/me",
    responses(
        (status = 200, description = "Current user", body = CurrentUser),
        (status = 401, description = "Not signed in", body = AppError),
        (status = 503, description = "Role store unavailable", body = AppError)
    ),
    tag = "user"
)]
pub async fn me(AuthRequired(principal): AuthRequired) -> Result<Json<CurrentUser>, AppError> {
    principal
        .to_current_user()
        .map(Json)
        .ok_or_else(|| AppError::unauthorized("Authentication required"))
}
