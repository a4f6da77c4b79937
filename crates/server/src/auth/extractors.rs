use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use shared_types::AppError;

use super::principal::Principal;

/// Extractor that requires an authenticated principal with a user id.
/// Returns 401 otherwise.
pub struct AuthRequired(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for AuthRequired {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .filter(|p| p.id.is_some())
            .cloned()
            .map(AuthRequired)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

/// Extractor that optionally extracts the principal. Never fails.
pub struct MaybeAuth(pub Option<Principal>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuth(parts.extensions.get::<Principal>().cloned()))
    }
}

/// A role name usable as an authorization policy.
pub trait RequiredRole {
    const NAME: &'static str;
}

/// Policy for the sample forecast endpoint.
pub struct SampleRole;

impl RequiredRole for SampleRole {
    const NAME: &'static str = "SampleRole";
}

/// Extractor that requires authentication AND the role named by `R`.
/// Returns 401 if unauthenticated, 403 if the role is missing.
pub struct RoleRequired<R: RequiredRole> {
    pub principal: Principal,
    role: PhantomData<R>,
}

impl<R: RequiredRole> RoleRequired<R> {
    pub fn into_inner(self) -> Principal {
        self.principal
    }
}

impl<R, S> FromRequestParts<S> for RoleRequired<R>
where
    R: RequiredRole,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthRequired(principal) = AuthRequired::from_request_parts(parts, state).await?;

        if !principal.has_role(R::NAME) {
            return Err(AppError::forbidden(format!("{} role required", R::NAME)));
        }

        Ok(RoleRequired {
            principal,
            role: PhantomData,
        })
    }
}
