use std::sync::Arc;

use shared_types::CurrentUser;

use crate::error::ClientError;
use crate::fetch::{ApiClient, Fetched};
use crate::navigator::{LoginRedirect, Location};
use crate::query::QueryClient;
use crate::user;

/// The signed-in user, handed to views under an authenticated route.
#[derive(Debug, Clone, PartialEq)]
pub struct UserContext {
    user: CurrentUser,
}

impl UserContext {
    pub fn new(user: CurrentUser) -> Self {
        Self { user }
    }

    pub fn user(&self) -> &CurrentUser {
        &self.user
    }

    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn display_name(&self) -> &str {
        self.user
            .name
            .as_deref()
            .or(self.user.email.as_deref())
            .unwrap_or(&self.user.id)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.user.has_role(role)
    }

    pub fn into_user(self) -> CurrentUser {
        self.user
    }
}

/// Result of loading an authenticated route.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteLoad {
    Ready(UserContext),
    /// Not signed in; the navigator is already on its way to login.
    Redirected(LoginRedirect),
}

/// Load boundary for pages that need a signed-in user.
///
/// Every page under the boundary shares one `QueryClient`, so mounting
/// several of them at once still loads the profile with a single request.
#[derive(Clone)]
pub struct AuthenticatedRoute {
    api: ApiClient,
    queries: Arc<QueryClient>,
}

impl AuthenticatedRoute {
    pub fn new(api: ApiClient, queries: Arc<QueryClient>) -> Self {
        Self { api, queries }
    }

    pub fn queries(&self) -> &Arc<QueryClient> {
        &self.queries
    }

    /// Make sure the profile is cached before the page renders.
    pub async fn before_load(&self, location: &Location) -> Result<RouteLoad, ClientError> {
        tracing::debug!(href = %location.href(), "Loading authenticated route");
        match user::ensure_me(&self.api, &self.queries).await {
            Ok(Fetched::Data(user)) => Ok(RouteLoad::Ready(UserContext::new(user))),
            Ok(Fetched::Redirected(redirect)) => Ok(RouteLoad::Redirected(redirect)),
            Ok(Fetched::NoContent) => Err(ClientError::EmptyResponse {
                url: user::ME_URL.to_string(),
            }),
            Err(e) => {
                tracing::error!(error = %e, href = %location.href(), "Failed to load authenticated route");
                Err(e)
            }
        }
    }

    /// Run [`AuthenticatedRoute::before_load`] and render once with the
    /// resolved user. `render` is not called when the load redirects.
    pub async fn load_and_render<R>(
        &self,
        location: &Location,
        render: impl FnOnce(&UserContext) -> R,
    ) -> Result<Option<R>, ClientError> {
        match self.before_load(location).await? {
            RouteLoad::Ready(ctx) => Ok(Some(render(&ctx))),
            RouteLoad::Redirected(_) => Ok(None),
        }
    }
}
