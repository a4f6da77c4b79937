use shared_types::CurrentUser;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::fetch::{ApiClient, FetchOptions, Fetched};
use crate::query::{QueryClient, QueryKey};

pub const ME_URL: &str = "/api/user/me";

pub fn me_query_key() -> QueryKey {
    QueryKey::new(["users", "me"])
}

/// Fetch the signed-in user's profile. A 204 is an error: the endpoint
/// always returns a body for a signed-in user.
pub async fn fetch_me(
    api: &ApiClient,
    cancel: Option<&CancellationToken>,
) -> Result<Fetched<CurrentUser>, ClientError> {
    match api.fetch_json(ME_URL, FetchOptions::default(), cancel).await? {
        Fetched::NoContent => Err(ClientError::EmptyResponse {
            url: ME_URL.to_string(),
        }),
        other => Ok(other),
    }
}

/// The profile from the query cache, fetching it when missing or stale.
pub async fn ensure_me(
    api: &ApiClient,
    queries: &QueryClient,
) -> Result<Fetched<CurrentUser>, ClientError> {
    queries
        .ensure_query_data(&me_query_key(), || fetch_me(api, None))
        .await
}
