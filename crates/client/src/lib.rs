//! Headless client for the Weatherdesk API.
//!
//! [`ApiClient`] sends requests with the session cookie and turns a 401 into
//! a login redirect through a [`Navigator`]. [`QueryClient`] caches results
//! per key, and [`AuthenticatedRoute`] loads the signed-in user before a page
//! renders.

pub mod error;
pub mod fetch;
pub mod navigator;
pub mod query;
pub mod session;
pub mod user;
pub mod weather;

pub use error::{ClientError, HttpError};
pub use fetch::{ApiClient, ApiClientBuilder, FetchOptions, Fetched, ResponseBody};
pub use navigator::{Location, LoginRedirect, MemoryHistory, Navigator};
pub use query::{QueryClient, QueryKey, DEFAULT_STALE_TIME};
pub use session::{AuthenticatedRoute, RouteLoad, UserContext};
