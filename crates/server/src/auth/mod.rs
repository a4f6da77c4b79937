pub mod cookies;
pub mod extractors;
pub mod login;
pub mod login_state;
pub mod middleware;
pub mod oidc;
pub mod principal;
pub mod refresh;
pub mod roles;
pub mod session;

pub use extractors::{AuthRequired, MaybeAuth, RequiredRole, RoleRequired, SampleRole};
pub use principal::Principal;
