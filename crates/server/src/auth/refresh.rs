use std::collections::BTreeSet;

use super::principal::Principal;
use super::roles::{RoleLookupError, RoleStore};

/// Result of re-validating a principal's role claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Role claims already match the store (or there was nobody to look up).
    Unchanged(Principal),
    /// Role claims drifted; the session credential must be re-issued.
    Replaced(Principal),
}

impl RefreshOutcome {
    pub fn should_renew(&self) -> bool {
        matches!(self, RefreshOutcome::Replaced(_))
    }

    pub fn principal(&self) -> &Principal {
        match self {
            RefreshOutcome::Unchanged(p) | RefreshOutcome::Replaced(p) => p,
        }
    }

    pub fn into_principal(self) -> Principal {
        match self {
            RefreshOutcome::Unchanged(p) | RefreshOutcome::Replaced(p) => p,
        }
    }
}

/// Compare the principal's role claims against the store and build a
/// replacement principal when they differ.
///
/// A principal without a user id passes through untouched. Comparison is
/// an unordered, case-sensitive set comparison. Lookup failures are
/// returned to the caller; stale roles are never served.
pub async fn refresh_principal(
    store: &dyn RoleStore,
    principal: Principal,
) -> Result<RefreshOutcome, RoleLookupError> {
    let Some(user_id) = principal.id.as_deref() else {
        return Ok(RefreshOutcome::Unchanged(principal));
    };

    let current = store.roles_for_user(user_id).await?;

    let fresh: BTreeSet<&str> = current.iter().map(String::as_str).collect();
    if fresh == principal.role_set() {
        return Ok(RefreshOutcome::Unchanged(principal));
    }

    tracing::info!(
        user.id = user_id,
        old_roles = ?principal.roles(),
        new_roles = ?current,
        "Role claims changed, replacing principal"
    );
    let replaced = principal.with_roles(current);
    Ok(RefreshOutcome::Replaced(replaced))
}
