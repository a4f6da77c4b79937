use shared_types::{ClaimInfo, CurrentUser};
use std::collections::BTreeSet;

/// Claim type names exposed through `/api/user/me`.
pub const CLAIM_NAME_IDENTIFIER: &str = "nameidentifier";
pub const CLAIM_NAME: &str = "name";
pub const CLAIM_PREFERRED_USERNAME: &str = "preferred_username";
pub const CLAIM_ROLE: &str = "role";

/// The authenticated identity attached to a request.
///
/// A principal is a value: claims refresh never edits one in place, it
/// builds a replacement with [`Principal::with_roles`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Principal {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    roles: Vec<String>,
}

impl Principal {
    pub fn new(
        id: Option<String>,
        name: Option<String>,
        email: Option<String>,
        roles: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            id: id.filter(|id| !id.is_empty()),
            name,
            email,
            roles: dedup_preserving_order(roles),
        }
    }

    /// Role claims in issue order, without duplicates.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Role claims as an unordered, case-sensitive set.
    pub fn role_set(&self) -> BTreeSet<&str> {
        self.roles.iter().map(String::as_str).collect()
    }

    /// A copy of this principal whose role claims are exactly `roles`.
    pub fn with_roles(&self, roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            roles: dedup_preserving_order(roles),
        }
    }

    /// Name used in log scopes.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("authenticated")
    }

    /// Flattened claim list, in the order the identity provider issues them.
    pub fn claims(&self) -> Vec<ClaimInfo> {
        let mut claims = Vec::with_capacity(3 + self.roles.len());
        let mut push = |claim_type: &str, value: &str| {
            claims.push(ClaimInfo {
                claim_type: claim_type.to_string(),
                value: value.to_string(),
            })
        };
        if let Some(id) = &self.id {
            push(CLAIM_NAME_IDENTIFIER, id);
        }
        if let Some(name) = &self.name {
            push(CLAIM_NAME, name);
        }
        if let Some(email) = &self.email {
            push(CLAIM_PREFERRED_USERNAME, email);
        }
        for role in &self.roles {
            push(CLAIM_ROLE, role);
        }
        claims
    }

    /// Profile for `/api/user/me`. `None` when the principal carries no id.
    pub fn to_current_user(&self) -> Option<CurrentUser> {
        let id = self.id.clone()?;
        Some(CurrentUser {
            id,
            name: self.name.clone(),
            email: self.email.clone(),
            roles: self.roles.clone(),
            claims: self.claims(),
        })
    }
}

fn dedup_preserving_order(roles: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    roles
        .into_iter()
        .filter(|role| seen.insert(role.clone()))
        .collect()
}
