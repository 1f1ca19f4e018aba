//! Signed-in user record and lookup query.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{OrgId, UserId};

/// Permission groups for one organization: group key to permission strings.
pub type PermissionMap = HashMap<String, BTreeSet<String>>;

/// Role of a user within an organization.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrgRole {
    /// No basic role.
    #[serde(rename = "None")]
    NoBasicRole,
    /// Read-only access.
    #[default]
    Viewer,
    /// Read and write access.
    Editor,
    /// Full organization administration.
    Admin,
}

impl std::fmt::Display for OrgRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoBasicRole => "None",
            Self::Viewer => "Viewer",
            Self::Editor => "Editor",
            Self::Admin => "Admin",
        };
        f.write_str(name)
    }
}

/// A user as seen from inside one organization.
///
/// `permissions` is `None` when the user service has not loaded any
/// permissions for the user; consumers that need a container must create one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, bon::Builder)]
pub struct SignedInUser {
    /// Numeric user ID.
    #[builder(into)]
    pub user_id: UserId,
    /// Organization the user is signed in to.
    #[builder(into)]
    pub org_id: OrgId,
    /// Display name of that organization.
    #[builder(into, default)]
    pub org_name: String,
    /// Role within that organization.
    #[builder(default)]
    pub org_role: OrgRole,
    /// Login name.
    #[builder(into)]
    pub login: String,
    /// Display name.
    #[builder(into, default)]
    pub name: String,
    /// E-mail address.
    #[builder(into, default)]
    pub email: String,
    /// Server-wide administrator flag.
    #[builder(default)]
    pub is_server_admin: bool,
    /// Whether the account has been disabled.
    #[builder(default)]
    pub is_disabled: bool,
    /// Whether this record stands for an anonymous visitor.
    #[builder(default)]
    pub is_anonymous: bool,
    /// Permissions keyed by organization.
    pub permissions: Option<HashMap<OrgId, PermissionMap>>,
}

/// Query for [`UserStore::get_signed_in_user`](crate::user::UserStore::get_signed_in_user).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SignedInUserQuery {
    /// Organization context of the request.
    pub org_id: OrgId,
    /// User to load.
    pub user_id: UserId,
}

impl SignedInUserQuery {
    /// Creates a query for `user_id` within `org_id`.
    #[must_use]
    pub fn new(org_id: OrgId, user_id: UserId) -> Self {
        Self { org_id, user_id }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_in_user_builder_defaults() {
        let user =
            SignedInUser::builder().user_id(UserId(42)).org_id(OrgId(1)).login("admin").build();

        assert_eq!(user.user_id, UserId(42));
        assert_eq!(user.org_role, OrgRole::Viewer);
        assert!(user.permissions.is_none());
        assert!(!user.is_anonymous);
    }

    #[test]
    fn test_org_role_serde_names() {
        assert_eq!(serde_json::to_string(&OrgRole::NoBasicRole).expect("serialize"), "\"None\"");
        let role: OrgRole = serde_json::from_str("\"Editor\"").expect("deserialize");
        assert_eq!(role, OrgRole::Editor);
        assert_eq!(role.to_string(), "Editor");
    }
}
