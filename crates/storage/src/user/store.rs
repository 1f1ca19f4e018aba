//! User lookup trait and in-memory implementation.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    error::{StorageError, StorageResult},
    types::{OrgId, UserId},
    user::{OrgRole, PermissionMap, SignedInUser, SignedInUserQuery},
};

/// Loads signed-in users for the authentication core.
///
/// The core treats this as opaque: an implementation may serve cached
/// records or load them fresh. Callers bound every call with a timeout and
/// drop the future on cancellation, so implementations must not hold
/// resources that require explicit release across an `.await`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Loads `query.user_id` as seen from organization `query.org_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the user does not exist or is not
    /// a member of the organization, or a backend error if the lookup fails.
    async fn get_signed_in_user(&self, query: &SignedInUserQuery) -> StorageResult<SignedInUser>;
}

/// A user account held by [`MemoryUserStore`].
#[derive(Clone, Debug, PartialEq, bon::Builder)]
pub struct UserAccount {
    /// Numeric user ID.
    #[builder(into)]
    pub user_id: UserId,
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
}

#[derive(Clone, Debug)]
struct Membership {
    org_name: String,
    role: OrgRole,
    permissions: Option<HashMap<OrgId, PermissionMap>>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, UserAccount>,
    memberships: HashMap<(OrgId, UserId), Membership>,
}

/// In-memory [`UserStore`] for tests and development.
///
/// # Examples
///
/// ```
/// use extjwt_storage::user::{MemoryUserStore, OrgRole, SignedInUserQuery, UserAccount, UserStore};
/// use extjwt_storage::{OrgId, UserId};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryUserStore::new();
///     store.insert_user(UserAccount::builder().user_id(UserId::from(42)).login("alice").build());
///     store.add_membership(OrgId::from(1), UserId::from(42), "Main Org.", OrgRole::Editor);
///
///     let user = store
///         .get_signed_in_user(&SignedInUserQuery::new(OrgId::from(1), UserId::from(42)))
///         .await?;
///     assert_eq!(user.login, "alice");
///     Ok(())
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryUserStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user account.
    pub fn insert_user(&self, account: UserAccount) {
        self.inner.write().users.insert(account.user_id, account);
    }

    /// Makes `user_id` a member of `org_id` with `role`.
    pub fn add_membership(
        &self,
        org_id: OrgId,
        user_id: UserId,
        org_name: impl Into<String>,
        role: OrgRole,
    ) {
        self.inner.write().memberships.insert(
            (org_id, user_id),
            Membership { org_name: org_name.into(), role, permissions: None },
        );
    }

    /// Sets the preloaded permissions returned for `user_id` in `org_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the membership does not exist.
    pub fn set_permissions(
        &self,
        org_id: OrgId,
        user_id: UserId,
        permissions: HashMap<OrgId, PermissionMap>,
    ) -> StorageResult<()> {
        let mut inner = self.inner.write();
        let membership = inner
            .memberships
            .get_mut(&(org_id, user_id))
            .ok_or_else(|| StorageError::not_found(format!("membership {org_id}/{user_id}")))?;
        membership.permissions = Some(permissions);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    #[tracing::instrument(skip(self))]
    async fn get_signed_in_user(&self, query: &SignedInUserQuery) -> StorageResult<SignedInUser> {
        let inner = self.inner.read();
        let account = inner
            .users
            .get(&query.user_id)
            .ok_or_else(|| StorageError::not_found(format!("user {}", query.user_id)))?;
        let membership =
            inner.memberships.get(&(query.org_id, query.user_id)).ok_or_else(|| {
                StorageError::not_found(format!("membership {}/{}", query.org_id, query.user_id))
            })?;

        Ok(SignedInUser {
            user_id: account.user_id,
            org_id: query.org_id,
            org_name: membership.org_name.clone(),
            org_role: membership.role,
            login: account.login.clone(),
            name: account.name.clone(),
            email: account.email.clone(),
            is_server_admin: account.is_server_admin,
            is_disabled: account.is_disabled,
            is_anonymous: false,
            permissions: membership.permissions.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn store_with_alice() -> MemoryUserStore {
        let store = MemoryUserStore::new();
        store.insert_user(
            UserAccount::builder()
                .user_id(UserId(42))
                .login("alice")
                .email("alice@example.com")
                .build(),
        );
        store.add_membership(OrgId(1), UserId(42), "Main Org.", OrgRole::Admin);
        store
    }

    #[tokio::test]
    async fn test_get_signed_in_user_found() {
        let store = store_with_alice();
        let user = store
            .get_signed_in_user(&SignedInUserQuery::new(OrgId(1), UserId(42)))
            .await
            .expect("user should resolve");

        assert_eq!(user.login, "alice");
        assert_eq!(user.org_id, OrgId(1));
        assert_eq!(user.org_role, OrgRole::Admin);
        assert!(user.permissions.is_none());
    }

    #[tokio::test]
    async fn test_unknown_user_not_found() {
        let store = store_with_alice();
        let result = store.get_signed_in_user(&SignedInUserQuery::new(OrgId(1), UserId(7))).await;
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_user_outside_org_not_found() {
        let store = store_with_alice();
        let result = store.get_signed_in_user(&SignedInUserQuery::new(OrgId(2), UserId(42))).await;
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_preloaded_permissions_returned() {
        let store = store_with_alice();
        let mut perms = PermissionMap::new();
        perms.insert("dashboards:read".to_owned(), BTreeSet::from(["dashboards:*".to_owned()]));
        store
            .set_permissions(OrgId(1), UserId(42), HashMap::from([(OrgId(1), perms.clone())]))
            .expect("membership exists");

        let user = store
            .get_signed_in_user(&SignedInUserQuery::new(OrgId(1), UserId(42)))
            .await
            .expect("user should resolve");
        assert_eq!(user.permissions, Some(HashMap::from([(OrgId(1), perms)])));
    }

    #[test]
    fn test_set_permissions_requires_membership() {
        let store = MemoryUserStore::new();
        let result = store.set_permissions(OrgId(1), UserId(1), HashMap::new());
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }
}
