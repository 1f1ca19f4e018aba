//! Mapping verified claims onto an internal identity.
//!
//! The subject names the user to load; the optional `entitlements` claim
//! becomes a permission map installed under [`ENTITLEMENTS_ORG_SLOT`].

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use extjwt_storage::{
    OrgId, UserId,
    user::{PermissionMap, SignedInUser, SignedInUserQuery, UserStore},
};
use fail::fail_point;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    claims::{ClaimSet, ClaimValue},
    error::AuthError,
    lookup::bounded,
};

/// Prefix of a user subject: `user:id:<n>`.
pub const USER_SUBJECT_PREFIX: &str = "user:id:";

/// Organization slot that entitlement-derived permissions are written to.
pub const ENTITLEMENTS_ORG_SLOT: OrgId = OrgId(1);

/// Kind of entity an identity stands for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// A user account.
    User,
    /// An anonymous visitor.
    Anonymous,
}

impl Namespace {
    /// Namespace prefix as written in a [`NamespacedId`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Anonymous => "anonymous",
        }
    }
}

/// An entity kind plus numeric id, written `user:42`.
///
/// # Examples
///
/// ```
/// use extjwt_authn::identity::{Namespace, NamespacedId};
///
/// let id: NamespacedId = "user:42".parse().unwrap();
/// assert_eq!(id.namespace, Namespace::User);
/// assert_eq!(id.to_string(), "user:42");
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NamespacedId {
    /// Entity kind.
    pub namespace: Namespace,
    /// Numeric id within the namespace.
    pub id: i64,
}

impl NamespacedId {
    /// A user id.
    #[must_use]
    pub fn user(user_id: UserId) -> Self {
        Self { namespace: Namespace::User, id: user_id.0 }
    }

    /// The anonymous id, `anonymous:0`.
    #[must_use]
    pub fn anonymous() -> Self {
        Self { namespace: Namespace::Anonymous, id: 0 }
    }
}

impl fmt::Display for NamespacedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace.as_str(), self.id)
    }
}

/// Error parsing a [`NamespacedId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid namespaced id '{0}'")]
pub struct ParseNamespacedIdError(String);

impl FromStr for NamespacedId {
    type Err = ParseNamespacedIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseNamespacedIdError(s.to_owned());
        let (namespace, id) = s.split_once(':').ok_or_else(invalid)?;
        let namespace = match namespace {
            "user" => Namespace::User,
            "anonymous" => Namespace::Anonymous,
            _ => return Err(invalid()),
        };
        let id = id.parse().map_err(|_| invalid())?;
        Ok(Self { namespace, id })
    }
}

/// Per-client flags attached to an identity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientParams {
    /// Whether downstream should re-sync permissions from the user's roles.
    pub sync_permissions: bool,
}

/// The outcome of a successful authentication.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedIdentity {
    /// Namespaced identifier, e.g. `user:42`.
    pub id: NamespacedId,
    /// Organization the request was authenticated in.
    pub org_id: OrgId,
    /// The internal user record. Its `permissions` are moved into
    /// [`permissions`](Self::permissions).
    pub user: SignedInUser,
    /// Permissions keyed by organization, including entitlement-derived ones.
    pub permissions: HashMap<OrgId, PermissionMap>,
    /// Client flags.
    pub client_params: ClientParams,
}

/// Parses a `user:id:<n>` subject.
///
/// # Errors
///
/// Returns [`AuthError::SubjectFormat`] if `sub` is absent, not a string,
/// lacks the prefix, or carries a non-positive or non-numeric id.
pub fn parse_subject(claims: &ClaimSet) -> Result<UserId, AuthError> {
    let subject = match claims.get("sub") {
        Some(ClaimValue::String(subject)) => subject,
        Some(other) => {
            return Err(AuthError::subject_format(format!(
                "expected string subject, got {}",
                other.kind_name()
            )));
        },
        None => return Err(AuthError::subject_format("missing subject")),
    };

    let id = subject.strip_prefix(USER_SUBJECT_PREFIX).ok_or_else(|| {
        AuthError::subject_format(format!("subject must start with '{USER_SUBJECT_PREFIX}'"))
    })?;
    let id: i64 = id
        .parse()
        .map_err(|e| AuthError::subject_format(format!("invalid user id '{id}': {e}")))?;
    if id <= 0 {
        return Err(AuthError::subject_format(format!("user id must be positive, got {id}")));
    }
    Ok(UserId(id))
}

/// Converts an `entitlements` claim into a permission map.
///
/// Each entry must be a list of strings (kept as a set) or `null` (an empty
/// set).
///
/// # Errors
///
/// Returns [`AuthError::EntitlementFormat`] if the claim is not an object or
/// any entry has another shape.
pub fn parse_entitlements(value: &ClaimValue) -> Result<PermissionMap, AuthError> {
    let ClaimValue::Map(entries) = value else {
        return Err(AuthError::entitlement_format(format!(
            "expected object, got {}",
            value.kind_name()
        )));
    };

    entries
        .iter()
        .map(|(group, permissions)| {
            let permissions = match permissions {
                ClaimValue::Null => BTreeSet::new(),
                ClaimValue::StringList(list) => list.iter().cloned().collect(),
                other => {
                    return Err(AuthError::entitlement_format(format!(
                        "entitlement '{group}' must be a list of strings or null, got {}",
                        other.kind_name()
                    )));
                },
            };
            Ok((group.clone(), permissions))
        })
        .collect()
}

/// Loads the user named by a verified token and derives its permissions.
pub struct IdentityResolver {
    users: Arc<dyn UserStore>,
    lookup_timeout: Duration,
}

impl fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

impl IdentityResolver {
    /// Creates a resolver over `users`.
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, lookup_timeout: Duration) -> Self {
        Self { users, lookup_timeout }
    }

    /// Resolves verified `claims` into an identity within `org_id`.
    ///
    /// Entitlements are parsed before the user lookup, so a malformed claim
    /// never costs a round-trip.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SubjectFormat`] for an unusable `sub`
    /// - [`AuthError::EntitlementFormat`] for a malformed `entitlements` claim
    /// - [`AuthError::UserResolution`] if the lookup fails or times out
    /// - [`AuthError::Cancelled`] if `cancel` fires during the lookup
    #[tracing::instrument(name = "resolve_identity", skip(self, claims, cancel))]
    pub async fn resolve(
        &self,
        claims: &ClaimSet,
        org_id: OrgId,
        cancel: &CancellationToken,
    ) -> Result<ResolvedIdentity, AuthError> {
        let user_id = parse_subject(claims)?;

        let entitlements = match claims.get("entitlements") {
            None | Some(ClaimValue::Null) => {
                tracing::debug!(user_id = %user_id, "No entitlements claim in token");
                None
            },
            Some(value) => Some(parse_entitlements(value)?),
        };

        fail_point!("before-user-lookup", |_| {
            Err(AuthError::UserResolution(extjwt_storage::StorageError::internal(
                "injected failure before user lookup",
            )))
        });

        let query = SignedInUserQuery::new(org_id, user_id);
        let mut user = bounded(self.lookup_timeout, cancel, self.users.get_signed_in_user(&query))
            .await?
            .map_err(|e| {
                tracing::warn!(
                    user_id = %user_id,
                    org_id = %org_id,
                    error = %e,
                    transient = e.is_transient(),
                    "Failed to get user"
                );
                AuthError::UserResolution(e)
            })?;

        let mut permissions = user.permissions.take().unwrap_or_default();
        if let Some(entitlements) = entitlements {
            permissions.insert(ENTITLEMENTS_ORG_SLOT, entitlements);
        }

        Ok(ResolvedIdentity {
            id: NamespacedId::user(user.user_id),
            org_id,
            user,
            permissions,
            client_params: ClientParams { sync_permissions: false },
        })
    }
}
