//! Identifier newtypes shared between the authentication core and its
//! collaborators.

/// Macro to define a newtype wrapper around `i64` with standard trait
/// implementations.
///
/// Each generated type:
/// - Is a transparent wrapper around `i64` (zero runtime cost)
/// - Derives `Copy`, `Clone`, `Debug`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Derives `Serialize` and `Deserialize` (transparent)
/// - Implements `From<i64>` and `Into<i64>`
/// - Implements `Display` that outputs the inner value
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Organization ID.
    ///
    /// Every request is authenticated in the context of one organization,
    /// and permission maps are keyed by it.
    ///
    /// # Examples
    ///
    /// ```
    /// use extjwt_storage::OrgId;
    ///
    /// let org = OrgId::from(1);
    /// assert_eq!(i64::from(org), 1);
    /// assert_eq!(org.to_string(), "1");
    /// ```
    OrgId
);

define_id!(
    /// Numeric user ID, as carried in a `user:id:<n>` subject claim.
    ///
    /// # Examples
    ///
    /// ```
    /// use extjwt_storage::UserId;
    ///
    /// let user = UserId::from(42);
    /// assert_eq!(i64::from(user), 42);
    /// ```
    UserId
);
