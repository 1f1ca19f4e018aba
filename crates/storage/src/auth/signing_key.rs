//! Server signing key type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// The public half of the server's current token signing key (Ed25519 only).
///
/// Access tokens accepted by the extended JWT client are signed by the server
/// key; only the public key material is exposed here. The private key stays
/// with whichever component issues tokens.
///
/// # Example
///
/// ```
/// use extjwt_storage::auth::ServerSigningKey;
///
/// let key = ServerSigningKey::builder()
///     .kid("server-2024-01".to_owned())
///     .public_key("11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo".to_owned())
///     .build();
///
/// assert_eq!(key.kid, "server-2024-01");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct ServerSigningKey {
    /// Key ID. Informational: tokens are verified against the current key
    /// regardless of any `kid` they carry.
    #[builder(into)]
    pub kid: String,

    /// Ed25519 public key (base64url-encoded, no padding, 43 characters).
    ///
    /// Wrapped in [`Zeroizing`] so the key material is scrubbed on drop.
    #[builder(into)]
    pub public_key: Zeroizing<String>,

    /// When the key became the server's current key.
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}
