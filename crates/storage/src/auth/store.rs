//! Provider trait for the server's current public signing key.
//!
//! Key rotation and distribution are the provider's concern; the
//! authentication core only ever asks for "the current key".
//!
//! # Usage
//!
//! ```no_run
//! use extjwt_storage::StorageResult;
//! use extjwt_storage::auth::{ServerKeyProvider, ServerSigningKey};
//!
//! async fn current_kid(provider: &dyn ServerKeyProvider) -> StorageResult<String> {
//!     Ok(provider.server_public_key().await?.kid)
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    auth::ServerSigningKey,
    error::{StorageError, StorageResult},
};

/// Source of the server's current public signing key.
///
/// Implementations must be safe for concurrent use: the authentication core
/// calls [`server_public_key`](Self::server_public_key) once per request from
/// many tasks at the same time.
#[async_trait]
pub trait ServerKeyProvider: Send + Sync {
    /// Returns the server's current public signing key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no key has been provisioned, or
    /// a connection/timeout error if the backing key service is unreachable.
    async fn server_public_key(&self) -> StorageResult<ServerSigningKey>;
}

/// In-memory [`ServerKeyProvider`] for tests and single-node development.
///
/// Uses [`parking_lot::RwLock`] so concurrent readers never block each other.
///
/// # Examples
///
/// ```
/// use extjwt_storage::auth::{MemoryServerKeyProvider, ServerKeyProvider, ServerSigningKey};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = MemoryServerKeyProvider::new();
///     provider.rotate(
///         ServerSigningKey::builder()
///             .kid("k1".to_owned())
///             .public_key("11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo".to_owned())
///             .build(),
///     );
///
///     assert_eq!(provider.server_public_key().await?.kid, "k1");
///     Ok(())
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryServerKeyProvider {
    current: Arc<RwLock<Option<ServerSigningKey>>>,
}

impl MemoryServerKeyProvider {
    /// Creates a provider with no key provisioned.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider already holding `key`.
    #[must_use]
    pub fn with_key(key: ServerSigningKey) -> Self {
        Self { current: Arc::new(RwLock::new(Some(key))) }
    }

    /// Replaces the current key, returning the previous one.
    pub fn rotate(&self, key: ServerSigningKey) -> Option<ServerSigningKey> {
        let previous = self.current.write().replace(key);
        tracing::info!(
            previous_kid = previous.as_ref().map(|k| k.kid.as_str()),
            "server signing key rotated"
        );
        previous
    }

    /// Removes the current key.
    pub fn clear(&self) {
        self.current.write().take();
    }
}

#[async_trait]
impl ServerKeyProvider for MemoryServerKeyProvider {
    #[tracing::instrument(skip(self))]
    async fn server_public_key(&self) -> StorageResult<ServerSigningKey> {
        self.current.read().clone().ok_or_else(|| StorageError::not_found("server signing key"))
    }
}
