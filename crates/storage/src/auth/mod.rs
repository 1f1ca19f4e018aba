//! Server signing key types and provider.
//!
//! The authentication core verifies every access token against the server's
//! current public key. This module defines that key and the
//! [`ServerKeyProvider`] trait the core consumes.
//!
//! # Examples
//!
//! ```no_run
//! use extjwt_storage::auth::{MemoryServerKeyProvider, ServerKeyProvider, ServerSigningKey};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let provider = MemoryServerKeyProvider::new();
//! provider.rotate(
//!     ServerSigningKey::builder()
//!         .kid("server-key")
//!         .public_key("11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo".to_owned())
//!         .build(),
//! );
//!
//! let key = provider.server_public_key().await.unwrap();
//! assert_eq!(key.kid, "server-key");
//! # });
//! ```

mod signing_key;
mod store;

pub use signing_key::ServerSigningKey;
pub use store::{MemoryServerKeyProvider, ServerKeyProvider};
