//! Collaborator contracts for extended JWT authentication.
//!
//! The authentication core in `extjwt-authn` depends on two capabilities it
//! does not implement itself:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                extjwt-authn pipeline                     │
//! │   parse → profile → verify signature → resolve identity  │
//! ├───────────────────────────┬──────────────────────────────┤
//! │ auth::ServerKeyProvider   │ user::UserStore              │
//! │ (current public key)      │ (signed-in user by org + id) │
//! ├───────────────────────────┼──────────────────────────────┤
//! │ MemoryServerKeyProvider   │ MemoryUserStore              │
//! └───────────────────────────┴──────────────────────────────┘
//! ```
//!
//! Production deployments supply their own implementations; the in-memory
//! ones back tests and local development.
//!
//! # Error Handling
//!
//! Every operation returns [`StorageResult<T>`]. Implementations map their
//! internal errors to [`StorageError`] variants.

#![deny(unsafe_code)]

pub mod auth;
pub mod error;
pub mod types;
pub mod user;

pub use error::{BoxError, StorageError, StorageResult};
pub use types::{OrgId, UserId};
pub use zeroize::Zeroizing;
