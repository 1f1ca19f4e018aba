//! # Extended JWT Authentication
//!
//! Verification of RFC 9068 ("JWT Profile for OAuth 2.0 Access Tokens")
//! bearer tokens signed by the server's own key, and resolution of a verified
//! token into an internal identity with entitlement-derived permissions.
//!
//! This crate provides:
//! - **Parsing**: compact and JSON JWS serializations, without trusting them
//! - **Profile validation**: single header, `at+jwt` type, no `none` algorithm
//! - **Verification**: Ed25519 signature, zero-leeway expiry, issuer, audience
//! - **Identity resolution**: `user:id:<n>` subjects, `entitlements` claims
//! - **Dispatch**: priority-ordered authentication clients
//!
//! ## Pipeline
//!
//! ```text
//! AuthnRequest ─▶ test() ─▶ authenticate()
//!                              │
//!                              ├─ jwt::parse_token
//!                              ├─ validation::validate_profile
//!                              ├─ verify::TokenVerifier      ─▶ ServerKeyProvider
//!                              └─ identity::IdentityResolver ─▶ UserStore
//!                              ▼
//!                     ResolvedIdentity | InvalidTokenError
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use extjwt_authn::{AuthnRequest, ExtendedJwtClient, config::ExtendedJwtConfig};
//! use extjwt_storage::{OrgId, auth::MemoryServerKeyProvider, user::MemoryUserStore};
//!
//! # async fn example(request: AuthnRequest) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExtendedJwtConfig::builder()
//!     .enabled(true)
//!     .expect_issuer("http://localhost:3000")
//!     .expect_audience("http://localhost:3000")
//!     .build()?;
//! let client = ExtendedJwtClient::new(
//!     config,
//!     Arc::new(MemoryServerKeyProvider::new()),
//!     Arc::new(MemoryUserStore::new()),
//! );
//!
//! if client.test(&request) {
//!     let identity = client.authenticate(&request).await?;
//!     println!("authenticated {}", identity.id);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Claim values and claim sets.
pub mod claims;
/// The extended JWT authentication client.
pub mod client;
/// Time source for temporal checks.
pub mod clock;
/// Authentication client configuration.
pub mod config;
/// Priority-ordered client dispatch.
pub mod dispatch;
/// Authentication error types.
pub mod error;
/// Subject and entitlement mapping.
pub mod identity;
/// Token parsing.
pub mod jwt;
mod lookup;
/// Structural and client-binding validation.
pub mod validation;
/// Signature verification.
pub mod verify;

/// Test helpers. Requires the `testutil` feature.
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

// Re-export key types for convenience
pub use claims::{ClaimSet, ClaimValue};
pub use client::{AuthnRequest, CLIENT_EXTENDED_JWT, EXTENDED_JWT_PRIORITY, ExtendedJwtClient};
pub use clock::{Clock, FixedClock, SystemClock};
pub use dispatch::{AnonymousClient, AuthnClient, AuthnError, Authenticator};
pub use error::{AuthError, ClaimViolation, ErrorKind, InvalidTokenError, Result};
pub use identity::{ClientParams, Namespace, NamespacedId, ResolvedIdentity};
pub use validation::{AcceptAnyClient, ClientRegistry};
