//! The extended JWT authentication client.
//!
//! [`ExtendedJwtClient`] accepts RFC 9068 access tokens signed by the
//! server's own key and turns them into a [`ResolvedIdentity`].
//!
//! ```text
//! test()          → enabled? bearer token? unverified iss matches?
//! authenticate()  → parse → profile → verify → resolve identity
//! ```

use std::sync::Arc;

use extjwt_storage::{OrgId, auth::ServerKeyProvider, user::UserStore};
use http::{HeaderMap, header::AUTHORIZATION};
use tokio_util::sync::CancellationToken;

use crate::{
    clock::Clock,
    config::ExtendedJwtConfig,
    error::{AuthError, InvalidTokenError},
    identity::{IdentityResolver, ResolvedIdentity},
    jwt::{decode_unverified_claims, parse_token},
    validation::{ClientRegistry, REQUIRED_CLAIMS, validate_profile, validate_required_claims},
    verify::TokenVerifier,
};

/// Name of the extended JWT client.
pub const CLIENT_EXTENDED_JWT: &str = "auth.client.extended-jwt";

/// Priority of the extended JWT client. Lower values are consulted first.
pub const EXTENDED_JWT_PRIORITY: u32 = 15;

const BEARER_PREFIX: &str = "Bearer ";

/// An inbound request as seen by authentication clients.
#[derive(Debug, Clone, bon::Builder)]
pub struct AuthnRequest {
    /// Request headers.
    #[builder(default)]
    headers: HeaderMap,
    /// Organization the request targets.
    #[builder(into)]
    org_id: OrgId,
    /// Fires when the caller abandons the request.
    #[builder(default)]
    cancel: CancellationToken,
}

impl AuthnRequest {
    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Organization the request targets.
    #[must_use]
    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    /// Cancellation signal for the request.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Returns the token from the `Authorization` header.
///
/// A leading `"Bearer "` is stripped if present. Missing, non-ASCII or empty
/// values yield `None`.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX).unwrap_or(value);
    (!token.is_empty()).then_some(token)
}

/// Authenticates requests carrying server-signed RFC 9068 access tokens.
///
/// Stateless per request; share one instance across tasks.
#[derive(Debug)]
pub struct ExtendedJwtClient {
    config: ExtendedJwtConfig,
    verifier: TokenVerifier,
    resolver: IdentityResolver,
}

impl ExtendedJwtClient {
    /// Creates a client from `config` and its collaborators.
    ///
    /// Uses the system clock and accepts any `client_id`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use extjwt_authn::{ExtendedJwtClient, config::ExtendedJwtConfig};
    /// use extjwt_storage::{auth::MemoryServerKeyProvider, user::MemoryUserStore};
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ExtendedJwtConfig::builder()
    ///     .enabled(true)
    ///     .expect_issuer("http://localhost:3000")
    ///     .expect_audience("http://localhost:3000")
    ///     .build()?;
    /// let client = ExtendedJwtClient::new(
    ///     config,
    ///     Arc::new(MemoryServerKeyProvider::new()),
    ///     Arc::new(MemoryUserStore::new()),
    /// );
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn new(
        config: ExtendedJwtConfig,
        key_provider: Arc<dyn ServerKeyProvider>,
        user_store: Arc<dyn UserStore>,
    ) -> Self {
        let verifier = TokenVerifier::new(
            config.expect_issuer.clone(),
            config.expect_audience.clone(),
            key_provider,
            config.lookup_timeout,
        );
        let resolver = IdentityResolver::new(user_store, config.lookup_timeout);
        Self { config, verifier, resolver }
    }

    /// Replaces the time source used for expiry checks.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.verifier = self.verifier.with_clock(clock);
        self
    }

    /// Replaces the `client_id` registry.
    #[must_use]
    pub fn with_client_registry(mut self, registry: Arc<dyn ClientRegistry>) -> Self {
        self.verifier = self.verifier.with_client_registry(registry);
        self
    }

    /// Client name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        CLIENT_EXTENDED_JWT
    }

    /// Client priority.
    #[must_use]
    pub fn priority(&self) -> u32 {
        EXTENDED_JWT_PRIORITY
    }

    /// Cheap applicability check. Never verifies a signature.
    ///
    /// True only when the client is enabled, a token is present and parses,
    /// and its unverified `iss` equals the expected issuer.
    #[must_use]
    pub fn test(&self, request: &AuthnRequest) -> bool {
        if !self.config.enabled {
            return false;
        }
        let Some(token) = bearer_token(request.headers()) else {
            return false;
        };
        let Ok(claims) = decode_unverified_claims(token) else {
            return false;
        };
        claims.issuer() == Some(self.config.expect_issuer.as_str())
    }

    /// Verifies the request's token and resolves the identity it names.
    ///
    /// # Errors
    ///
    /// Every failure is logged with its specific cause and returned as an
    /// [`InvalidTokenError`].
    #[tracing::instrument(
        name = "authenticate",
        skip(self, request),
        fields(org_id = %request.org_id())
    )]
    pub async fn authenticate(
        &self,
        request: &AuthnRequest,
    ) -> Result<ResolvedIdentity, InvalidTokenError> {
        match self.try_authenticate(request).await {
            Ok(identity) => {
                tracing::debug!(identity = %identity.id, "Authenticated access token");
                Ok(identity)
            },
            Err(err) => {
                tracing::warn!(error = %err, kind = ?err.kind(), "Failed to verify JWT");
                Err(InvalidTokenError::new(err))
            },
        }
    }

    async fn try_authenticate(
        &self,
        request: &AuthnRequest,
    ) -> Result<ResolvedIdentity, AuthError> {
        let raw = bearer_token(request.headers())
            .ok_or_else(|| AuthError::malformed_token("missing bearer token"))?;

        let token = parse_token(raw)?;
        validate_profile(&token)?;
        validate_required_claims(token.claims(), REQUIRED_CLAIMS)?;

        let verified = self.verifier.verify(&token, request.cancellation()).await?;
        self.resolver.resolve(&verified.claims, request.org_id(), request.cancellation()).await
    }
}
