//! Selecting an authentication client for a request.
//!
//! Clients are a closed set. [`Authenticator`] orders them by priority once,
//! then for each request asks each client in turn whether it applies and
//! hands the request to the first that does. A client that applies but
//! fails ends the attempt; later clients are not consulted.

use std::collections::HashMap;

use extjwt_storage::user::SignedInUser;
use thiserror::Error;

use crate::{
    client::{AuthnRequest, ExtendedJwtClient},
    config::AnonymousConfig,
    error::InvalidTokenError,
    identity::{ClientParams, NamespacedId, ResolvedIdentity},
};

/// Name of the anonymous client.
pub const CLIENT_ANONYMOUS: &str = "auth.client.anonymous";

/// Priority of the anonymous client. Consulted after token-based clients.
pub const ANONYMOUS_PRIORITY: u32 = 100;

/// Errors from [`Authenticator::authenticate`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthnError {
    /// The selected client rejected the request's credentials.
    #[error(transparent)]
    InvalidToken(#[from] InvalidTokenError),

    /// No configured client applies to the request.
    #[error("no authentication client applies to the request")]
    NoClientApplies,
}

/// Grants an anonymous identity to requests no other client claimed.
#[derive(Debug, Clone)]
pub struct AnonymousClient {
    config: AnonymousConfig,
}

impl AnonymousClient {
    /// Creates the client.
    #[must_use]
    pub fn new(config: AnonymousConfig) -> Self {
        Self { config }
    }

    /// Client name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        CLIENT_ANONYMOUS
    }

    /// Client priority.
    #[must_use]
    pub fn priority(&self) -> u32 {
        ANONYMOUS_PRIORITY
    }

    /// True when anonymous access is enabled.
    #[must_use]
    pub fn test(&self, _request: &AuthnRequest) -> bool {
        self.config.enabled
    }

    /// Returns the anonymous identity for the configured organization.
    #[must_use]
    pub fn authenticate(&self, _request: &AuthnRequest) -> ResolvedIdentity {
        let id = NamespacedId::anonymous();
        let user = SignedInUser::builder()
            .user_id(id.id)
            .org_id(self.config.org_id)
            .org_role(self.config.org_role)
            .login("")
            .is_anonymous(true)
            .build();

        ResolvedIdentity {
            id,
            org_id: self.config.org_id,
            user,
            permissions: HashMap::new(),
            client_params: ClientParams { sync_permissions: false },
        }
    }
}

/// The authentication clients a server can be configured with.
#[derive(Debug)]
pub enum AuthnClient {
    /// Server-signed RFC 9068 access tokens.
    ExtendedJwt(ExtendedJwtClient),
    /// Anonymous fallback.
    Anonymous(AnonymousClient),
}

impl AuthnClient {
    /// Client name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExtendedJwt(client) => client.name(),
            Self::Anonymous(client) => client.name(),
        }
    }

    /// Client priority; lower runs first.
    #[must_use]
    pub fn priority(&self) -> u32 {
        match self {
            Self::ExtendedJwt(client) => client.priority(),
            Self::Anonymous(client) => client.priority(),
        }
    }

    /// Whether the client applies to `request`.
    #[must_use]
    pub fn test(&self, request: &AuthnRequest) -> bool {
        match self {
            Self::ExtendedJwt(client) => client.test(request),
            Self::Anonymous(client) => client.test(request),
        }
    }

    /// Authenticates `request` with this client.
    ///
    /// # Errors
    ///
    /// Returns [`AuthnError::InvalidToken`] if the client rejects the request.
    pub async fn authenticate(
        &self,
        request: &AuthnRequest,
    ) -> Result<ResolvedIdentity, AuthnError> {
        match self {
            Self::ExtendedJwt(client) => Ok(client.authenticate(request).await?),
            Self::Anonymous(client) => Ok(client.authenticate(request)),
        }
    }
}

impl From<ExtendedJwtClient> for AuthnClient {
    fn from(client: ExtendedJwtClient) -> Self {
        Self::ExtendedJwt(client)
    }
}

impl From<AnonymousClient> for AuthnClient {
    fn from(client: AnonymousClient) -> Self {
        Self::Anonymous(client)
    }
}

/// Routes requests to the first applicable client, by priority.
#[derive(Debug)]
pub struct Authenticator {
    clients: Vec<AuthnClient>,
}

impl Authenticator {
    /// Creates an authenticator. Equal priorities keep their given order.
    #[must_use]
    pub fn new(clients: impl IntoIterator<Item = AuthnClient>) -> Self {
        let mut clients: Vec<_> = clients.into_iter().collect();
        clients.sort_by_key(AuthnClient::priority);
        Self { clients }
    }

    /// Client names in consultation order.
    pub fn client_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.clients.iter().map(AuthnClient::name)
    }

    /// Authenticates `request` with the first client whose `test` passes.
    ///
    /// # Errors
    ///
    /// - [`AuthnError::InvalidToken`] if that client rejects the request
    /// - [`AuthnError::NoClientApplies`] if no client applies
    pub async fn authenticate(
        &self,
        request: &AuthnRequest,
    ) -> Result<ResolvedIdentity, AuthnError> {
        let Some(client) = self.clients.iter().find(|client| client.test(request)) else {
            tracing::debug!("No authentication client applies");
            return Err(AuthnError::NoClientApplies);
        };
        tracing::debug!(client = client.name(), "Selected authentication client");
        client.authenticate(request).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::Arc;

    use extjwt_storage::{
        OrgId,
        auth::MemoryServerKeyProvider,
        user::{MemoryUserStore, OrgRole},
    };
    use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};

    use super::*;
    use crate::{
        config::ExtendedJwtConfig,
        testutil::{TEST_AUDIENCE, TEST_ISSUER, craft_raw_jwt},
    };

    fn jwt_client() -> ExtendedJwtClient {
        let config = ExtendedJwtConfig::builder()
            .enabled(true)
            .expect_issuer(TEST_ISSUER)
            .expect_audience(TEST_AUDIENCE)
            .build()
            .expect("valid config");
        ExtendedJwtClient::new(
            config,
            Arc::new(MemoryServerKeyProvider::new()),
            Arc::new(MemoryUserStore::new()),
        )
    }

    fn anonymous(enabled: bool) -> AnonymousClient {
        AnonymousClient::new(
            AnonymousConfig::builder().enabled(enabled).org_role(OrgRole::Viewer).build(),
        )
    }

    fn request_with_token(token: &str) -> AuthnRequest {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
        AuthnRequest::builder().headers(headers).org_id(OrgId(1)).build()
    }

    #[test]
    fn test_clients_sorted_by_priority() {
        let authenticator = Authenticator::new([anonymous(true).into(), jwt_client().into()]);
        let names: Vec<_> = authenticator.client_names().collect();
        assert_eq!(names, vec![crate::client::CLIENT_EXTENDED_JWT, CLIENT_ANONYMOUS]);
    }

    #[tokio::test]
    async fn test_anonymous_fallback_without_token() {
        let authenticator = Authenticator::new([jwt_client().into(), anonymous(true).into()]);
        let request = AuthnRequest::builder().org_id(OrgId(1)).build();

        let identity = authenticator.authenticate(&request).await.expect("anonymous");
        assert_eq!(identity.id.to_string(), "anonymous:0");
        assert!(identity.user.is_anonymous);
        assert!(!identity.client_params.sync_permissions);
    }

    #[tokio::test]
    async fn test_invalid_token_not_downgraded_to_anonymous() {
        let authenticator = Authenticator::new([jwt_client().into(), anonymous(true).into()]);
        let token = craft_raw_jwt(
            &serde_json::json!({"alg": "none", "typ": "at+jwt"}),
            &serde_json::json!({"iss": TEST_ISSUER}),
        );

        let result = authenticator.authenticate(&request_with_token(&token)).await;
        assert!(matches!(result, Err(AuthnError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_no_client_applies() {
        let authenticator = Authenticator::new([jwt_client().into(), anonymous(false).into()]);
        let request = AuthnRequest::builder().org_id(OrgId(1)).build();

        let result = authenticator.authenticate(&request).await;
        assert!(matches!(result, Err(AuthnError::NoClientApplies)));
    }
}
