//! Signature verification and standard claim checks.
//!
//! [`TokenVerifier`] turns a profile-checked [`ParsedToken`] into a
//! [`VerifiedToken`]:
//!
//! 1. fetch the server's current public key and convert it to a
//!    [`DecodingKey`]
//! 2. verify the signature with `jsonwebtoken`
//! 3. re-check required claims on the verified payload
//! 4. check issuer, audience and time bounds against the injected [`Clock`]
//!    with zero leeway
//! 5. check the client binding
//!
//! Expiry is owned by step 4, not by `jsonwebtoken`, so the time source is
//! always the injected clock.

use std::{str::FromStr, sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, VerifyingKey};
use extjwt_storage::auth::{ServerKeyProvider, ServerSigningKey};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use crate::{
    claims::{ClaimSet, RegisteredClaims},
    clock::{Clock, SystemClock},
    error::{AuthError, ClaimViolation},
    jwt::{ParsedToken, TokenHeader},
    lookup::bounded,
    validation::{
        AcceptAnyClient, ClientRegistry, VERIFIED_REQUIRED_CLAIMS, validate_client_binding,
        validate_required_claims,
    },
};

/// The only algorithm server keys are issued for.
pub const SERVER_KEY_ALGORITHM: Algorithm = Algorithm::EdDSA;

/// A token whose signature and standard claims have been verified.
#[derive(Clone, Debug)]
pub struct VerifiedToken {
    /// The token's single header.
    pub header: TokenHeader,
    /// Registered claims in typed form.
    pub registered: RegisteredClaims,
    /// Every claim, as verified.
    pub claims: ClaimSet,
}

/// Verifies tokens against the server's current public key.
pub struct TokenVerifier {
    expected_issuer: String,
    expected_audience: String,
    key_provider: Arc<dyn ServerKeyProvider>,
    client_registry: Arc<dyn ClientRegistry>,
    clock: Arc<dyn Clock>,
    lookup_timeout: Duration,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("expected_issuer", &self.expected_issuer)
            .field("expected_audience", &self.expected_audience)
            .field("clock", &self.clock)
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Creates a verifier using the system clock and accepting any client.
    #[must_use]
    pub fn new(
        expected_issuer: impl Into<String>,
        expected_audience: impl Into<String>,
        key_provider: Arc<dyn ServerKeyProvider>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            expected_issuer: expected_issuer.into(),
            expected_audience: expected_audience.into(),
            key_provider,
            client_registry: Arc::new(AcceptAnyClient),
            clock: Arc::new(SystemClock),
            lookup_timeout,
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the client registry.
    #[must_use]
    pub fn with_client_registry(mut self, registry: Arc<dyn ClientRegistry>) -> Self {
        self.client_registry = registry;
        self
    }

    /// Verifies `token`, which must already have passed the profile checks.
    ///
    /// # Errors
    ///
    /// - [`AuthError::KeyUnavailable`] if the key provider fails or times out
    /// - [`AuthError::InvalidPublicKey`] if the server key is unusable
    /// - [`AuthError::MalformedToken`] if the token has no compact form
    /// - [`AuthError::SignatureInvalid`] for any cryptographic failure
    /// - [`AuthError::ClaimValidation`] for missing, mistyped or out-of-range
    ///   claims
    /// - [`AuthError::Cancelled`] if `cancel` fires during the key lookup
    #[tracing::instrument(name = "verify_token", skip_all)]
    pub async fn verify(
        &self,
        token: &ParsedToken,
        cancel: &CancellationToken,
    ) -> Result<VerifiedToken, AuthError> {
        let [header] = token.headers() else {
            return Err(AuthError::malformed_token(format!(
                "only one header supported, got {}",
                token.headers().len()
            )));
        };
        let compact = token.compact().ok_or_else(|| {
            AuthError::malformed_token("token with unprotected header members cannot be verified")
        })?;

        let algorithm = Algorithm::from_str(&header.alg).map_err(|_| {
            AuthError::signature_invalid(format!("unsupported algorithm '{}'", header.alg))
        })?;
        if algorithm != SERVER_KEY_ALGORITHM {
            return Err(AuthError::signature_invalid(format!(
                "algorithm '{}' does not match the server key",
                header.alg
            )));
        }

        let server_key = bounded(self.lookup_timeout, cancel, self.key_provider.server_public_key())
            .await?
            .map_err(|e| {
                tracing::warn!(
                    error = %e,
                    transient = e.is_transient(),
                    "Failed to fetch server public key"
                );
                AuthError::KeyUnavailable(e)
            })?;
        let decoding_key = to_decoding_key(&server_key)?;

        let mut validation = Validation::new(SERVER_KEY_ALGORITHM);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let data = decode::<Map<String, Value>>(compact, &decoding_key, &validation)?;
        let claims = ClaimSet::from_json_object(data.claims);

        validate_required_claims(&claims, VERIFIED_REQUIRED_CLAIMS)?;
        let registered = RegisteredClaims::from_claims(&claims)?;
        self.validate_registered(&registered)?;
        validate_client_binding(&claims, self.client_registry.as_ref()).await?;

        tracing::debug!(kid = %server_key.kid, "Access token verified");

        Ok(VerifiedToken { header: header.clone(), registered, claims })
    }

    fn validate_registered(&self, claims: &RegisteredClaims) -> Result<(), AuthError> {
        if claims.issuer.as_deref() != Some(self.expected_issuer.as_str()) {
            return Err(ClaimViolation::IssuerMismatch {
                actual: claims.issuer.clone().unwrap_or_default(),
            }
            .into());
        }

        if !claims.audience.as_ref().is_some_and(|aud| aud.contains(&self.expected_audience)) {
            return Err(ClaimViolation::AudienceMismatch {
                expected: self.expected_audience.clone(),
            }
            .into());
        }

        let now = self.clock.now();

        let expires_at = claims.expires_at.ok_or_else(|| AuthError::missing_claim("exp"))?;
        if now > expires_at {
            return Err(AuthError::token_expired());
        }

        let issued_at = claims.issued_at.ok_or_else(|| AuthError::missing_claim("iat"))?;
        if now < issued_at {
            return Err(AuthError::token_not_yet_valid());
        }

        if let Some(not_before) = claims.not_before
            && now < not_before
        {
            return Err(AuthError::token_not_yet_valid());
        }

        Ok(())
    }
}

/// Converts the server key into a [`DecodingKey`] after checking it is a
/// valid Ed25519 point.
fn to_decoding_key(key: &ServerSigningKey) -> Result<DecodingKey, AuthError> {
    // Raw key bytes are scrubbed when dropped.
    let public_key_bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
        URL_SAFE_NO_PAD
            .decode(key.public_key.as_bytes())
            .map_err(|e| AuthError::invalid_public_key(format!("base64 decode: {e}")))?,
    );

    let key_bytes: Zeroizing<[u8; PUBLIC_KEY_LENGTH]> =
        Zeroizing::new(public_key_bytes.as_slice().try_into().map_err(|_| {
            AuthError::invalid_public_key(format!(
                "expected {PUBLIC_KEY_LENGTH} bytes, got {}",
                public_key_bytes.len()
            ))
        })?);

    VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| AuthError::invalid_public_key(format!("invalid Ed25519 key: {e}")))?;

    drop(key_bytes);
    drop(public_key_bytes);

    DecodingKey::from_ed_components(&key.public_key)
        .map_err(|e| AuthError::invalid_public_key(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use extjwt_storage::auth::MemoryServerKeyProvider;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{
        clock::FixedClock,
        jwt::parse_token,
        testutil::{
            TEST_AUDIENCE, TEST_ISSUER, access_token_claims, craft_raw_jwt, create_server_key,
            sign_access_token, sign_token,
        },
    };

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        pkcs8_der: Zeroizing<Vec<u8>>,
        provider: MemoryServerKeyProvider,
        clock: FixedClock,
        verifier: TokenVerifier,
    }

    fn fixture() -> Fixture {
        let (pkcs8_der, server_key) = create_server_key("server-key-1");
        let provider = MemoryServerKeyProvider::with_key(server_key);
        let clock = FixedClock::new(Utc.timestamp_opt(NOW, 0).unwrap());
        let verifier = TokenVerifier::new(
            TEST_ISSUER,
            TEST_AUDIENCE,
            Arc::new(provider.clone()),
            Duration::from_secs(5),
        )
        .with_clock(Arc::new(clock.clone()));
        Fixture { pkcs8_der, provider, clock, verifier }
    }

    async fn verify(fx: &Fixture, token: &str) -> Result<VerifiedToken, AuthError> {
        let parsed = parse_token(token).expect("parse");
        fx.verifier.verify(&parsed, &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn test_verify_valid_token() {
        let fx = fixture();
        let token = sign_access_token(&fx.pkcs8_der, &access_token_claims(NOW));

        let verified = verify(&fx, &token).await.expect("valid token");
        assert_eq!(verified.registered.subject.as_deref(), Some("user:id:42"));
        assert_eq!(verified.claims.get_str("client_id"), Some("grafana"));
    }

    #[tokio::test]
    async fn test_verify_wrong_key_rejected() {
        let fx = fixture();
        let (other_der, _) = create_server_key("attacker");
        let token = sign_access_token(&other_der, &access_token_claims(NOW));

        let err = verify(&fx, &token).await.expect_err("foreign signature");
        assert!(matches!(err, AuthError::SignatureInvalid { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_verify_rotated_key_rejects_old_tokens() {
        let fx = fixture();
        let token = sign_access_token(&fx.pkcs8_der, &access_token_claims(NOW));
        let (_, rotated) = create_server_key("server-key-2");
        fx.provider.rotate(rotated);

        assert!(matches!(verify(&fx, &token).await, Err(AuthError::SignatureInvalid { .. })));
    }

    #[rstest]
    #[case("HS256")]
    #[case("RS256")]
    #[case("ES256")]
    #[case("XYZ")]
    #[tokio::test]
    async fn test_verify_algorithm_mismatch_is_signature_error(#[case] alg: &str) {
        let fx = fixture();
        let token = craft_raw_jwt(&json!({"alg": alg, "typ": "at+jwt"}), &access_token_claims(NOW));
        assert!(matches!(verify(&fx, &token).await, Err(AuthError::SignatureInvalid { .. })));
    }

    #[tokio::test]
    async fn test_verify_missing_key_is_key_unavailable() {
        let fx = fixture();
        fx.provider.clear();
        let token = sign_access_token(&fx.pkcs8_der, &access_token_claims(NOW));
        assert!(matches!(verify(&fx, &token).await, Err(AuthError::KeyUnavailable(_))));
    }

    #[tokio::test]
    async fn test_verify_expiry_boundary() {
        let fx = fixture();
        let mut claims = access_token_claims(NOW);

        claims["exp"] = json!(NOW);
        let token = sign_access_token(&fx.pkcs8_der, &claims);
        verify(&fx, &token).await.expect("still valid at exp");

        fx.clock.advance(ChronoDuration::seconds(1));
        let err = verify(&fx, &token).await.expect_err("expired one second after exp");
        assert!(matches!(err, AuthError::ClaimValidation(ClaimViolation::Expired)));
    }

    #[tokio::test]
    async fn test_verify_future_iat_and_nbf_rejected() {
        let fx = fixture();

        let mut claims = access_token_claims(NOW);
        claims["iat"] = json!(NOW + 10);
        let token = sign_access_token(&fx.pkcs8_der, &claims);
        assert!(matches!(
            verify(&fx, &token).await,
            Err(AuthError::ClaimValidation(ClaimViolation::NotYetValid))
        ));

        let mut claims = access_token_claims(NOW);
        claims["nbf"] = json!(NOW + 10);
        let token = sign_access_token(&fx.pkcs8_der, &claims);
        assert!(matches!(
            verify(&fx, &token).await,
            Err(AuthError::ClaimValidation(ClaimViolation::NotYetValid))
        ));
    }

    #[tokio::test]
    async fn test_verify_issuer_and_audience() {
        let fx = fixture();

        let mut claims = access_token_claims(NOW);
        claims["iss"] = json!("https://elsewhere.example");
        let token = sign_access_token(&fx.pkcs8_der, &claims);
        assert!(matches!(
            verify(&fx, &token).await,
            Err(AuthError::ClaimValidation(ClaimViolation::IssuerMismatch { .. }))
        ));

        let mut claims = access_token_claims(NOW);
        claims["aud"] = json!(["other", TEST_AUDIENCE]);
        let token = sign_access_token(&fx.pkcs8_der, &claims);
        verify(&fx, &token).await.expect("audience list containing expected");

        let mut claims = access_token_claims(NOW);
        claims["aud"] = json!("other");
        let token = sign_access_token(&fx.pkcs8_der, &claims);
        assert!(matches!(
            verify(&fx, &token).await,
            Err(AuthError::ClaimValidation(ClaimViolation::AudienceMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_verify_client_id_must_be_string() {
        let fx = fixture();
        let mut claims = access_token_claims(NOW);
        claims["client_id"] = json!(7);
        let token = sign_access_token(&fx.pkcs8_der, &claims);
        assert!(matches!(verify(&fx, &token).await, Err(AuthError::ClaimValidation(_))));
    }

    #[tokio::test]
    async fn test_verify_reports_missing_claim_on_verified_set() {
        let fx = fixture();
        let mut claims = access_token_claims(NOW);
        claims.as_object_mut().unwrap().remove("iat");
        let token = sign_token(&fx.pkcs8_der, "at+jwt", &claims);
        let err = verify(&fx, &token).await.expect_err("iat missing");
        assert!(matches!(
            err,
            AuthError::ClaimValidation(ClaimViolation::Missing { ref claim }) if claim == "iat"
        ));
    }

    #[rstest]
    #[case("not-valid-base64!!!")]
    #[case("AAAA")]
    #[case("")]
    fn test_to_decoding_key_invalid(#[case] bad_key: &str) {
        let key = ServerSigningKey::builder().kid("bad").public_key(bad_key.to_owned()).build();
        let result = to_decoding_key(&key);
        assert!(matches!(result, Err(AuthError::InvalidPublicKey { .. })));
    }

    #[tokio::test]
    async fn test_verify_cancelled_during_key_lookup() {
        let fx = fixture();
        let token = sign_access_token(&fx.pkcs8_der, &access_token_claims(NOW));
        let parsed = parse_token(&token).expect("parse");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fx.verifier.verify(&parsed, &cancel).await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }
}
