//! Structural and client-binding validation.
//!
//! The profile checks here run on the unverified token, before any
//! cryptographic work:
//! - exactly one header
//! - `typ` is an RFC 9068 access-token media type
//! - `alg` is not `none`
//! - the required claims are present
//!
//! The client-binding check runs after signature verification, on the
//! verified claim set.

use async_trait::async_trait;

use crate::{
    claims::{ClaimSet, ClaimValue},
    error::AuthError,
    jwt::{ACCESS_TOKEN_MEDIA_TYPE, ACCESS_TOKEN_TYPE, ParsedToken, TokenHeader},
};

/// Algorithms that are never accepted, compared case-insensitively.
///
/// Every other algorithm is left to the signature verifier, which only
/// accepts the algorithm matching the server key.
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none"];

/// Claims every access token must carry.
pub const REQUIRED_CLAIMS: &[&str] = &["exp", "jti", "sub", "iat", "client_id"];

/// Claims re-checked on the verified claim set. `client_id` is covered by
/// [`validate_client_binding`].
pub const VERIFIED_REQUIRED_CLAIMS: &[&str] = &["exp", "jti", "sub", "iat"];

/// Rejects the `none` algorithm.
///
/// # Errors
///
/// Returns [`AuthError::InsecureAlgorithm`] if `alg` is in
/// [`FORBIDDEN_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use extjwt_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("EdDSA").is_ok());
/// assert!(validate_algorithm("none").is_err());
/// assert!(validate_algorithm("NONE").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS.iter().any(|forbidden| forbidden.eq_ignore_ascii_case(alg)) {
        return Err(AuthError::insecure_algorithm(alg));
    }
    Ok(())
}

/// Requires `typ` to be `at+jwt` or `application/at+jwt`, ignoring case.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedTokenType`] if `typ` is missing or any
/// other value.
pub fn validate_token_type(typ: Option<&str>) -> Result<(), AuthError> {
    match typ {
        Some(typ)
            if typ.eq_ignore_ascii_case(ACCESS_TOKEN_TYPE)
                || typ.eq_ignore_ascii_case(ACCESS_TOKEN_MEDIA_TYPE) =>
        {
            Ok(())
        },
        Some(typ) => Err(AuthError::unsupported_token_type(typ)),
        None => Err(AuthError::unsupported_token_type("<missing>")),
    }
}

/// Applies the RFC 9068 header checks and returns the single header.
///
/// # Errors
///
/// - [`AuthError::MalformedToken`] if the token has zero or several headers
/// - [`AuthError::UnsupportedTokenType`] for a missing or foreign `typ`
/// - [`AuthError::InsecureAlgorithm`] for `alg: none`
pub fn validate_profile(token: &ParsedToken) -> Result<&TokenHeader, AuthError> {
    let header = match token.headers() {
        [header] => header,
        headers => {
            return Err(AuthError::malformed_token(format!(
                "only one header supported, got {}",
                headers.len()
            )));
        },
    };

    validate_token_type(header.typ.as_deref())?;
    validate_algorithm(&header.alg)?;
    Ok(header)
}

/// Requires every claim in `names` to be present and non-null.
///
/// # Errors
///
/// Returns a [`ClaimViolation::Missing`](crate::error::ClaimViolation::Missing)
/// claim-validation error naming the first absent claim.
pub fn validate_required_claims(claims: &ClaimSet, names: &[&str]) -> Result<(), AuthError> {
    match names.iter().find(|name| !claims.has(name)) {
        Some(missing) => Err(AuthError::missing_claim(*missing)),
        None => Ok(()),
    }
}

/// Decides whether a presented `client_id` is acceptable.
///
/// This is where a registry of OAuth clients plugs in.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Validates `client_id`.
    ///
    /// # Errors
    ///
    /// Returns a claim-validation error if the client is not acceptable.
    async fn validate_client(&self, client_id: &str) -> Result<(), AuthError>;
}

/// A [`ClientRegistry`] that accepts every client id.
#[derive(Copy, Clone, Debug, Default)]
pub struct AcceptAnyClient;

#[async_trait]
impl ClientRegistry for AcceptAnyClient {
    async fn validate_client(&self, _client_id: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Returns the `client_id` claim.
///
/// # Errors
///
/// Returns a claim-validation error if the claim is absent, null, or not a
/// string.
pub fn client_id(claims: &ClaimSet) -> Result<&str, AuthError> {
    match claims.get("client_id") {
        None | Some(ClaimValue::Null) => Err(AuthError::missing_claim("client_id")),
        Some(ClaimValue::String(client_id)) => Ok(client_id),
        Some(other) => Err(AuthError::invalid_claim(
            "client_id",
            format!("expected string, got {}", other.kind_name()),
        )),
    }
}

/// Checks `client_id` shape, then asks `registry` about it.
///
/// # Errors
///
/// Returns a claim-validation error from [`client_id`] or from the registry.
pub async fn validate_client_binding(
    claims: &ClaimSet,
    registry: &dyn ClientRegistry,
) -> Result<(), AuthError> {
    let client_id = client_id(claims)?;
    registry.validate_client(client_id).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{error::ClaimViolation, jwt::parse_token, testutil::craft_raw_jwt};

    fn claim_set(value: serde_json::Value) -> ClaimSet {
        serde_json::from_value(value).expect("claim set")
    }

    #[rstest]
    #[case("at+jwt")]
    #[case("AT+JWT")]
    #[case("application/at+jwt")]
    #[case("Application/AT+JWT")]
    fn test_access_token_types_accepted(#[case] typ: &str) {
        assert!(validate_token_type(Some(typ)).is_ok());
    }

    #[rstest]
    #[case(Some("JWT"))]
    #[case(Some("at+jwt "))]
    #[case(Some("application/jwt"))]
    #[case(None)]
    fn test_other_types_rejected(#[case] typ: Option<&str>) {
        let result = validate_token_type(typ);
        assert!(matches!(result, Err(AuthError::UnsupportedTokenType { .. })), "{typ:?}");
    }

    #[rstest]
    #[case("none")]
    #[case("None")]
    #[case("NONE")]
    fn test_none_algorithm_rejected(#[case] alg: &str) {
        assert!(matches!(validate_algorithm(alg), Err(AuthError::InsecureAlgorithm { .. })));
    }

    #[rstest]
    #[case("EdDSA")]
    #[case("RS256")]
    #[case("HS256")]
    fn test_other_algorithms_left_to_verifier(#[case] alg: &str) {
        assert!(validate_algorithm(alg).is_ok());
    }

    #[test]
    fn test_profile_accepts_single_access_token_header() {
        let token = craft_raw_jwt(&json!({"alg": "EdDSA", "typ": "at+jwt"}), &json!({}));
        let parsed = parse_token(&token).expect("parse");
        let header = validate_profile(&parsed).expect("valid profile");
        assert_eq!(header.alg, "EdDSA");
    }

    #[test]
    fn test_profile_checks_type_before_algorithm() {
        let token = craft_raw_jwt(&json!({"alg": "none", "typ": "JWT"}), &json!({}));
        let parsed = parse_token(&token).expect("parse");
        assert!(matches!(
            validate_profile(&parsed),
            Err(AuthError::UnsupportedTokenType { .. })
        ));
    }

    #[test]
    fn test_required_claims_reports_first_missing() {
        let claims = claim_set(json!({"exp": 1, "sub": "user:id:1", "iat": 1, "client_id": "c"}));
        let err = validate_required_claims(&claims, REQUIRED_CLAIMS).expect_err("jti missing");
        assert!(matches!(
            err,
            AuthError::ClaimValidation(ClaimViolation::Missing { ref claim }) if claim == "jti"
        ));
    }

    #[test]
    fn test_required_claims_null_counts_as_missing() {
        let claims = claim_set(
            json!({"exp": null, "jti": "j", "sub": "user:id:1", "iat": 1, "client_id": "c"}),
        );
        assert!(validate_required_claims(&claims, REQUIRED_CLAIMS).is_err());
    }

    #[rstest]
    #[case(json!({}))]
    #[case(json!({"client_id": null}))]
    #[case(json!({"client_id": 42}))]
    #[case(json!({"client_id": ["a"]}))]
    fn test_client_id_must_be_string(#[case] payload: serde_json::Value) {
        let claims = claim_set(payload);
        assert!(matches!(client_id(&claims), Err(AuthError::ClaimValidation(_))));
    }

    #[tokio::test]
    async fn test_client_binding_accepts_any_string_client() {
        let claims = claim_set(json!({"client_id": "grafana-app"}));
        validate_client_binding(&claims, &AcceptAnyClient).await.expect("accepted");
    }
}
