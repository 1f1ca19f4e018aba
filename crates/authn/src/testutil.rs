//! Shared test utilities for access-token testing.
//!
//! This module provides helpers for generating Ed25519 key pairs, signing
//! RFC 9068 access tokens, crafting raw tokens (for attack testing), and
//! building requests. It is feature-gated behind `testutil` to keep it out
//! of production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! extjwt-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use extjwt_authn::testutil::{access_token_claims, create_server_key, sign_access_token};
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::SigningKey;
use extjwt_storage::{OrgId, auth::ServerSigningKey};
use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rand_core::OsRng;
use serde_json::{Value, json};
use zeroize::Zeroizing;

use crate::client::AuthnRequest;

/// Issuer used by test tokens and test configurations.
pub const TEST_ISSUER: &str = "http://localhost:3000";

/// Audience used by test tokens and test configurations.
pub const TEST_AUDIENCE: &str = "http://localhost:3000";

/// `client_id` carried by [`access_token_claims`].
pub const TEST_CLIENT_ID: &str = "grafana";

/// Generates a test Ed25519 key pair.
///
/// Returns `(pkcs8_der, public_key_base64url)` where:
/// - `pkcs8_der` is the private key in PKCS#8 DER format wrapped in [`Zeroizing`] (suitable for
///   [`EncodingKey::from_ed_der`])
/// - `public_key_base64url` is the 32-byte public key encoded as base64url without padding
///   (suitable for [`ServerSigningKey::public_key`])
///
/// Each call generates a fresh random key pair.
pub fn generate_test_keypair() -> (Zeroizing<Vec<u8>>, String) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let public_key_b64 = URL_SAFE_NO_PAD.encode(signing_key.verifying_key().to_bytes());

    let private_bytes: Zeroizing<[u8; 32]> = Zeroizing::new(signing_key.to_bytes());
    let mut pkcs8_der = Zeroizing::new(vec![
        0x30, 0x2e, // SEQUENCE, 46 bytes
        0x02, 0x01, 0x00, // INTEGER version 0
        0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
        0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112 (Ed25519)
        0x04, 0x22, // OCTET STRING, 34 bytes
        0x04, 0x20, // OCTET STRING, 32 bytes (the actual key)
    ]);
    pkcs8_der.extend_from_slice(&*private_bytes);

    (pkcs8_der, public_key_b64)
}

/// Creates a fresh server key.
///
/// Returns `(pkcs8_der, server_key)`; sign with the former, provision the
/// latter in a key provider.
pub fn create_server_key(kid: &str) -> (Zeroizing<Vec<u8>>, ServerSigningKey) {
    let (pkcs8_der, public_key_b64) = generate_test_keypair();
    let key = ServerSigningKey::builder().kid(kid).public_key(public_key_b64).build();
    (pkcs8_der, key)
}

/// Claims of a valid access token issued at `now` (Unix seconds).
///
/// Subject `user:id:42`, expiring an hour after `now`, with [`TEST_ISSUER`],
/// [`TEST_AUDIENCE`] and [`TEST_CLIENT_ID`]. No `entitlements`.
pub fn access_token_claims(now: i64) -> Value {
    json!({
        "iss": TEST_ISSUER,
        "sub": "user:id:42",
        "aud": TEST_AUDIENCE,
        "exp": now + 3600,
        "iat": now,
        "jti": "7f6c4a58-5b7e-4a2c-9f41-1d0e4b0f3c2a",
        "client_id": TEST_CLIENT_ID,
    })
}

/// Signs `claims` with EdDSA and the given `typ` header.
///
/// # Panics
///
/// Panics if JWT encoding fails (should not happen with valid inputs).
#[allow(clippy::expect_used)]
pub fn sign_token(pkcs8_der: &[u8], typ: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::EdDSA);
    header.typ = Some(typ.to_owned());
    header.kid = Some("test-key".to_owned());

    let encoding_key = EncodingKey::from_ed_der(pkcs8_der);
    jsonwebtoken::encode(&header, claims, &encoding_key).expect("Failed to encode test JWT")
}

/// Signs `claims` as an RFC 9068 access token (`typ: at+jwt`).
///
/// # Panics
///
/// Panics if JWT encoding fails.
pub fn sign_access_token(pkcs8_der: &[u8], claims: &Value) -> String {
    sign_token(pkcs8_der, "at+jwt", claims)
}

/// Creates a raw JWT string from arbitrary header and payload JSON.
///
/// The resulting JWT has the structure `{header_b64}.{payload_b64}.`
/// with an empty signature. This is useful for testing rejection of
/// malformed or attack JWTs (e.g., `alg: "none"`, algorithm confusion).
///
/// # Panics
///
/// Panics if JSON serialization fails.
#[allow(clippy::expect_used)]
pub fn craft_raw_jwt(header_json: &Value, payload_json: &Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// Re-encodes a signed compact token in the JWS general JSON serialization
/// with its signature repeated `copies` times.
///
/// `copies == 0` yields a token with no headers at all.
///
/// # Panics
///
/// Panics if `compact` does not have three segments.
#[allow(clippy::panic)]
pub fn to_general_json(compact: &str, copies: usize) -> String {
    let segments: Vec<&str> = compact.split('.').collect();
    let [protected, payload, signature] = segments.as_slice() else {
        panic!("expected a compact token");
    };
    let signatures: Vec<Value> =
        (0..copies).map(|_| json!({"protected": protected, "signature": signature})).collect();
    json!({"payload": payload, "signatures": signatures}).to_string()
}

/// Builds a request carrying `Authorization: Bearer <token>`.
///
/// # Panics
///
/// Panics if `token` is not a valid header value.
#[allow(clippy::expect_used)]
pub fn bearer_request(token: &str, org_id: OrgId) -> AuthnRequest {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("valid header value"),
    );
    AuthnRequest::builder().headers(headers).org_id(org_id).build()
}

/// Asserts that a [`Result<T, AuthError>`] is an `Err` matching the given [`AuthError`] variant.
///
/// Works with any `AuthError` variant. On failure, prints the expected variant
/// and the actual result for debugging.
///
/// [`AuthError`]: crate::error::AuthError
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use extjwt_authn::assert_auth_error;
/// use extjwt_authn::error::AuthError;
///
/// let result: Result<(), AuthError> = Err(AuthError::insecure_algorithm("none"));
/// assert_auth_error!(result, InsecureAlgorithm);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::jwt::parse_token;

    #[test]
    fn test_generate_test_keypair_produces_valid_key() {
        let (pkcs8_der, public_key_b64) = generate_test_keypair();
        // PKCS#8 DER for Ed25519 is 48 bytes (16 header + 32 key)
        assert_eq!(pkcs8_der.len(), 48);
        // Base64url of 32 bytes = 43 characters (no padding)
        assert_eq!(public_key_b64.len(), 43);
    }

    #[test]
    fn test_generate_test_keypair_unique() {
        let (_, pk1) = generate_test_keypair();
        let (_, pk2) = generate_test_keypair();
        assert_ne!(pk1, pk2, "each call should produce a unique key pair");
    }

    #[test]
    fn test_sign_access_token_sets_type() {
        let (pkcs8_der, _) = create_server_key("k1");
        let token = sign_access_token(&pkcs8_der, &access_token_claims(1_700_000_000));
        let parsed = parse_token(&token).expect("parse");
        assert_eq!(parsed.headers()[0].typ.as_deref(), Some("at+jwt"));
        assert_eq!(parsed.headers()[0].alg, "EdDSA");
    }

    #[test]
    fn test_to_general_json_header_count() {
        let (pkcs8_der, _) = create_server_key("k1");
        let token = sign_access_token(&pkcs8_der, &access_token_claims(1_700_000_000));
        for copies in [0, 1, 2] {
            let parsed = parse_token(&to_general_json(&token, copies)).expect("parse");
            assert_eq!(parsed.headers().len(), copies);
        }
    }

    #[test]
    fn test_craft_raw_jwt_format() {
        let jwt = craft_raw_jwt(&json!({"alg": "none", "typ": "at+jwt"}), &json!({"sub": "x"}));
        let parts: Vec<&str> = jwt.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[2].is_empty(), "signature should be empty for raw JWTs");
    }
}
