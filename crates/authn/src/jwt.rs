//! Token parsing.
//!
//! Parsing decodes a signed token into its headers and claims without
//! verifying anything. Both JWS serializations are accepted:
//!
//! - compact: `header.payload.signature`
//! - JSON (general with a `signatures` array, or flattened)
//!
//! The JSON form is what makes multi-signature tokens expressible; the
//! profile validator then rejects anything that does not carry exactly one
//! header.
//!
//! # Example
//!
//! ```no_run
//! use extjwt_authn::jwt::decode_unverified_claims;
//!
//! # fn example(token: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let claims = decode_unverified_claims(token)?;
//! println!("issuer: {:?}", claims.issuer());
//! # Ok(())
//! # }
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{claims::ClaimSet, error::AuthError};

/// Short RFC 9068 media type for access tokens.
pub const ACCESS_TOKEN_TYPE: &str = "at+jwt";

/// Full RFC 9068 media type for access tokens.
pub const ACCESS_TOKEN_MEDIA_TYPE: &str = "application/at+jwt";

/// A decoded JOSE header.
///
/// For JSON-serialized tokens this is the union of the protected and
/// unprotected members.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm (`alg`).
    pub alg: String,
    /// Declared media type (`typ`).
    #[serde(default)]
    pub typ: Option<String>,
    /// Key ID (`kid`).
    #[serde(default)]
    pub kid: Option<String>,
    /// Content type (`cty`).
    #[serde(default)]
    pub cty: Option<String>,
    /// Remaining header parameters.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A parsed, unverified token.
#[derive(Clone, Debug)]
pub struct ParsedToken {
    headers: Vec<TokenHeader>,
    claims: ClaimSet,
    compact: Option<String>,
}

impl ParsedToken {
    /// One header per signature.
    #[must_use]
    pub fn headers(&self) -> &[TokenHeader] {
        &self.headers
    }

    /// Claims decoded from the payload. Not yet verified.
    #[must_use]
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    /// Compact serialization of the token, used for signature verification.
    ///
    /// `None` for JSON-serialized tokens that cannot be expressed compactly
    /// (several signatures, or unprotected header members).
    #[must_use]
    pub fn compact(&self) -> Option<&str> {
        self.compact.as_deref()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonSerialization {
    payload: String,
    #[serde(default)]
    signatures: Option<Vec<JsonSignature>>,
    #[serde(default)]
    protected: Option<String>,
    #[serde(default)]
    header: Option<Map<String, Value>>,
    #[serde(default)]
    signature: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonSignature {
    #[serde(default)]
    protected: Option<String>,
    #[serde(default)]
    header: Option<Map<String, Value>>,
    signature: String,
}

/// Parses a token in compact or JSON serialization.
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] if the token does not have a valid
/// JWS structure, a segment is not base64url, or a header or payload is not
/// a JSON object.
pub fn parse_token(raw: &str) -> Result<ParsedToken, AuthError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AuthError::malformed_token("empty token"));
    }
    if raw.starts_with('{') { parse_json(raw) } else { parse_compact(raw) }
}

/// Returns the claims of a token without verifying its signature.
///
/// Used for cheap routing decisions only; never trust the result.
///
/// # Errors
///
/// Same as [`parse_token`].
pub fn decode_unverified_claims(raw: &str) -> Result<ClaimSet, AuthError> {
    parse_token(raw).map(|token| token.claims)
}

fn parse_compact(raw: &str) -> Result<ParsedToken, AuthError> {
    let segments: Vec<&str> = raw.split('.').collect();
    let [header_b64, payload_b64, _signature] = segments.as_slice() else {
        return Err(AuthError::malformed_token(format!(
            "expected 3 segments, got {}",
            segments.len()
        )));
    };

    let header = decode_object(header_b64, "header")?;
    let claims = ClaimSet::from_json_object(decode_object(payload_b64, "payload")?);

    Ok(ParsedToken {
        headers: vec![into_header(header)?],
        claims,
        compact: Some(raw.to_owned()),
    })
}

fn parse_json(raw: &str) -> Result<ParsedToken, AuthError> {
    let token: JsonSerialization = serde_json::from_str(raw)
        .map_err(|e| AuthError::malformed_token(format!("invalid JSON serialization: {e}")))?;

    let signatures = match token.signatures {
        Some(signatures) => {
            if token.protected.is_some() || token.header.is_some() || token.signature.is_some() {
                return Err(AuthError::malformed_token(
                    "general JSON serialization must not carry top-level signature members",
                ));
            }
            signatures
        },
        None => {
            let signature = token.signature.ok_or_else(|| {
                AuthError::malformed_token("JSON serialization carries no signature")
            })?;
            vec![JsonSignature { protected: token.protected, header: token.header, signature }]
        },
    };

    let claims = ClaimSet::from_json_object(decode_object(&token.payload, "payload")?);

    let compact = match signatures.as_slice() {
        [JsonSignature { protected: Some(protected), header: None, signature }] => {
            Some(format!("{protected}.{}.{signature}", token.payload))
        },
        _ => None,
    };

    let headers = signatures
        .into_iter()
        .map(|signature| merge_header(signature.protected.as_deref(), signature.header))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedToken { headers, claims, compact })
}

fn merge_header(
    protected: Option<&str>,
    unprotected: Option<Map<String, Value>>,
) -> Result<TokenHeader, AuthError> {
    let mut merged = match protected {
        Some(segment) => decode_object(segment, "protected header")?,
        None => Map::new(),
    };
    for (name, value) in unprotected.unwrap_or_default() {
        if merged.contains_key(&name) {
            return Err(AuthError::malformed_token(format!(
                "header parameter '{name}' appears in both protected and unprotected headers"
            )));
        }
        merged.insert(name, value);
    }
    into_header(merged)
}

fn decode_object(segment: &str, what: &str) -> Result<Map<String, Value>, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::malformed_token(format!("{what} is not base64url: {e}")))?;
    match serde_json::from_slice(&bytes) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(AuthError::malformed_token(format!("{what} is not a JSON object"))),
        Err(e) => Err(AuthError::malformed_token(format!("{what} is not valid JSON: {e}"))),
    }
}

fn into_header(object: Map<String, Value>) -> Result<TokenHeader, AuthError> {
    serde_json::from_value(Value::Object(object))
        .map_err(|e| AuthError::malformed_token(format!("invalid header: {e}")))
}
