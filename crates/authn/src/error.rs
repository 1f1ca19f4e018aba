//! Authentication error types.
//!
//! [`AuthError`] is the specific failure raised by one stage of the pipeline.
//! It is what operators see in logs. Callers of
//! [`ExtendedJwtClient::authenticate`](crate::client::ExtendedJwtClient::authenticate)
//! only ever receive an [`InvalidTokenError`], which carries a coarse
//! [`ErrorKind`] and keeps the specific cause behind
//! [`std::error::Error::source`].

use extjwt_storage::StorageError;
use thiserror::Error;

/// A specific reason a token failed standard or client-binding claim checks.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ClaimViolation {
    /// A required claim is absent (or JSON `null`).
    #[error("missing '{claim}' claim")]
    Missing {
        /// Name of the missing claim.
        claim: String,
    },

    /// A claim is present but has the wrong shape.
    #[error("invalid '{claim}' claim: {reason}")]
    Invalid {
        /// Name of the offending claim.
        claim: String,
        /// What was wrong with it.
        reason: String,
    },

    /// `exp` is in the past.
    #[error("token expired")]
    Expired,

    /// `iat` or `nbf` is in the future.
    #[error("token not yet valid")]
    NotYetValid,

    /// `iss` differs from the expected issuer.
    #[error("issuer mismatch: got '{actual}'")]
    IssuerMismatch {
        /// Issuer found in the token (empty when absent).
        actual: String,
    },

    /// `aud` does not contain the expected audience.
    #[error("audience does not contain '{expected}'")]
    AudienceMismatch {
        /// The audience the token was expected to carry.
        expected: String,
    },
}

/// Authentication errors raised by the token pipeline.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions must
/// include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The token cannot be decoded, or carries zero or several headers.
    #[error("Malformed token: {message}")]
    MalformedToken {
        /// What could not be decoded.
        message: String,
    },

    /// The `typ` header is missing or not an RFC 9068 access-token type.
    #[error("Unsupported token type: {typ}")]
    UnsupportedTokenType {
        /// The declared type, or `<missing>`.
        typ: String,
    },

    /// The token declares the `none` algorithm.
    #[error("Insecure algorithm: {alg}")]
    InsecureAlgorithm {
        /// The declared algorithm.
        alg: String,
    },

    /// Cryptographic verification failed.
    #[error("Invalid signature: {message}")]
    SignatureInvalid {
        /// Why verification failed.
        message: String,
    },

    /// A standard or client-binding claim check failed.
    #[error("Claim validation failed: {0}")]
    ClaimValidation(#[from] ClaimViolation),

    /// The `sub` claim is not of the form `user:id:<integer>`.
    #[error("Invalid subject: {message}")]
    SubjectFormat {
        /// Why the subject was rejected.
        message: String,
    },

    /// The user lookup failed.
    #[error("Failed to resolve user: {0}")]
    UserResolution(
        /// The underlying lookup failure.
        #[source]
        StorageError,
    ),

    /// The `entitlements` claim has an unsupported shape.
    #[error("Invalid entitlements claim: {message}")]
    EntitlementFormat {
        /// Which entry was malformed and how.
        message: String,
    },

    /// The server public key could not be retrieved.
    #[error("Signing key unavailable: {0}")]
    KeyUnavailable(
        /// The underlying provider failure.
        #[source]
        StorageError,
    ),

    /// The server public key is not a usable Ed25519 key.
    #[error("Invalid public key: {message}")]
    InvalidPublicKey {
        /// Why the key was rejected.
        message: String,
    },

    /// The request was cancelled while a lookup was in flight.
    #[error("Authentication cancelled")]
    Cancelled,
}

impl AuthError {
    /// Creates a [`AuthError::MalformedToken`].
    #[must_use]
    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken { message: message.into() }
    }

    /// Creates a [`AuthError::UnsupportedTokenType`].
    #[must_use]
    pub fn unsupported_token_type(typ: impl Into<String>) -> Self {
        Self::UnsupportedTokenType { typ: typ.into() }
    }

    /// Creates a [`AuthError::InsecureAlgorithm`].
    #[must_use]
    pub fn insecure_algorithm(alg: impl Into<String>) -> Self {
        Self::InsecureAlgorithm { alg: alg.into() }
    }

    /// Creates a [`AuthError::SignatureInvalid`].
    #[must_use]
    pub fn signature_invalid(message: impl Into<String>) -> Self {
        Self::SignatureInvalid { message: message.into() }
    }

    /// Creates a [`ClaimViolation::Missing`] claim-validation error.
    #[must_use]
    pub fn missing_claim(claim: impl Into<String>) -> Self {
        Self::ClaimValidation(ClaimViolation::Missing { claim: claim.into() })
    }

    /// Creates a [`ClaimViolation::Invalid`] claim-validation error.
    #[must_use]
    pub fn invalid_claim(claim: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ClaimValidation(ClaimViolation::Invalid {
            claim: claim.into(),
            reason: reason.into(),
        })
    }

    /// Creates a [`ClaimViolation::Expired`] claim-validation error.
    #[must_use]
    pub fn token_expired() -> Self {
        Self::ClaimValidation(ClaimViolation::Expired)
    }

    /// Creates a [`ClaimViolation::NotYetValid`] claim-validation error.
    #[must_use]
    pub fn token_not_yet_valid() -> Self {
        Self::ClaimValidation(ClaimViolation::NotYetValid)
    }

    /// Creates a [`AuthError::SubjectFormat`].
    #[must_use]
    pub fn subject_format(message: impl Into<String>) -> Self {
        Self::SubjectFormat { message: message.into() }
    }

    /// Creates a [`AuthError::EntitlementFormat`].
    #[must_use]
    pub fn entitlement_format(message: impl Into<String>) -> Self {
        Self::EntitlementFormat { message: message.into() }
    }

    /// Creates a [`AuthError::InvalidPublicKey`].
    #[must_use]
    pub fn invalid_public_key(message: impl Into<String>) -> Self {
        Self::InvalidPublicKey { message: message.into() }
    }

    /// Coarse classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedToken { .. } => ErrorKind::MalformedToken,
            Self::UnsupportedTokenType { .. } => ErrorKind::UnsupportedTokenType,
            Self::InsecureAlgorithm { .. } => ErrorKind::InsecureAlgorithm,
            Self::SignatureInvalid { .. } | Self::InvalidPublicKey { .. } => {
                ErrorKind::SignatureInvalid
            },
            Self::ClaimValidation(_) => ErrorKind::ClaimValidation,
            Self::SubjectFormat { .. } => ErrorKind::SubjectFormat,
            Self::UserResolution(_) => ErrorKind::UserResolution,
            Self::EntitlementFormat { .. } => ErrorKind::EntitlementFormat,
            Self::KeyUnavailable(_) => ErrorKind::KeyUnavailable,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind as JwtErrorKind;

        match err.kind() {
            JwtErrorKind::InvalidToken => AuthError::malformed_token("invalid JWT structure"),
            JwtErrorKind::Base64(_) | JwtErrorKind::Json(_) | JwtErrorKind::Utf8(_) => {
                AuthError::malformed_token(format!("JWT decode error: {err}"))
            },
            JwtErrorKind::InvalidSignature => AuthError::signature_invalid("signature mismatch"),
            JwtErrorKind::InvalidAlgorithm => {
                AuthError::signature_invalid("algorithm does not match the server key")
            },
            JwtErrorKind::ExpiredSignature => AuthError::token_expired(),
            JwtErrorKind::ImmatureSignature => AuthError::token_not_yet_valid(),
            JwtErrorKind::MissingRequiredClaim(claim) => AuthError::missing_claim(claim.clone()),
            _ => AuthError::signature_invalid(format!("JWT verification error: {err}")),
        }
    }
}

/// Coarse classification of an authentication failure.
///
/// Safe to expose in metrics and to map onto response codes; it says which
/// stage failed, not what the token contained.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// See [`AuthError::MalformedToken`].
    MalformedToken,
    /// See [`AuthError::UnsupportedTokenType`].
    UnsupportedTokenType,
    /// See [`AuthError::InsecureAlgorithm`].
    InsecureAlgorithm,
    /// See [`AuthError::SignatureInvalid`] and [`AuthError::InvalidPublicKey`].
    SignatureInvalid,
    /// See [`AuthError::ClaimValidation`].
    ClaimValidation,
    /// See [`AuthError::SubjectFormat`].
    SubjectFormat,
    /// See [`AuthError::UserResolution`].
    UserResolution,
    /// See [`AuthError::EntitlementFormat`].
    EntitlementFormat,
    /// See [`AuthError::KeyUnavailable`].
    KeyUnavailable,
    /// See [`AuthError::Cancelled`].
    Cancelled,
}

/// The single, normalized failure returned to callers of `authenticate`.
///
/// Its `Display` never varies with the cause, so responses built from it
/// cannot be used as an oracle. The specific [`AuthError`] remains available
/// through [`cause`](Self::cause) and [`std::error::Error::source`].
#[derive(Debug, Error)]
#[error("invalid JWT")]
pub struct InvalidTokenError {
    #[source]
    cause: AuthError,
}

impl InvalidTokenError {
    /// Wraps a specific pipeline failure.
    #[must_use]
    pub fn new(cause: AuthError) -> Self {
        Self { cause }
    }

    /// Classification of the underlying cause.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }

    /// The specific pipeline failure.
    #[must_use]
    pub fn cause(&self) -> &AuthError {
        &self.cause
    }

    /// Consumes the wrapper, returning the specific failure.
    #[must_use]
    pub fn into_cause(self) -> AuthError {
        self.cause
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A field required while the client is enabled is empty.
    #[error("extended JWT authentication is enabled but `{field}` is empty")]
    MissingField {
        /// The empty field.
        field: &'static str,
    },

    /// The lookup timeout is zero.
    #[error("`lookup_timeout` must be greater than zero")]
    ZeroTimeout,
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
