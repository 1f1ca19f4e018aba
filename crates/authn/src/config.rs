//! Configuration for the authentication clients.
//!
//! Loaded once at startup and read-only afterwards. Durations use
//! human-readable strings (`"5s"`, `"250ms"`).
//!
//! ```
//! use extjwt_authn::config::AuthConfig;
//!
//! let config: AuthConfig = serde_json::from_str(r#"{
//!     "extended_jwt": {
//!         "enabled": true,
//!         "expect_issuer": "http://localhost:3000",
//!         "expect_audience": "http://localhost:3000",
//!         "lookup_timeout": "2s"
//!     },
//!     "anonymous": { "enabled": false }
//! }"#).unwrap();
//! config.validate().unwrap();
//! ```

use std::time::Duration;

use extjwt_storage::{OrgId, user::OrgRole};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default bound on each key or user lookup (5 seconds).
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for [`ExtendedJwtClient`](crate::client::ExtendedJwtClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtendedJwtConfig {
    /// Whether the client participates in authentication at all.
    #[serde(default)]
    pub enabled: bool,

    /// Issuer every accepted token must carry, compared exactly.
    #[serde(default)]
    pub expect_issuer: String,

    /// Audience every accepted token must include, compared exactly.
    #[serde(default)]
    pub expect_audience: String,

    /// Bound on each key and user lookup.
    #[serde(with = "humantime_serde", default = "default_lookup_timeout")]
    pub lookup_timeout: Duration,
}

fn default_lookup_timeout() -> Duration {
    DEFAULT_LOOKUP_TIMEOUT
}

impl Default for ExtendedJwtConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            expect_issuer: String::new(),
            expect_audience: String::new(),
            lookup_timeout: default_lookup_timeout(),
        }
    }
}

#[bon::bon]
impl ExtendedJwtConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use extjwt_authn::config::ExtendedJwtConfig;
    ///
    /// let config = ExtendedJwtConfig::builder()
    ///     .enabled(true)
    ///     .expect_issuer("http://localhost:3000")
    ///     .expect_audience("http://localhost:3000")
    ///     .lookup_timeout(Duration::from_secs(2))
    ///     .build()?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[builder]
    pub fn new(
        #[builder(default)] enabled: bool,
        #[builder(into, default)] expect_issuer: String,
        #[builder(into, default)] expect_audience: String,
        #[builder(default = DEFAULT_LOOKUP_TIMEOUT)] lookup_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { enabled, expect_issuer, expect_audience, lookup_timeout };
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration is usable.
    ///
    /// A disabled client is always valid.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingField`] if enabled with an empty issuer or
    ///   audience
    /// - [`ConfigError::ZeroTimeout`] if `lookup_timeout` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.expect_issuer.is_empty() {
            return Err(ConfigError::MissingField { field: "expect_issuer" });
        }
        if self.expect_audience.is_empty() {
            return Err(ConfigError::MissingField { field: "expect_audience" });
        }
        if self.lookup_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Configuration for [`AnonymousClient`](crate::dispatch::AnonymousClient).
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnonymousConfig {
    /// Whether unauthenticated requests get an anonymous identity.
    #[serde(default)]
    #[builder(default)]
    pub enabled: bool,

    /// Organization anonymous visitors are placed in.
    #[serde(default = "default_anonymous_org")]
    #[builder(default = default_anonymous_org())]
    pub org_id: OrgId,

    /// Role anonymous visitors receive.
    #[serde(default)]
    #[builder(default)]
    pub org_role: OrgRole,
}

fn default_anonymous_org() -> OrgId {
    OrgId(1)
}

impl Default for AnonymousConfig {
    fn default() -> Self {
        Self { enabled: false, org_id: default_anonymous_org(), org_role: OrgRole::default() }
    }
}

/// All authentication client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Extended JWT client settings.
    #[serde(default)]
    pub extended_jwt: ExtendedJwtConfig,

    /// Anonymous client settings.
    #[serde(default)]
    pub anonymous: AnonymousConfig,
}

impl AuthConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first section error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.extended_jwt.validate()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config: AuthConfig = serde_json::from_str("{}").expect("parse");
        assert!(!config.extended_jwt.enabled);
        assert_eq!(config.extended_jwt.lookup_timeout, DEFAULT_LOOKUP_TIMEOUT);
        assert_eq!(config.anonymous.org_id, OrgId(1));
        assert_eq!(config.anonymous.org_role, OrgRole::Viewer);
        config.validate().expect("disabled config is valid");
    }

    #[test]
    fn test_humantime_timeout() {
        let config: ExtendedJwtConfig =
            serde_json::from_str(r#"{"lookup_timeout": "250ms"}"#).expect("parse");
        assert_eq!(config.lookup_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<ExtendedJwtConfig, _> =
            serde_json::from_str(r#"{"enabled": true, "expect_isuser": "typo"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_enabled_requires_issuer_and_audience() {
        let result = ExtendedJwtConfig::builder().enabled(true).expect_audience("aud").build();
        assert_eq!(result, Err(ConfigError::MissingField { field: "expect_issuer" }));

        let result = ExtendedJwtConfig::builder().enabled(true).expect_issuer("iss").build();
        assert_eq!(result, Err(ConfigError::MissingField { field: "expect_audience" }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = ExtendedJwtConfig::builder()
            .enabled(true)
            .expect_issuer("iss")
            .expect_audience("aud")
            .lookup_timeout(Duration::ZERO)
            .build();
        assert_eq!(result, Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn test_anonymous_role_names() {
        let config: AnonymousConfig =
            serde_json::from_str(r#"{"enabled": true, "org_id": 3, "org_role": "Editor"}"#)
                .expect("parse");
        assert_eq!(config.org_id, OrgId(3));
        assert_eq!(config.org_role, OrgRole::Editor);
    }
}
