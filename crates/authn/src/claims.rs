//! Claim values and claim sets.
//!
//! A token's payload is kept twice: as a raw [`ClaimSet`] preserving every
//! member (including non-standard ones such as `client_id` and
//! `entitlements`), and as typed [`RegisteredClaims`] extracted from it.
//! Both are read-only once built.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::AuthError;

/// A single claim value.
///
/// JSON arrays whose elements are all strings (including the empty array)
/// become [`ClaimValue::StringList`]; other arrays become [`ClaimValue::List`].
#[derive(Clone, Debug, PartialEq)]
pub enum ClaimValue {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number.
    Number(serde_json::Number),
    /// JSON string.
    String(String),
    /// Array of strings.
    StringList(Vec<String>),
    /// Array with at least one non-string element.
    List(Vec<ClaimValue>),
    /// JSON object.
    Map(BTreeMap<String, ClaimValue>),
}

impl ClaimValue {
    /// Returns the string if this is a [`ClaimValue::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a NumericDate in whole seconds.
    ///
    /// Fractional seconds are truncated. Non-finite numbers are rejected.
    #[must_use]
    pub fn as_numeric_date(&self) -> Option<i64> {
        match self {
            #[allow(clippy::cast_possible_truncation)]
            Self::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
            _ => None,
        }
    }

    /// Returns `true` for [`ClaimValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the JSON shape, for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::StringList(_) => "string list",
            Self::List(_) => "list",
            Self::Map(_) => "object",
        }
    }
}

impl From<Value> for ClaimValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => {
                if items.iter().all(Value::is_string) {
                    Self::StringList(
                        items
                            .into_iter()
                            .filter_map(|item| match item {
                                Value::String(s) => Some(s),
                                _ => None,
                            })
                            .collect(),
                    )
                } else {
                    Self::List(items.into_iter().map(Self::from).collect())
                }
            },
            Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            },
        }
    }
}

impl<'de> Deserialize<'de> for ClaimValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

/// All claims carried by a token, keyed by claim name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClaimSet(BTreeMap<String, ClaimValue>);

impl ClaimSet {
    /// Builds a claim set from a decoded JSON object.
    #[must_use]
    pub fn from_json_object(object: serde_json::Map<String, Value>) -> Self {
        Self(object.into_iter().map(|(k, v)| (k, ClaimValue::from(v))).collect())
    }

    /// Returns the raw value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.0.get(name)
    }

    /// Returns `true` if `name` is present with a non-null value.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| !value.is_null())
    }

    /// Returns `name` if it is a string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ClaimValue::as_str)
    }

    /// The `iss` claim, if it is a string.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    /// The `sub` claim, if it is a string.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// Number of claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set holds no claims.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over claims in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClaimValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<'de> Deserialize<'de> for ClaimSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Map::<String, Value>::deserialize(deserializer).map(Self::from_json_object)
    }
}

/// The `aud` claim: one audience or several.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Audience {
    /// A single string audience.
    Single(String),
    /// An array of audiences.
    Many(Vec<String>),
}

impl Audience {
    /// Returns `true` if `expected` is one of the audiences.
    #[must_use]
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Self::Single(aud) => aud == expected,
            Self::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Registered claims in typed form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegisteredClaims {
    /// Issuer (`iss`).
    pub issuer: Option<String>,
    /// Subject (`sub`).
    pub subject: Option<String>,
    /// Audience (`aud`).
    pub audience: Option<Audience>,
    /// Expiry (`exp`).
    pub expires_at: Option<DateTime<Utc>>,
    /// Not-before (`nbf`).
    pub not_before: Option<DateTime<Utc>>,
    /// Issued-at (`iat`).
    pub issued_at: Option<DateTime<Utc>>,
    /// Token ID (`jti`).
    pub jwt_id: Option<String>,
}

impl RegisteredClaims {
    /// Extracts the registered claims from a claim set.
    ///
    /// Absent or `null` claims become `None`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ClaimValidation`] if a registered claim is present
    /// with the wrong type.
    pub fn from_claims(claims: &ClaimSet) -> Result<Self, AuthError> {
        Ok(Self {
            issuer: string_claim(claims, "iss")?,
            subject: string_claim(claims, "sub")?,
            audience: audience_claim(claims)?,
            expires_at: date_claim(claims, "exp")?,
            not_before: date_claim(claims, "nbf")?,
            issued_at: date_claim(claims, "iat")?,
            jwt_id: string_claim(claims, "jti")?,
        })
    }
}

fn string_claim(claims: &ClaimSet, name: &str) -> Result<Option<String>, AuthError> {
    match claims.get(name) {
        None | Some(ClaimValue::Null) => Ok(None),
        Some(ClaimValue::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(AuthError::invalid_claim(
            name,
            format!("expected string, got {}", other.kind_name()),
        )),
    }
}

fn audience_claim(claims: &ClaimSet) -> Result<Option<Audience>, AuthError> {
    match claims.get("aud") {
        None | Some(ClaimValue::Null) => Ok(None),
        Some(ClaimValue::String(s)) => Ok(Some(Audience::Single(s.clone()))),
        Some(ClaimValue::StringList(list)) => Ok(Some(Audience::Many(list.clone()))),
        Some(other) => Err(AuthError::invalid_claim(
            "aud",
            format!("expected string or string list, got {}", other.kind_name()),
        )),
    }
}

fn date_claim(claims: &ClaimSet, name: &str) -> Result<Option<DateTime<Utc>>, AuthError> {
    match claims.get(name) {
        None | Some(ClaimValue::Null) => Ok(None),
        Some(value) => value
            .as_numeric_date()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(Some)
            .ok_or_else(|| {
                AuthError::invalid_claim(
                    name,
                    format!("expected NumericDate, got {}", value.kind_name()),
                )
            }),
    }
}
