//! Structured fuzz target for access-token claims.
//!
//! Uses the `arbitrary` crate to generate access-token-shaped inputs, encodes
//! them in either the compact or the general JSON serialization, and feeds
//! them through parsing, the profile checks, and the identity mapping. This
//! reaches deeper code paths than raw byte fuzzing because the inputs are
//! plausible tokens.

#![no_main]

use arbitrary::Arbitrary;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value, json};

use extjwt_authn::{
    claims::RegisteredClaims,
    identity::{parse_entitlements, parse_subject},
    jwt::parse_token,
    validation::{REQUIRED_CLAIMS, client_id, validate_profile, validate_required_claims},
};

#[derive(Debug, Arbitrary)]
struct FuzzedToken {
    typ: Option<FuzzedType>,
    alg: FuzzedAlg,
    subject: FuzzedSubject,
    exp: Option<i64>,
    iat: Option<f64>,
    jti: Option<String>,
    client_id: Option<FuzzedValue>,
    entitlements: Option<Vec<(String, FuzzedValue)>>,
    /// Number of signatures in the JSON serialization; `None` for compact.
    json_signatures: Option<u8>,
    signature_bytes: Vec<u8>,
}

#[derive(Debug, Arbitrary)]
enum FuzzedType {
    AtJwt,
    MediaType,
    Jwt,
    Other(String),
}

#[derive(Debug, Arbitrary)]
enum FuzzedAlg {
    EdDSA,
    None,
    HS256,
    RS256,
    Other(String),
}

#[derive(Debug, Arbitrary)]
enum FuzzedSubject {
    User(i64),
    Raw(String),
    Number(i64),
}

#[derive(Debug, Arbitrary)]
enum FuzzedValue {
    Null,
    Bool(bool),
    Number(i64),
    String(String),
    Strings(Vec<String>),
    Mixed(Vec<Option<String>>),
}

impl FuzzedValue {
    fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => json!(b),
            Self::Number(n) => json!(n),
            Self::String(s) => json!(s),
            Self::Strings(items) => json!(items),
            Self::Mixed(items) => json!(items),
        }
    }
}

fn encode(value: &Value) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap_or_default())
}

fn build_token(input: &FuzzedToken) -> String {
    let mut header = Map::new();
    let alg = match &input.alg {
        FuzzedAlg::EdDSA => "EdDSA",
        FuzzedAlg::None => "none",
        FuzzedAlg::HS256 => "HS256",
        FuzzedAlg::RS256 => "RS256",
        FuzzedAlg::Other(s) => s,
    };
    header.insert("alg".to_owned(), json!(alg));
    if let Some(typ) = &input.typ {
        let typ = match typ {
            FuzzedType::AtJwt => "at+jwt",
            FuzzedType::MediaType => "application/at+jwt",
            FuzzedType::Jwt => "JWT",
            FuzzedType::Other(s) => s,
        };
        header.insert("typ".to_owned(), json!(typ));
    }

    let mut payload = Map::new();
    let sub = match &input.subject {
        FuzzedSubject::User(id) => json!(format!("user:id:{id}")),
        FuzzedSubject::Raw(s) => json!(s),
        FuzzedSubject::Number(n) => json!(n),
    };
    payload.insert("sub".to_owned(), sub);
    if let Some(exp) = input.exp {
        payload.insert("exp".to_owned(), json!(exp));
    }
    if let Some(iat) = input.iat {
        payload.insert("iat".to_owned(), json!(iat));
    }
    if let Some(jti) = &input.jti {
        payload.insert("jti".to_owned(), json!(jti));
    }
    if let Some(client_id) = &input.client_id {
        payload.insert("client_id".to_owned(), client_id.to_json());
    }
    if let Some(entitlements) = &input.entitlements {
        let map: Map<String, Value> =
            entitlements.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
        payload.insert("entitlements".to_owned(), Value::Object(map));
    }

    let protected = encode(&Value::Object(header));
    let payload = encode(&Value::Object(payload));
    let signature = URL_SAFE_NO_PAD.encode(&input.signature_bytes);

    match input.json_signatures {
        None => format!("{protected}.{payload}.{signature}"),
        Some(count) => {
            let signatures: Vec<Value> = (0..count % 4)
                .map(|_| json!({"protected": protected, "signature": signature}))
                .collect();
            json!({"payload": payload, "signatures": signatures}).to_string()
        },
    }
}

fuzz_target!(|input: FuzzedToken| {
    let token = build_token(&input);

    let Ok(parsed) = parse_token(&token) else {
        return;
    };
    let _ = validate_profile(&parsed);
    let _ = validate_required_claims(parsed.claims(), REQUIRED_CLAIMS);
    let _ = client_id(parsed.claims());
    let _ = parse_subject(parsed.claims());
    let _ = RegisteredClaims::from_claims(parsed.claims());
    if let Some(entitlements) = parsed.claims().get("entitlements") {
        let _ = parse_entitlements(entitlements);
    }
});
