//! Fuzz target for token parsing and profile validation.
//!
//! Feeds arbitrary byte strings as tokens to the parser and the profile
//! checks. Every result must be either `Ok(...)` or `Err(AuthError)`; panics
//! and hangs are bugs.

#![no_main]

use libfuzzer_sys::fuzz_target;

use extjwt_authn::{
    identity::{parse_entitlements, parse_subject},
    jwt::{decode_unverified_claims, parse_token},
    validation::{REQUIRED_CLAIMS, validate_profile, validate_required_claims},
};

fuzz_target!(|data: &[u8]| {
    // Tokens arrive in an HTTP header, so they are always UTF-8.
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    let _ = decode_unverified_claims(token);

    if let Ok(parsed) = parse_token(token) {
        let _ = validate_profile(&parsed);
        let _ = validate_required_claims(parsed.claims(), REQUIRED_CLAIMS);
        let _ = parse_subject(parsed.claims());
        if let Some(entitlements) = parsed.claims().get("entitlements") {
            let _ = parse_entitlements(entitlements);
        }
    }
});
