//! Integration test verifying that `#[instrument]` annotations produce
//! the expected spans across the authentication pipeline, and that failed
//! lookups report whether they were transient.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use extjwt_authn::{
    ExtendedJwtClient, FixedClock,
    config::ExtendedJwtConfig,
    testutil::{
        TEST_AUDIENCE, TEST_ISSUER, access_token_claims, bearer_request, craft_raw_jwt,
        create_server_key, sign_access_token,
    },
};
use extjwt_storage::{
    OrgId, UserId,
    auth::MemoryServerKeyProvider,
    user::{MemoryUserStore, OrgRole, UserAccount},
};
use serde_json::json;
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer: records span names and `transient` event fields
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
    transient: Arc<Mutex<Vec<bool>>>,
}

struct TransientVisitor(Option<bool>);

impl tracing::field::Visit for TransientVisitor {
    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        if field.name() == "transient" {
            self.0 = Some(value);
        }
    }

    fn record_debug(&mut self, _field: &tracing::field::Field, _value: &dyn std::fmt::Debug) {}
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }

    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = TransientVisitor(None);
        event.record(&mut visitor);
        if let Some(transient) = visitor.0 {
            self.transient.lock().expect("lock poisoned").push(transient);
        }
    }
}

const NOW: i64 = 1_700_000_000;

fn client() -> (ExtendedJwtClient, String) {
    client_with_claims(&access_token_claims(NOW))
}

fn client_with_claims(claims: &serde_json::Value) -> (ExtendedJwtClient, String) {
    let (pkcs8_der, server_key) = create_server_key("server-key-1");
    let users = MemoryUserStore::new();
    users.insert_user(UserAccount::builder().user_id(UserId(42)).login("svc").build());
    users.add_membership(OrgId(1), UserId(42), "Main Org.", OrgRole::Viewer);

    let config = ExtendedJwtConfig::builder()
        .enabled(true)
        .expect_issuer(TEST_ISSUER)
        .expect_audience(TEST_AUDIENCE)
        .build()
        .expect("valid config");
    let client = ExtendedJwtClient::new(
        config,
        Arc::new(MemoryServerKeyProvider::with_key(server_key)),
        Arc::new(users),
    )
    .with_clock(Arc::new(FixedClock::new(Utc.timestamp_opt(NOW, 0).single().expect("time"))));

    let token = sign_access_token(&pkcs8_der, claims);
    (client, token)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_authentication_creates_pipeline_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let (client, token) = client();
    client.authenticate(&bearer_request(&token, OrgId(1))).await.expect("valid token");

    let recorded = spans.lock().expect("lock poisoned");
    for expected in [
        "authenticate",
        "verify_token",
        "server_public_key",
        "resolve_identity",
        "get_signed_in_user",
    ] {
        assert!(
            recorded.iter().any(|s| s == expected),
            "expected a '{expected}' span, got: {recorded:?}"
        );
    }
}

#[tokio::test]
async fn rejected_profile_skips_verification_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let (client, _) = client();
    let token =
        craft_raw_jwt(&json!({"alg": "none", "typ": "at+jwt"}), &access_token_claims(NOW));
    let _ = client.authenticate(&bearer_request(&token, OrgId(1))).await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "authenticate"), "got: {recorded:?}");
    assert!(
        !recorded.iter().any(|s| s == "verify_token" || s == "resolve_identity"),
        "no verification spans expected, got: {recorded:?}"
    );
}

#[tokio::test]
async fn failed_user_lookup_logs_transient_flag() {
    let collector = SpanCollector::default();
    let transient = Arc::clone(&collector.transient);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut claims = access_token_claims(NOW);
    claims["sub"] = json!("user:id:99");
    let (client, token) = client_with_claims(&claims);
    let _ = client.authenticate(&bearer_request(&token, OrgId(1))).await;

    let recorded = transient.lock().expect("lock poisoned");
    assert_eq!(*recorded, vec![false], "unknown user is not transient");
}
