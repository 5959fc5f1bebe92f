//! Token refresh across vendors.

mod common;

use std::sync::{Arc, Mutex};

use fhirlink_oauth::refresh::JWT_BEARER_GRANT_TYPE;
use fhirlink_oauth::vendors::{self, epic, healow, onpatient};
use fhirlink_oauth::{AssertionClaims, AssertionSigner, OAuthError, ProxyEndpoint, TokenSet};
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{NOW, context, oauth_config, tenant};

/// Records every assertion it is asked to sign.
#[derive(Default)]
struct RecordingSigner {
    claims: Mutex<Vec<AssertionClaims>>,
}

impl AssertionSigner for RecordingSigner {
    fn sign(&self, claims: &AssertionClaims) -> Result<String, OAuthError> {
        if let Ok(mut seen) = self.claims.lock() {
            seen.push(claims.clone());
        }
        Ok("signed.assertion.jwt".to_string())
    }
}

fn issued(access_token: &str) -> TokenSet {
    let mut tokens = TokenSet::from_response(
        json!({"access_token": access_token, "expires_in": 60}),
        NOW - 3600,
    )
    .expect("token set");
    tokens.id_token = Some("id.token.jwt".to_string());
    tokens.patient_id = Some("p-1".to_string());
    tokens
}

#[tokio::test]
async fn cerner_without_refresh_token_is_not_refreshable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (context, _) = context();
    let client = vendors::cerner::client(&context);
    let tokens = issued("old");
    assert!(!client.can_refresh(&tokens));

    let err = client
        .refresh(&tokens, &oauth_config(tenant(&server, "1")))
        .await
        .expect_err("no refresh token");
    assert_eq!(err.kind(), "refresh_not_supported");
}

#[tokio::test]
async fn cerner_refresh_carries_identity_forward() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r-1"))
        .and(body_string_contains("client_id=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new",
            "expires_in": 570
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (context, _) = context();
    let client = vendors::cerner::client(&context);
    let mut tokens = issued("old");
    tokens.refresh_token = Some("r-1".to_string());
    tokens.client_id = Some("registered".to_string());
    assert!(client.is_expired_default(&tokens));

    let refreshed = client
        .refresh(&tokens, &oauth_config(tenant(&server, "1")))
        .await
        .expect("refresh");

    assert_eq!(refreshed.access_token, "new");
    assert_eq!(refreshed.expires_at, NOW + 570);
    assert_eq!(refreshed.refresh_token.as_deref(), Some("r-1"));
    assert_eq!(refreshed.id_token.as_deref(), Some("id.token.jwt"));
    assert_eq!(refreshed.patient_id.as_deref(), Some("p-1"));
    assert_eq!(refreshed.client_id.as_deref(), Some("registered"));
    assert!(!client.is_expired_default(&refreshed));
}

#[tokio::test]
async fn healow_confidential_refreshes_through_proxy_with_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/proxy/practice-9/token"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "grant_type": "refresh_token",
            "refresh_token": "r-1",
            "client_id": "abc"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new",
            "expires_in": 3600,
            "refresh_token": "r-2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (context, _) = context();
    let proxy = ProxyEndpoint::templated(format!("{}/proxy/{{tenant}}/token", server.uri()));
    let client = healow::client(&context, healow::HealowMode::Confidential(proxy));
    let mut tokens = issued("old");
    tokens.refresh_token = Some("r-1".to_string());
    assert!(client.can_refresh(&tokens));

    let refreshed = client
        .refresh(&tokens, &oauth_config(tenant(&server, "practice-9")))
        .await
        .expect("refresh");
    assert_eq!(refreshed.access_token, "new");
    assert_eq!(refreshed.expires_at, NOW + 3600);
    assert_eq!(refreshed.refresh_token.as_deref(), Some("r-2"));
    assert_eq!(refreshed.patient_id.as_deref(), Some("p-1"));
}

#[tokio::test]
async fn healow_public_client_cannot_refresh() {
    let server = MockServer::start().await;
    let (context, _) = context();
    let client = healow::client(&context, healow::HealowMode::Public);
    let mut tokens = issued("old");
    tokens.refresh_token = Some("r-1".to_string());

    let err = client
        .refresh(&tokens, &oauth_config(tenant(&server, "1")))
        .await
        .expect_err("public client");
    assert_eq!(err.kind(), "refresh_not_supported");
}

#[tokio::test]
async fn onpatient_backend_exchanges_and_refreshes_through_proxy() {
    let server = MockServer::start().await;
    let (context, clock) = context();
    let config = oauth_config(tenant(&server, "1"));
    let backend = ProxyEndpoint::fixed(format!("{}/backend/token", server.uri()));
    let client = onpatient::client(
        &context,
        onpatient::OnPatientOptions {
            backend: Some(backend),
        },
    );
    let start = client.initiate_auth(&config).expect("initiate");

    Mock::given(method("POST"))
        .and(path("/backend/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=c-1"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "first",
            "expires_in": 7200,
            "refresh_token": "r-1",
            "patient": "op-7"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/backend/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r-1"))
        .and(body_string_contains("client_id=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "second",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tokens = client
        .handle_callback(
            &common::callback("c-1", start.session.state.as_deref()),
            &config,
            Some(&start.session),
        )
        .await
        .expect("callback");
    assert_eq!(tokens.patient_id.as_deref(), Some("op-7"));
    assert!(client.can_refresh(&tokens));

    clock.advance(7200);
    let refreshed = client.refresh(&tokens, &config).await.expect("refresh");
    assert_eq!(refreshed.access_token, "second");
    assert_eq!(refreshed.expires_at, NOW + 7200 + 7200);
    assert_eq!(refreshed.refresh_token.as_deref(), Some("r-1"));
    assert_eq!(refreshed.patient_id.as_deref(), Some("op-7"));
}

#[tokio::test]
async fn onpatient_without_backend_cannot_refresh() {
    let server = MockServer::start().await;
    let (context, _) = context();
    let client = onpatient::client(&context, onpatient::OnPatientOptions::default());
    let mut tokens = issued("old");
    tokens.refresh_token = Some("r-1".to_string());

    let err = client
        .refresh(&tokens, &oauth_config(tenant(&server, "1")))
        .await
        .expect_err("no backend");
    assert_eq!(err.kind(), "refresh_not_supported");
}

#[tokio::test]
async fn refresh_rejects_tokens_that_are_already_expired() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new",
            "expires_in": 0
        })))
        .mount(&server)
        .await;

    let (context, _) = context();
    let client = vendors::va::client(&context);
    let mut tokens = issued("old");
    tokens.refresh_token = Some("r".to_string());

    let err = client
        .refresh(&tokens, &oauth_config(tenant(&server, "1")))
        .await
        .expect_err("expired");
    assert_eq!(err.kind(), "invalid_response");
}

#[tokio::test]
async fn epic_public_client_cannot_refresh() {
    let server = MockServer::start().await;
    let (context, _) = context();
    let client = epic::client(&context, epic::EpicOptions::default());

    let err = client
        .refresh(&issued("old"), &oauth_config(tenant(&server, "1")))
        .await
        .expect_err("public client");
    assert_eq!(err.kind(), "refresh_not_supported");
}

#[tokio::test]
async fn epic_registered_client_refreshes_with_signed_assertion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion=signed.assertion.jwt"))
        .and(body_string_contains("client_id=dyn-client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (context, _) = context();
    let signer = Arc::new(RecordingSigner::default());
    let client = epic::client(
        &context,
        epic::EpicOptions {
            signer: Some(signer.clone()),
        },
    );
    let config = oauth_config(tenant(&server, "1"));

    let mut tokens = issued("old");
    tokens.client_id = Some("dyn-client".to_string());
    assert!(client.can_refresh(&tokens));

    let refreshed = client.refresh(&tokens, &config).await.expect("refresh");
    assert_eq!(refreshed.access_token, "fresh");
    assert_eq!(refreshed.client_id.as_deref(), Some("dyn-client"));
    assert_eq!(refreshed.patient_id.as_deref(), Some("p-1"));

    let claims = signer.claims.lock().expect("lock").clone();
    assert_eq!(claims.len(), 1);
    let claims = &claims[0];
    assert_eq!(claims.iss, "dyn-client");
    assert_eq!(claims.sub, "dyn-client");
    assert_eq!(claims.aud, config.tenant.token_url);
    assert_eq!(claims.iat, NOW);
    assert_eq!(claims.exp, claims.iat + 300);
    assert!(!claims.jti.is_empty());
    assert_eq!(
        JWT_BEARER_GRANT_TYPE,
        "urn:ietf:params:oauth:grant-type:jwt-bearer"
    );
}

#[tokio::test]
async fn epic_registered_client_without_signer_cannot_refresh() {
    let server = MockServer::start().await;
    let (context, _) = context();
    let client = epic::client(&context, epic::EpicOptions::default());

    let mut tokens = issued("old");
    tokens.client_id = Some("dyn-client".to_string());

    let err = client
        .refresh(&tokens, &oauth_config(tenant(&server, "1")))
        .await
        .expect_err("no signer");
    assert_eq!(err.kind(), "refresh_not_supported");
}

#[tokio::test]
async fn jwt_bearer_assertions_get_unique_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "expires_in": 3600
        })))
        .expect(2)
        .mount(&server)
        .await;

    let (context, clock) = context();
    let signer = Arc::new(RecordingSigner::default());
    let client = epic::client(
        &context,
        epic::EpicOptions {
            signer: Some(signer.clone()),
        },
    );
    let config = oauth_config(tenant(&server, "1"));
    let mut tokens = issued("old");
    tokens.client_id = Some("dyn-client".to_string());

    let first = client.refresh(&tokens, &config).await.expect("first");
    clock.advance(3000);
    client.refresh(&first, &config).await.expect("second");

    let claims = signer.claims.lock().expect("lock").clone();
    assert_eq!(claims.len(), 2);
    assert_ne!(claims[0].jti, claims[1].jti);
    assert_eq!(claims[1].iat, NOW + 3000);
}
