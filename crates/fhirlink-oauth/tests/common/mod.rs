#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use fhirlink_oauth::{
    ClientContext, FixedClock, OAuthConfig, SequenceRandom, TenantConfig,
};
use serde_json::Value;
use url::Url;
use wiremock::MockServer;

pub const NOW: i64 = 1_700_000_000;

pub fn context() -> (ClientContext, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(NOW));
    let context = ClientContext::new(
        reqwest::Client::new(),
        clock.clone(),
        Arc::new(SequenceRandom::new(1)),
    );
    (context, clock)
}

pub fn tenant(server: &MockServer, id: &str) -> TenantConfig {
    TenantConfig::new(
        id,
        "Test Organization",
        format!("{}/oauth2/authorize", server.uri()),
        format!("{}/oauth2/token", server.uri()),
        format!("{}/api/FHIR/R4", server.uri()),
    )
}

pub fn oauth_config(tenant: TenantConfig) -> OAuthConfig {
    OAuthConfig::new("abc", "https://app/cb", vec!["openid", "fhirUser"], tenant)
}

/// Compact JWT with an unsigned payload, as vendors' tokens look to a client
/// that does not verify them.
pub fn jwt(payload: &Value) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

pub fn query(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

pub fn callback(code: &str, state: Option<&str>) -> fhirlink_oauth::CallbackParams {
    let mut query = format!("code={code}");
    if let Some(state) = state {
        query.push_str("&state=");
        query.push_str(state);
    }
    fhirlink_oauth::CallbackParams::from_query(&query)
}
