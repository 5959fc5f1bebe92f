//! Authorization URL construction.
//!
//! One algorithm serves every vendor; vendor divergence is expressed through
//! [`AuthUrlPolicy`] (which optional parameters are sent), not through
//! separate builders.

use url::Url;

use crate::error::OAuthError;
use crate::pkce::{CHALLENGE_METHOD, PkceChallenge};
use crate::session::AuthorizationRequestState;
use crate::tenant::OAuthConfig;

/// How a vendor treats the `aud` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Audience {
    /// Never send `aud`.
    Omit,
    /// Send `aud` when the tenant has a FHIR base URL.
    #[default]
    Optional,
    /// Always send `aud`; fail with `missing_aud` if the base URL is empty.
    Required,
}

/// Vendor-specific authorization URL options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthUrlPolicy {
    /// `aud` handling.
    pub audience: Audience,
    /// Fail with `missing_tenant_id` when the tenant id is empty.
    pub require_tenant_id: bool,
    /// Additional fixed parameters appended after the standard ones.
    pub extra_params: Vec<(String, String)>,
    /// Parameters whose value is a template; `{tenant}` becomes the tenant id.
    pub tenant_params: Vec<(String, String)>,
}

impl AuthUrlPolicy {
    /// Creates a policy with the given audience handling.
    #[must_use]
    pub fn new(audience: Audience) -> Self {
        Self {
            audience,
            ..Self::default()
        }
    }

    /// Requires a non-empty tenant id.
    #[must_use]
    pub fn with_required_tenant_id(mut self) -> Self {
        self.require_tenant_id = true;
        self
    }

    /// Adds a fixed parameter.
    #[must_use]
    pub fn with_extra_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((key.into(), value.into()));
        self
    }

    /// Adds a parameter derived from the tenant id, e.g.
    /// `with_tenant_param("ah-practice", "Organization/a-1.Practice-{tenant}")`.
    #[must_use]
    pub fn with_tenant_param(
        mut self,
        key: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.tenant_params.push((key.into(), template.into()));
        self
    }
}

/// Builds the redirect URL for the vendor's authorization endpoint.
///
/// Always includes `response_type=code`, `client_id`, `redirect_uri` and the
/// space-joined `scope`. Adds `aud`, `state`, `nonce` and the S256
/// `code_challenge` according to the policy and the session contents.
///
/// # Errors
///
/// - `missing_aud` if the policy requires `aud` and the tenant has no FHIR base URL
/// - `missing_tenant_id` if the policy requires a tenant id and it is empty
/// - `invalid_config` if the tenant authorization URL cannot be parsed
pub fn build_authorization_url(
    config: &OAuthConfig,
    session: &AuthorizationRequestState,
    policy: &AuthUrlPolicy,
) -> Result<Url, OAuthError> {
    let tenant = &config.tenant;

    let aud = match policy.audience {
        Audience::Omit => None,
        Audience::Optional => Some(tenant.fhir_base_url.as_str()).filter(|a| !a.is_empty()),
        Audience::Required => {
            if tenant.fhir_base_url.is_empty() {
                return Err(OAuthError::MissingAud);
            }
            Some(tenant.fhir_base_url.as_str())
        }
    };

    if policy.require_tenant_id && tenant.id.trim().is_empty() {
        return Err(OAuthError::MissingTenantId);
    }

    let mut url = Url::parse(&tenant.auth_url).map_err(|e| {
        OAuthError::invalid_config(format!(
            "invalid authorization URL '{}': {e}",
            tenant.auth_url
        ))
    })?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("response_type", "code");
        params.append_pair("client_id", &config.client_id);
        params.append_pair("redirect_uri", &config.redirect_uri);
        params.append_pair("scope", &config.scope_string());

        if let Some(aud) = aud {
            params.append_pair("aud", aud);
        }
        if let Some(state) = &session.state {
            params.append_pair("state", state);
        }
        if let Some(nonce) = &session.nonce {
            params.append_pair("nonce", nonce);
        }
        if let Some(verifier) = &session.code_verifier {
            let challenge = PkceChallenge::from_verifier_str(verifier);
            params.append_pair("code_challenge", challenge.as_str());
            params.append_pair("code_challenge_method", CHALLENGE_METHOD);
        }

        for (key, value) in &policy.extra_params {
            params.append_pair(key, value);
        }
        for (key, template) in &policy.tenant_params {
            params.append_pair(key, &template.replace("{tenant}", &tenant.id));
        }
    }

    tracing::debug!(
        tenant = %tenant.id,
        endpoint = %url.as_str().split('?').next().unwrap_or(""),
        "Built authorization URL"
    );

    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::tenant::TenantConfig;

    fn config(fhir_base_url: &str) -> OAuthConfig {
        let tenant = TenantConfig::new(
            "t1",
            "Tenant",
            "https://ehr.example.com/oauth2/authorize",
            "https://ehr.example.com/oauth2/token",
            fhir_base_url,
        );
        OAuthConfig::new(
            "abc",
            "https://app/cb",
            vec!["openid", "fhirUser"],
            tenant,
        )
    }

    fn session(verifier: Option<&str>) -> AuthorizationRequestState {
        AuthorizationRequestState {
            code_verifier: verifier.map(String::from),
            state: Some("state-1".to_string()),
            nonce: None,
            tenant: None,
            started_at: 0,
        }
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_standard_params() {
        let url = build_authorization_url(
            &config("https://ehr.example.com/fhir"),
            &session(None),
            &AuthUrlPolicy::default(),
        )
        .unwrap();
        let q = query(&url);
        assert_eq!(q["response_type"], "code");
        assert_eq!(q["client_id"], "abc");
        assert_eq!(q["redirect_uri"], "https://app/cb");
        assert_eq!(q["scope"], "openid fhirUser");
        assert_eq!(q["state"], "state-1");
        assert_eq!(q["aud"], "https://ehr.example.com/fhir");
        assert!(!q.contains_key("code_challenge"));
    }

    #[test]
    fn test_code_challenge_from_verifier() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let url = build_authorization_url(
            &config("https://f"),
            &session(Some(verifier)),
            &AuthUrlPolicy::default(),
        )
        .unwrap();
        let q = query(&url);
        assert_eq!(
            q["code_challenge"],
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
        assert_eq!(q["code_challenge_method"], "S256");
    }

    #[test]
    fn test_required_audience_missing() {
        let err = build_authorization_url(
            &config(""),
            &session(None),
            &AuthUrlPolicy::new(Audience::Required),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "missing_aud");
    }

    #[test]
    fn test_optional_audience_skipped_when_empty() {
        let url =
            build_authorization_url(&config(""), &session(None), &AuthUrlPolicy::default())
                .unwrap();
        assert!(!query(&url).contains_key("aud"));
    }

    #[test]
    fn test_omitted_audience() {
        let url = build_authorization_url(
            &config("https://f"),
            &session(None),
            &AuthUrlPolicy::new(Audience::Omit),
        )
        .unwrap();
        assert!(!query(&url).contains_key("aud"));
    }

    #[test]
    fn test_required_tenant_id() {
        let mut cfg = config("https://f");
        cfg.tenant.id = " ".to_string();
        let err = build_authorization_url(
            &cfg,
            &session(None),
            &AuthUrlPolicy::default().with_required_tenant_id(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "missing_tenant_id");
    }

    #[test]
    fn test_extra_params_and_existing_query() {
        let mut cfg = config("https://f");
        cfg.tenant.auth_url = "https://ehr.example.com/authorize?tenant=x".to_string();
        let url = build_authorization_url(
            &cfg,
            &session(None),
            &AuthUrlPolicy::default()
                .with_extra_param("launch", "patient")
                .with_tenant_param("ah-practice", "Organization/a-1.Practice-{tenant}"),
        )
        .unwrap();
        let q = query(&url);
        assert_eq!(q["tenant"], "x");
        assert_eq!(q["launch"], "patient");
        assert_eq!(q["ah-practice"], "Organization/a-1.Practice-t1");
    }

    #[test]
    fn test_invalid_auth_url() {
        let mut cfg = config("https://f");
        cfg.tenant.auth_url = "not a url".to_string();
        let err =
            build_authorization_url(&cfg, &session(None), &AuthUrlPolicy::default()).unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }
}
