//! Tenant and per-attempt OAuth configuration.

use serde::{Deserialize, Serialize};

/// One healthcare organization's authorization/token/FHIR endpoint triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    /// Tenant identifier (for Athena, the practice id).
    pub id: String,

    /// Human-readable organization name.
    pub name: String,

    /// Authorization endpoint.
    pub auth_url: String,

    /// Token endpoint.
    pub token_url: String,

    /// FHIR base URL, also used as the `aud` parameter.
    pub fhir_base_url: String,

    /// FHIR version served at the base URL (e.g. "R4", "DSTU2").
    #[serde(default = "default_fhir_version")]
    pub fhir_version: String,
}

fn default_fhir_version() -> String {
    "R4".to_string()
}

impl TenantConfig {
    /// Creates a tenant with the default FHIR version (R4).
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        fhir_base_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            fhir_base_url: fhir_base_url.into(),
            fhir_version: default_fhir_version(),
        }
    }

    /// Sets the FHIR version.
    #[must_use]
    pub fn with_fhir_version(mut self, version: impl Into<String>) -> Self {
        self.fhir_version = version.into();
        self
    }
}

/// Configuration for a single authorization attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    /// OAuth client id.
    pub client_id: String,

    /// Redirect URI registered with the vendor.
    pub redirect_uri: String,

    /// Requested scopes, space-joined in the authorization URL.
    pub scopes: Vec<String>,

    /// The tenant being authorized against.
    pub tenant: TenantConfig,
}

impl OAuthConfig {
    /// Creates a configuration.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<impl Into<String>>,
        tenant: TenantConfig,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
            tenant,
        }
    }

    /// Returns the scopes joined with spaces.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_serde_camel_case_and_default_version() {
        let json = r#"{
            "id": "t1",
            "name": "General Hospital",
            "authUrl": "https://ehr.example.com/authorize",
            "tokenUrl": "https://ehr.example.com/token",
            "fhirBaseUrl": "https://ehr.example.com/fhir"
        }"#;
        let tenant: TenantConfig = serde_json::from_str(json).unwrap();
        assert_eq!(tenant.fhir_version, "R4");
        assert_eq!(tenant.token_url, "https://ehr.example.com/token");
    }

    #[test]
    fn test_scope_string() {
        let tenant = TenantConfig::new("t", "T", "https://a", "https://t", "https://f");
        let config = OAuthConfig::new("abc", "https://app/cb", vec!["openid", "fhirUser"], tenant);
        assert_eq!(config.scope_string(), "openid fhirUser");
    }
}
