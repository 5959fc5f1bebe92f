//! Client configuration.
//!
//! Deserializable from any serde source. The `fhirlink` CLI loads it from a
//! TOML file with `FHIRLINK__`-prefixed environment overrides.
//!
//! # Example (TOML)
//!
//! ```toml
//! [http]
//! request_timeout = "30s"
//!
//! [tokens]
//! expiry_buffer = "60s"
//!
//! [vendors.epic]
//! client_id = "my-epic-client"
//! redirect_uri = "http://localhost:8765/callback"
//!
//! [[tenants]]
//! vendor = "epic"
//! id = "sandbox"
//! name = "Epic Sandbox"
//! auth_url = "https://fhir.epic.com/interconnect-fhir-oauth/oauth2/authorize"
//! token_url = "https://fhir.epic.com/interconnect-fhir-oauth/oauth2/token"
//! fhir_base_url = "https://fhir.epic.com/interconnect-fhir-oauth/api/FHIR/R4"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::context::{DEFAULT_REQUEST_TIMEOUT, build_http_client};
use crate::error::OAuthError;
use crate::tenant::{OAuthConfig, TenantConfig};
use crate::vendors::Vendor;

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FhirlinkConfig {
    /// Outbound HTTP settings.
    pub http: HttpSettings,

    /// Token lifetime handling.
    pub tokens: TokenSettings,

    /// Pending session handling.
    pub sessions: SessionSettings,

    /// Per-vendor client registration, keyed by vendor name.
    pub vendors: BTreeMap<String, VendorSettings>,

    /// Known tenants.
    pub tenants: Vec<TenantSettings>,
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Timeout for token, refresh and registration requests.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// `User-Agent` header.
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: Some(concat!("fhirlink/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

impl HttpSettings {
    /// Builds an HTTP client from these settings.
    ///
    /// # Errors
    ///
    /// Returns `invalid_config` if the client cannot be built.
    pub fn build_client(&self) -> Result<reqwest::Client, OAuthError> {
        build_http_client(self.request_timeout, self.user_agent.as_deref())
    }
}

/// Token lifetime handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Tokens expiring within this window are treated as expired.
    #[serde(with = "humantime_serde")]
    pub expiry_buffer: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            expiry_buffer: Duration::from_secs(60),
        }
    }
}

/// Pending session handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Sessions older than this are discarded on callback.
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(600),
        }
    }
}

/// Client registration with one vendor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorSettings {
    /// OAuth client id.
    pub client_id: String,

    /// Redirect URI registered with the vendor.
    pub redirect_uri: String,

    /// Overrides the vendor's default scope list.
    pub scopes: Option<Vec<String>>,

    /// Token proxy URL; `{tenant}` is replaced by the tenant id.
    pub proxy_token_url: Option<String>,

    /// Dynamic client registration proxy URL (Epic).
    pub proxy_register_url: Option<String>,

    /// Use the confidential (proxied) client mode where the vendor has one.
    pub confidential: bool,

    /// Software id sent with dynamic client registration (Epic). Defaults to
    /// the client id.
    pub software_id: Option<String>,

    /// PEM private key used to sign JWT-bearer assertions (Epic).
    pub signing_key: Option<PathBuf>,

    /// Key id of `signing_key`.
    pub signing_key_id: Option<String>,
}

impl VendorSettings {
    /// The software id for dynamic client registration.
    #[must_use]
    pub fn software_id(&self) -> &str {
        self.software_id.as_deref().unwrap_or(&self.client_id)
    }
}

/// A tenant entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    /// Vendor the tenant belongs to.
    pub vendor: String,
    /// Tenant identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Authorization endpoint.
    pub auth_url: String,
    /// Token endpoint.
    pub token_url: String,
    /// FHIR base URL.
    #[serde(default)]
    pub fhir_base_url: String,
    /// FHIR version.
    #[serde(default = "default_fhir_version")]
    pub fhir_version: String,
}

fn default_fhir_version() -> String {
    "R4".to_string()
}

impl TenantSettings {
    /// Converts to a [`TenantConfig`].
    #[must_use]
    pub fn to_tenant(&self) -> TenantConfig {
        TenantConfig::new(
            &self.id,
            &self.name,
            &self.auth_url,
            &self.token_url,
            &self.fhir_base_url,
        )
        .with_fhir_version(&self.fhir_version)
    }
}

impl FhirlinkConfig {
    /// Settings for `vendor`, if configured.
    #[must_use]
    pub fn vendor(&self, vendor: Vendor) -> Option<&VendorSettings> {
        self.vendors.get(vendor.as_str())
    }

    /// Tenants configured for `vendor`.
    pub fn tenants_for(&self, vendor: Vendor) -> impl Iterator<Item = &TenantSettings> {
        self.tenants
            .iter()
            .filter(move |t| t.vendor.parse::<Vendor>().is_ok_and(|v| v == vendor))
    }

    /// Looks up a tenant by vendor and id.
    #[must_use]
    pub fn tenant(&self, vendor: Vendor, id: &str) -> Option<TenantConfig> {
        self.tenants_for(vendor)
            .find(|t| t.id == id)
            .map(TenantSettings::to_tenant)
    }

    /// Builds the per-attempt configuration for a vendor tenant.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the vendor or tenant is not configured.
    pub fn oauth_config(&self, vendor: Vendor, tenant_id: &str) -> Result<OAuthConfig, ConfigError> {
        let settings = self
            .vendor(vendor)
            .ok_or_else(|| ConfigError::Missing(format!("vendors.{vendor}")))?;
        let tenant = self
            .tenant(vendor, tenant_id)
            .ok_or_else(|| ConfigError::Missing(format!("tenant '{tenant_id}' for {vendor}")))?;

        let scopes = match &settings.scopes {
            Some(scopes) => scopes.clone(),
            None => vendor.scopes().iter().map(|s| (*s).to_string()).collect(),
        };

        Ok(OAuthConfig::new(
            &settings.client_id,
            &settings.redirect_uri,
            scopes,
            tenant,
        ))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` or `ConfigError::Missing` if:
    /// - the request timeout is zero
    /// - a vendor key or tenant vendor is not a known vendor
    /// - a vendor has no client id or an unparsable redirect URI
    /// - a proxy URL cannot be parsed
    /// - confidential Healow has no token proxy
    /// - a tenant has unparsable URLs or duplicates another tenant's id
    /// - an Athena tenant has no id
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "http.request_timeout must be > 0".to_string(),
            ));
        }

        for (name, settings) in &self.vendors {
            let vendor = parse_vendor(name, "vendors")?;

            if settings.client_id.trim().is_empty() {
                return Err(ConfigError::Missing(format!("vendors.{name}.client_id")));
            }
            check_url(&settings.redirect_uri, &format!("vendors.{name}.redirect_uri"))?;

            if let Some(url) = &settings.proxy_token_url {
                check_url(
                    &url.replace("{tenant}", "tenant"),
                    &format!("vendors.{name}.proxy_token_url"),
                )?;
            }
            if let Some(url) = &settings.proxy_register_url {
                check_url(url, &format!("vendors.{name}.proxy_register_url"))?;
            }
            if vendor == Vendor::Healow && settings.confidential && settings.proxy_token_url.is_none()
            {
                return Err(ConfigError::Missing(format!(
                    "vendors.{name}.proxy_token_url (required when confidential = true)"
                )));
            }
            if settings.signing_key.is_some() && settings.signing_key_id.is_none() {
                return Err(ConfigError::Missing(format!(
                    "vendors.{name}.signing_key_id (required with signing_key)"
                )));
            }
        }

        let mut seen = HashSet::new();
        for tenant in &self.tenants {
            let vendor = parse_vendor(&tenant.vendor, "tenants[].vendor")?;
            let label = format!("tenants[{}/{}]", tenant.vendor, tenant.id);

            if tenant.id.trim().is_empty() {
                if vendor == Vendor::Athena {
                    return Err(ConfigError::Missing(format!(
                        "{label}.id (the Athena practice id)"
                    )));
                }
                return Err(ConfigError::Missing(format!("{label}.id")));
            }
            if !seen.insert((vendor, tenant.id.as_str())) {
                return Err(ConfigError::InvalidValue(format!("{label} is defined twice")));
            }

            check_url(&tenant.auth_url, &format!("{label}.auth_url"))?;
            check_url(&tenant.token_url, &format!("{label}.token_url"))?;
            if !tenant.fhir_base_url.is_empty() {
                check_url(&tenant.fhir_base_url, &format!("{label}.fhir_base_url"))?;
            }
        }

        Ok(())
    }
}

fn parse_vendor(name: &str, field: &str) -> Result<Vendor, ConfigError> {
    name.parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{field}: unknown vendor '{name}'")))
}

fn check_url(value: &str, field: &str) -> Result<(), ConfigError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue(format!("{field} is not a valid URL: {e}")))
}
