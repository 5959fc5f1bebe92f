//! Vendor policy modules.
//!
//! Each vendor is a function that picks one policy per axis and returns a
//! [`SmartClient`]. The table below summarizes the choices:
//!
//! | Vendor | PKCE | `aud` | Exchange | Patient id | Refresh |
//! |---|---|---|---|---|---|
//! | Epic | yes | required | direct | `patient` field | JWT-bearer once registered |
//! | Cerner | yes | optional | direct | `patient` field | refresh token when issued |
//! | Veradigm | no | optional | direct | `local_patient_id` access token claim | none |
//! | Healow | yes | required | direct or proxy (JSON) | `patient` field | proxy only |
//! | VA | yes | optional | direct | `patient` field | refresh token |
//! | OnPatient | yes | omitted | direct or proxy | `patient` field | proxy only |
//! | Athena | yes | required + practice | direct | `fhirUser` ID token claim | refresh token |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::SmartClient;
use crate::config::VendorSettings;
use crate::context::ClientContext;
use crate::error::OAuthError;
use crate::exchange::ProxyEndpoint;
use crate::jwt::AssertionSigner;

pub mod athena;
pub mod cerner;
pub mod epic;
pub mod healow;
pub mod onpatient;
pub mod va;
pub mod veradigm;

/// Supported EHR vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Epic (MyChart).
    Epic,
    /// Oracle Health (Cerner).
    Cerner,
    /// Veradigm (Allscripts).
    Veradigm,
    /// Healow (eClinicalWorks).
    Healow,
    /// US Department of Veterans Affairs Lighthouse.
    Va,
    /// OnPatient (DrChrono).
    OnPatient,
    /// athenahealth.
    Athena,
}

impl Vendor {
    /// All vendors, in display order.
    pub const ALL: [Vendor; 7] = [
        Self::Epic,
        Self::Cerner,
        Self::Veradigm,
        Self::Healow,
        Self::Va,
        Self::OnPatient,
        Self::Athena,
    ];

    /// Lowercase identifier, also used in configuration keys.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Cerner => "cerner",
            Self::Veradigm => "veradigm",
            Self::Healow => "healow",
            Self::Va => "va",
            Self::OnPatient => "onpatient",
            Self::Athena => "athena",
        }
    }

    /// Key under which pending sessions for this vendor are stored.
    #[must_use]
    pub fn session_key(&self) -> &'static str {
        match self {
            Self::Epic => epic::SESSION_KEY,
            Self::Cerner => cerner::SESSION_KEY,
            Self::Veradigm => veradigm::SESSION_KEY,
            Self::Healow => healow::SESSION_KEY,
            Self::Va => va::SESSION_KEY,
            Self::OnPatient => onpatient::SESSION_KEY,
            Self::Athena => athena::SESSION_KEY,
        }
    }

    /// The vendor's default scope list.
    #[must_use]
    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            Self::Epic => epic::SCOPES,
            Self::Cerner => cerner::SCOPES,
            Self::Veradigm => veradigm::SCOPES,
            Self::Healow => healow::SCOPES,
            Self::Va => va::SCOPES,
            Self::OnPatient => onpatient::SCOPES,
            Self::Athena => athena::SCOPES,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == normalized)
            .ok_or_else(|| OAuthError::invalid_config(format!("unknown vendor '{s}'")))
    }
}

/// Builds the client for `vendor` from configuration.
///
/// `signer` is only used by Epic, for JWT-bearer refresh of registered clients.
///
/// # Errors
///
/// Returns `invalid_config` if the settings select a mode that needs a value
/// they do not provide (e.g. confidential Healow without a proxy URL).
pub fn build_client(
    vendor: Vendor,
    context: &ClientContext,
    settings: &VendorSettings,
    signer: Option<Arc<dyn AssertionSigner>>,
) -> Result<SmartClient, OAuthError> {
    let proxy = settings.proxy_token_url.as_deref().map(ProxyEndpoint::templated);

    let client = match vendor {
        Vendor::Epic => epic::client(context, epic::EpicOptions { signer }),
        Vendor::Cerner => cerner::client(context),
        Vendor::Veradigm => veradigm::client(context),
        Vendor::Healow => {
            let mode = if settings.confidential {
                let proxy = proxy.ok_or_else(|| {
                    OAuthError::invalid_config("confidential Healow requires proxy_token_url")
                })?;
                healow::HealowMode::Confidential(proxy)
            } else {
                healow::HealowMode::Public
            };
            healow::client(context, mode)
        }
        Vendor::Va => va::client(context),
        Vendor::OnPatient => {
            onpatient::client(context, onpatient::OnPatientOptions { backend: proxy })
        }
        Vendor::Athena => athena::client(context),
    };

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_parse_and_display() {
        for vendor in Vendor::ALL {
            assert_eq!(vendor.to_string().parse::<Vendor>().unwrap(), vendor);
        }
        assert_eq!("On-Patient".parse::<Vendor>().unwrap(), Vendor::OnPatient);
        assert_eq!(" EPIC ".parse::<Vendor>().unwrap(), Vendor::Epic);
        assert_eq!("nope".parse::<Vendor>().unwrap_err().kind(), "invalid_config");
    }

    #[test]
    fn test_session_keys_are_distinct() {
        let mut keys: Vec<_> = Vendor::ALL.iter().map(Vendor::session_key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), Vendor::ALL.len());
    }

    #[test]
    fn test_scopes_request_openid_context() {
        for vendor in Vendor::ALL {
            let scopes = vendor.scopes();
            assert!(scopes.contains(&"launch/patient"), "{vendor}");
            assert!(scopes.iter().any(|s| s.starts_with("patient/")), "{vendor}");
        }
    }

    #[test]
    fn test_confidential_healow_requires_proxy() {
        let context = ClientContext::system().unwrap();
        let settings = VendorSettings {
            confidential: true,
            ..VendorSettings::default()
        };
        let err = build_client(Vendor::Healow, &context, &settings, None).unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }
}
