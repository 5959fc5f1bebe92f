//! Healow (eClinicalWorks).
//!
//! Runs as a public client by default. In confidential mode, exchange and
//! refresh go through a backend proxy that adds the client secret and
//! expects JSON bodies.

use crate::authorize::{AuthUrlPolicy, Audience};
use crate::client::SmartClient;
use crate::context::ClientContext;
use crate::exchange::{CodeExchanger, ProxyEndpoint};
use crate::patient::FromResponseField;
use crate::refresh::{StandardRefresher, UnsupportedRefresher};
use crate::session::SessionPolicy;

/// Session storage key.
pub const SESSION_KEY: &str = "healow";

/// Requested scopes.
pub const SCOPES: &[&str] = &[
    "openid",
    "fhirUser",
    "launch/patient",
    "offline_access",
    "patient/AllergyIntolerance.read",
    "patient/CarePlan.read",
    "patient/CareTeam.read",
    "patient/Condition.read",
    "patient/Device.read",
    "patient/DiagnosticReport.read",
    "patient/DocumentReference.read",
    "patient/Encounter.read",
    "patient/Goal.read",
    "patient/Immunization.read",
    "patient/Medication.read",
    "patient/MedicationRequest.read",
    "patient/Observation.read",
    "patient/Patient.read",
    "patient/Procedure.read",
];

/// Client mode.
#[derive(Debug, Clone, Default)]
pub enum HealowMode {
    /// Browser-only public client: direct PKCE exchange, no refresh.
    #[default]
    Public,
    /// Confidential client behind a proxy holding the secret.
    Confidential(ProxyEndpoint),
}

/// Builds the Healow client.
#[must_use]
pub fn client(context: &ClientContext, mode: HealowMode) -> SmartClient {
    let client = SmartClient::new(SESSION_KEY, context)
        .with_session_policy(SessionPolicy::PKCE_WITH_STATE)
        .with_auth_url_policy(AuthUrlPolicy::new(Audience::Required))
        .with_extractor(FromResponseField::patient());

    match mode {
        HealowMode::Public => client
            .with_exchanger(CodeExchanger::pkce(context))
            .with_refresher(UnsupportedRefresher::new(
                "Healow public clients cannot refresh; re-run authorization",
            )),
        HealowMode::Confidential(proxy) => {
            let proxy = proxy.with_json_body();
            client
                .with_exchanger(CodeExchanger::proxy(context, proxy.clone()))
                .with_refresher(StandardRefresher::proxy(context, proxy))
        }
    }
}
