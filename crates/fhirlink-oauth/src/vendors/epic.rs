//! Epic (MyChart).
//!
//! Public PKCE client with a mandatory `aud`. Epic does not issue refresh
//! tokens to public clients; long-lived access comes from dynamic client
//! registration followed by JWT-bearer refresh.

use std::fmt;
use std::sync::Arc;

use crate::authorize::{AuthUrlPolicy, Audience};
use crate::client::SmartClient;
use crate::context::ClientContext;
use crate::exchange::CodeExchanger;
use crate::jwt::AssertionSigner;
use crate::patient::FromResponseField;
use crate::refresh::{
    ConditionalRefresher, JwtBearerRefresher, TokenRefresher, UnsupportedRefresher,
};
use crate::registration::DynamicRegistration;
use crate::session::SessionPolicy;

/// Session storage key.
pub const SESSION_KEY: &str = "epic";

/// Requested scopes.
pub const SCOPES: &[&str] = &[
    "openid",
    "fhirUser",
    "launch/patient",
    "patient/AllergyIntolerance.read",
    "patient/Binary.read",
    "patient/CarePlan.read",
    "patient/CareTeam.read",
    "patient/Condition.read",
    "patient/Device.read",
    "patient/DiagnosticReport.read",
    "patient/DocumentReference.read",
    "patient/Encounter.read",
    "patient/Goal.read",
    "patient/Immunization.read",
    "patient/Location.read",
    "patient/Medication.read",
    "patient/MedicationRequest.read",
    "patient/Observation.read",
    "patient/Organization.read",
    "patient/Patient.read",
    "patient/Practitioner.read",
    "patient/Procedure.read",
    "patient/Provenance.read",
];

/// Epic client options.
#[derive(Clone, Default)]
pub struct EpicOptions {
    /// Signs JWT-bearer assertions for a dynamically registered client.
    /// Without it, refresh is unsupported even after registration.
    pub signer: Option<Arc<dyn AssertionSigner>>,
}

impl fmt::Debug for EpicOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpicOptions")
            .field("signer", &self.signer.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Builds the Epic client.
#[must_use]
pub fn client(context: &ClientContext, options: EpicOptions) -> SmartClient {
    let registered: Arc<dyn TokenRefresher> = match options.signer {
        Some(signer) => Arc::new(JwtBearerRefresher::new(context, signer)),
        None => Arc::new(UnsupportedRefresher::new(
            "no signing key is configured for the registered Epic client",
        )),
    };
    let unregistered = Arc::new(UnsupportedRefresher::new(
        "Epic issues no refresh token to public clients; register a dynamic client first",
    ));

    SmartClient::new(SESSION_KEY, context)
        .with_session_policy(SessionPolicy::PKCE_WITH_STATE)
        .with_auth_url_policy(AuthUrlPolicy::new(Audience::Required))
        .with_exchanger(CodeExchanger::pkce(context))
        .with_extractor(FromResponseField::patient())
        .with_refresher(ConditionalRefresher::new(
            |tokens| tokens.client_id.is_some(),
            registered,
            unregistered,
        ))
}

/// Builds the dynamic client registration helper, optionally routed through
/// a proxy.
#[must_use]
pub fn registration(context: &ClientContext, proxy_url: Option<&str>) -> DynamicRegistration {
    let registration = DynamicRegistration::new(context);
    match proxy_url {
        Some(url) => registration.with_proxy(url),
        None => registration,
    }
}
