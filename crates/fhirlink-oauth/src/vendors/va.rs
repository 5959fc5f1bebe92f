//! US Department of Veterans Affairs Lighthouse (patient health API).

use crate::authorize::{AuthUrlPolicy, Audience};
use crate::client::SmartClient;
use crate::context::ClientContext;
use crate::exchange::CodeExchanger;
use crate::patient::FromResponseField;
use crate::refresh::StandardRefresher;
use crate::session::SessionPolicy;

/// Session storage key.
pub const SESSION_KEY: &str = "va";

/// Requested scopes.
pub const SCOPES: &[&str] = &[
    "openid",
    "profile",
    "offline_access",
    "launch/patient",
    "patient/AllergyIntolerance.read",
    "patient/Appointment.read",
    "patient/Condition.read",
    "patient/DiagnosticReport.read",
    "patient/Immunization.read",
    "patient/Location.read",
    "patient/Medication.read",
    "patient/MedicationOrder.read",
    "patient/Observation.read",
    "patient/Organization.read",
    "patient/Patient.read",
    "patient/Practitioner.read",
    "patient/Procedure.read",
];

/// Builds the VA client.
#[must_use]
pub fn client(context: &ClientContext) -> SmartClient {
    SmartClient::new(SESSION_KEY, context)
        .with_session_policy(SessionPolicy::PKCE_WITH_STATE)
        .with_auth_url_policy(AuthUrlPolicy::new(Audience::Optional))
        .with_exchanger(CodeExchanger::pkce(context))
        .with_extractor(FromResponseField::patient())
        .with_refresher(StandardRefresher::new(context))
}
