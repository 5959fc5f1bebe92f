//! athenahealth.
//!
//! Requires the practice id both as the tenant id and as an `ah-practice`
//! authorization parameter. The patient comes from the ID token's `fhirUser`
//! claim, so sessions carry a nonce that the ID token must echo.

use crate::authorize::{AuthUrlPolicy, Audience};
use crate::client::SmartClient;
use crate::context::ClientContext;
use crate::exchange::CodeExchanger;
use crate::patient::FromIdTokenClaim;
use crate::refresh::StandardRefresher;
use crate::session::SessionPolicy;

/// Session storage key.
pub const SESSION_KEY: &str = "athena";

/// Authorization parameter naming the practice.
pub const PRACTICE_PARAM: &str = "ah-practice";

/// Template for [`PRACTICE_PARAM`]; `{tenant}` is the practice id.
pub const PRACTICE_TEMPLATE: &str = "Organization/a-1.Practice-{tenant}";

/// Requested scopes.
pub const SCOPES: &[&str] = &[
    "openid",
    "fhirUser",
    "offline_access",
    "launch/patient",
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
    "patient/Provenance.read",
];

/// Builds the Athena client.
#[must_use]
pub fn client(context: &ClientContext) -> SmartClient {
    SmartClient::new(SESSION_KEY, context)
        .with_session_policy(SessionPolicy::PKCE_WITH_STATE.with_nonce())
        .with_auth_url_policy(
            AuthUrlPolicy::new(Audience::Required)
                .with_required_tenant_id()
                .with_tenant_param(PRACTICE_PARAM, PRACTICE_TEMPLATE),
        )
        .with_exchanger(CodeExchanger::pkce(context))
        .with_extractor(FromIdTokenClaim("fhirUser".to_string()))
        .with_refresher(StandardRefresher::new(context))
}
