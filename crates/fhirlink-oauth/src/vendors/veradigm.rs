//! Veradigm (Allscripts).
//!
//! The authorization server rejects PKCE parameters, so sessions carry only
//! a state token. The patient id is the `local_patient_id` claim inside the
//! access token JWT. No refresh.

use crate::authorize::{AuthUrlPolicy, Audience};
use crate::client::SmartClient;
use crate::context::ClientContext;
use crate::exchange::CodeExchanger;
use crate::patient::FromAccessTokenClaim;
use crate::refresh::UnsupportedRefresher;
use crate::session::SessionPolicy;

/// Session storage key.
pub const SESSION_KEY: &str = "veradigm";

/// Access token claim holding the patient id.
pub const PATIENT_CLAIM: &str = "local_patient_id";

/// Requested scopes.
pub const SCOPES: &[&str] = &[
    "openid",
    "fhirUser",
    "launch/patient",
    "patient/AllergyIntolerance.read",
    "patient/CarePlan.read",
    "patient/Condition.read",
    "patient/DiagnosticReport.read",
    "patient/DocumentReference.read",
    "patient/Encounter.read",
    "patient/Immunization.read",
    "patient/MedicationRequest.read",
    "patient/Observation.read",
    "patient/Patient.read",
    "patient/Procedure.read",
];

/// Builds the Veradigm client.
#[must_use]
pub fn client(context: &ClientContext) -> SmartClient {
    SmartClient::new(SESSION_KEY, context)
        .with_session_policy(SessionPolicy::STATE_ONLY)
        .with_auth_url_policy(AuthUrlPolicy::new(Audience::Optional))
        .with_exchanger(CodeExchanger::without_pkce(context))
        .with_extractor(FromAccessTokenClaim(PATIENT_CLAIM.to_string()))
        .with_refresher(UnsupportedRefresher::new(
            "Veradigm does not support refresh; re-run authorization",
        ))
}
