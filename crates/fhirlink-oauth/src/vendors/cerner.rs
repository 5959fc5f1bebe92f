//! Oracle Health (Cerner) Millennium.
//!
//! Issues refresh tokens when `offline_access` is granted. Token sets without
//! one cannot be refreshed.

use std::sync::Arc;

use crate::authorize::{AuthUrlPolicy, Audience};
use crate::client::SmartClient;
use crate::context::ClientContext;
use crate::exchange::CodeExchanger;
use crate::patient::FromResponseField;
use crate::refresh::{ConditionalRefresher, StandardRefresher, UnsupportedRefresher};
use crate::session::SessionPolicy;
use crate::token::TokenSet;

/// Session storage key.
pub const SESSION_KEY: &str = "cerner";

/// Requested scopes.
pub const SCOPES: &[&str] = &[
    "openid",
    "fhirUser",
    "launch/patient",
    "offline_access",
    "patient/AllergyIntolerance.read",
    "patient/Appointment.read",
    "patient/Binary.read",
    "patient/CarePlan.read",
    "patient/CareTeam.read",
    "patient/Condition.read",
    "patient/Consent.read",
    "patient/Coverage.read",
    "patient/Device.read",
    "patient/DiagnosticReport.read",
    "patient/DocumentReference.read",
    "patient/Encounter.read",
    "patient/FamilyMemberHistory.read",
    "patient/Goal.read",
    "patient/Immunization.read",
    "patient/InsurancePlan.read",
    "patient/Location.read",
    "patient/Media.read",
    "patient/MedicationAdministration.read",
    "patient/MedicationDispense.read",
    "patient/MedicationRequest.read",
    "patient/NutritionOrder.read",
    "patient/Observation.read",
    "patient/Organization.read",
    "patient/Patient.read",
    "patient/Person.read",
    "patient/Practitioner.read",
    "patient/Procedure.read",
    "patient/Provenance.read",
    "patient/Questionnaire.read",
    "patient/QuestionnaireResponse.read",
    "patient/RelatedPerson.read",
    "patient/ServiceRequest.read",
    "patient/Specimen.read",
];

/// Builds the Cerner client.
#[must_use]
pub fn client(context: &ClientContext) -> SmartClient {
    SmartClient::new(SESSION_KEY, context)
        .with_session_policy(SessionPolicy::PKCE_WITH_STATE)
        .with_auth_url_policy(AuthUrlPolicy::new(Audience::Optional))
        .with_exchanger(CodeExchanger::pkce(context))
        .with_extractor(FromResponseField::patient())
        .with_refresher(ConditionalRefresher::new(
            TokenSet::has_refresh_token,
            Arc::new(StandardRefresher::new(context)),
            Arc::new(UnsupportedRefresher::new(
                "Cerner issued no refresh token; offline_access was not granted",
            )),
        ))
}
