//! Locating the patient in context.
//!
//! Vendors disagree on where the patient id lives: a `patient` field in the
//! token response, a `fhirUser` reference in the ID token, or a vendor claim
//! inside the access token.

use serde_json::Value;

use crate::error::OAuthError;
use crate::jwt::{claim_str, decode_payload, last_segment};
use crate::token::TokenSet;

/// Extracts the patient id from a freshly exchanged [`TokenSet`].
pub trait PatientIdExtractor: Send + Sync {
    /// Returns the patient id.
    ///
    /// # Errors
    ///
    /// Returns `missing_patient`, `missing_claim` or `invalid_jwt` depending
    /// on the strategy.
    fn extract(&self, tokens: &TokenSet) -> Result<String, OAuthError>;
}

/// Reads a top-level field of the raw token response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromResponseField(pub String);

impl FromResponseField {
    /// The SMART launch context field, `patient`.
    #[must_use]
    pub fn patient() -> Self {
        Self("patient".to_string())
    }
}

impl PatientIdExtractor for FromResponseField {
    fn extract(&self, tokens: &TokenSet) -> Result<String, OAuthError> {
        match tokens.raw.get(&self.0) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(OAuthError::missing_patient(format!(
                "token response has no '{}' field",
                self.0
            ))),
        }
    }
}

/// Reads a claim from the ID token and keeps its last path segment, so
/// `fhirUser = "https://ehr/fhir/Patient/123"` yields `123`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromIdTokenClaim(pub String);

impl PatientIdExtractor for FromIdTokenClaim {
    fn extract(&self, tokens: &TokenSet) -> Result<String, OAuthError> {
        let id_token = tokens
            .id_token
            .as_deref()
            .ok_or_else(|| OAuthError::missing_claim(&self.0))?;
        let claims = decode_payload(id_token)?;
        let value = claim_str(&claims, &self.0).ok_or_else(|| OAuthError::missing_claim(&self.0))?;
        Ok(last_segment(&value).to_string())
    }
}

/// Reads a claim from the access token, which must then be a JWT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromAccessTokenClaim(pub String);

impl PatientIdExtractor for FromAccessTokenClaim {
    fn extract(&self, tokens: &TokenSet) -> Result<String, OAuthError> {
        let claims = decode_payload(&tokens.access_token)?;
        let value = claim_str(&claims, &self.0).ok_or_else(|| {
            OAuthError::missing_patient(format!("access token has no '{}' claim", self.0))
        })?;
        Ok(last_segment(&value).to_string())
    }
}
