//! Normalized token sets.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OAuthError;

/// Result of a successful exchange or refresh.
///
/// `expires_at` is absolute (Unix seconds). It is computed once, when the
/// server response is parsed, from `expires_in` plus the current time.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    /// Bearer access token.
    pub access_token: String,

    /// Absolute expiry (Unix seconds).
    pub expires_at: i64,

    /// Refresh token, when the vendor issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// OpenID Connect ID token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Patient in context. Always set by a successful callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,

    /// Granted scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Dynamically registered client id (Epic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// The unmodified token endpoint response.
    #[serde(default)]
    pub raw: Value,
}

impl TokenSet {
    /// Parses a token endpoint response.
    ///
    /// `access_token` and `expires_in` are required. `expires_in` may be a JSON
    /// number or a numeric string, since some servers send the latter.
    ///
    /// # Errors
    ///
    /// Returns `invalid_response` if a required field is missing or malformed.
    pub fn from_response(raw: Value, now: i64) -> Result<Self, OAuthError> {
        let Some(fields) = raw.as_object() else {
            return Err(OAuthError::invalid_response(
                "token response is not a JSON object",
            ));
        };

        let access_token = fields
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OAuthError::invalid_response("token response has no access_token"))?
            .to_string();

        let expires_in = fields
            .get("expires_in")
            .and_then(parse_expires_in)
            .ok_or_else(|| {
                OAuthError::invalid_response(
                    "token response has no non-negative numeric expires_in",
                )
            })?;
        let expires_at = now
            .checked_add(expires_in)
            .ok_or_else(|| OAuthError::invalid_response("expires_in is out of range"))?;

        let text = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        Ok(Self {
            access_token,
            expires_at,
            refresh_token: text("refresh_token"),
            id_token: text("id_token"),
            patient_id: None,
            scope: text("scope"),
            client_id: None,
            raw,
        })
    }

    /// Returns `true` if a refresh token is present.
    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Returns the seconds remaining until expiry at `now` (negative once expired).
    #[must_use]
    pub fn expires_in(&self, now: i64) -> i64 {
        self.expires_at - now
    }

    /// Fills fields the new token set lacks from `previous`.
    ///
    /// Servers are not required to reissue a refresh token or ID token on
    /// every refresh, and the patient in context does not change.
    pub(crate) fn carry_forward(&mut self, previous: &TokenSet) {
        if self.refresh_token.is_none() {
            self.refresh_token.clone_from(&previous.refresh_token);
        }
        if self.id_token.is_none() {
            self.id_token.clone_from(&previous.id_token);
        }
        if self.patient_id.is_none() {
            self.patient_id.clone_from(&previous.patient_id);
        }
        if self.client_id.is_none() {
            self.client_id.clone_from(&previous.client_id);
        }
    }
}

/// Seconds until expiry as sent by the server: an integer, a float (truncated)
/// or a numeric string. Negative and out-of-range values are rejected.
fn parse_expires_in(value: &Value) -> Option<i64> {
    let secs = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            // u64 above i64::MAX.
            None if n.is_u64() => return None,
            None => {
                let f = n.as_f64()?;
                if !f.is_finite() || f < 0.0 || f >= i64::MAX as f64 {
                    return None;
                }
                f as i64
            }
        },
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (secs >= 0).then_some(secs)
}

// Tokens are bearer credentials.
impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"..")
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| ".."))
            .field("id_token", &self.id_token.as_ref().map(|_| ".."))
            .field("patient_id", &self.patient_id)
            .field("scope", &self.scope)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
