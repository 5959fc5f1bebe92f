//! Epic dynamic client registration.
//!
//! After a patient authorizes the app, Epic lets the client register a
//! per-device client identity by POSTing a public key with the patient's
//! access token. The registered client then refreshes with signed
//! assertions instead of refresh tokens (see
//! [`crate::refresh::JwtBearerRefresher`]).

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::context::ClientContext;
use crate::error::OAuthError;
use crate::jwt::{Jwk, Jwks};

/// Matches the FHIR API suffix of an Epic base URL, e.g. `/api/FHIR/R4/`.
static FHIR_API_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/api/FHIR/(DSTU2|R4)(/.*)?$").expect("Invalid FHIR API suffix regex")
});

/// Registration request body.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRequest {
    /// The app's software id (its original client id).
    pub software_id: String,
    /// Public key of the new client identity.
    pub jwks: Jwks,
}

/// A successful registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredClient {
    /// The client id assigned to this device.
    pub client_id: String,
    /// The unmodified registration response.
    pub raw: Value,
}

/// Performs dynamic client registration against an Epic organization.
#[derive(Debug, Clone)]
pub struct DynamicRegistration {
    context: ClientContext,
    proxy_url: Option<String>,
}

impl DynamicRegistration {
    /// Registers directly with the organization's OAuth server.
    #[must_use]
    pub fn new(context: &ClientContext) -> Self {
        Self {
            context: context.clone(),
            proxy_url: None,
        }
    }

    /// Registers through a proxy at `url` instead.
    #[must_use]
    pub fn with_proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    /// Derives the OAuth base from a FHIR base URL by stripping the
    /// `/api/FHIR/{DSTU2|R4}/...` suffix.
    #[must_use]
    pub fn oauth_base(fhir_base_url: &str) -> String {
        FHIR_API_SUFFIX
            .replace(fhir_base_url.trim_end_matches('/'), "")
            .trim_end_matches('/')
            .to_string()
    }

    /// Returns the URL the registration is POSTed to.
    #[must_use]
    pub fn registration_url(&self, fhir_base_url: &str) -> String {
        match &self.proxy_url {
            Some(url) => url.clone(),
            None => format!("{}/oauth2/register", Self::oauth_base(fhir_base_url)),
        }
    }

    /// Registers `jwk` under `software_id`, authenticated by the patient's
    /// `access_token`.
    ///
    /// # Errors
    ///
    /// - `dcr_not_supported` if the server answers 404
    /// - `dcr_failed` with the status for any other non-2xx response
    /// - `invalid_response` if the response has no `client_id`
    /// - `network_error` if the request cannot be sent
    pub async fn register(
        &self,
        access_token: &str,
        fhir_base_url: &str,
        software_id: &str,
        jwk: Jwk,
    ) -> Result<RegisteredClient, OAuthError> {
        let url = self.registration_url(fhir_base_url);
        let request = RegistrationRequest {
            software_id: software_id.to_string(),
            jwks: Jwks::single(jwk),
        };

        tracing::debug!(
            proxied = self.proxy_url.is_some(),
            software_id = %software_id,
            "Registering dynamic client"
        );

        let response = self
            .context
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!("Dynamic client registration is not enabled on this server");
            return Err(OAuthError::DcrNotSupported);
        }

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Dynamic client registration failed");
            return Err(OAuthError::dcr_failed(status.as_u16(), body));
        }

        let raw: Value = serde_json::from_str(&body).map_err(|e| {
            OAuthError::invalid_response(format!("registration response is not JSON: {e}"))
        })?;
        let client_id = raw
            .get("client_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OAuthError::invalid_response("registration response has no client_id"))?
            .to_string();

        tracing::info!(client_id = %client_id, "Dynamic client registered");

        Ok(RegisteredClient { client_id, raw })
    }
}
