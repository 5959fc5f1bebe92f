//! Token endpoint POSTs shared by exchange and refresh.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::OAuthError;

/// Request body encoding for token endpoint calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    /// `application/x-www-form-urlencoded`.
    #[default]
    Form,
    /// `application/json`, used by proxies fronting confidential clients.
    Json,
}

/// OAuth error response body (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// POSTs grant parameters to a token endpoint and returns the JSON response.
///
/// # Errors
///
/// - `http_error` for non-2xx responses, carrying the status and the
///   vendor's `error`/`error_description` when the body has them
/// - `invalid_response` when a 2xx body is not JSON
/// - `network_error` when the request cannot be sent or read
pub(crate) async fn post_token_request(
    http: &reqwest::Client,
    url: &str,
    params: &[(&str, &str)],
    encoding: BodyEncoding,
) -> Result<Value, OAuthError> {
    let request = http.post(url).header(reqwest::header::ACCEPT, "application/json");
    let request = match encoding {
        BodyEncoding::Form => request.form(params),
        BodyEncoding::Json => {
            let body: Map<String, Value> = params
                .iter()
                .map(|(k, v)| ((*k).to_string(), Value::String((*v).to_string())))
                .collect();
            request.json(&body)
        }
    };

    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "Token endpoint returned an error");

        if let Ok(oauth_error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
            let message = match oauth_error.error_description {
                Some(description) if !description.is_empty() => {
                    format!("{}: {description}", oauth_error.error)
                }
                _ => oauth_error.error,
            };
            return Err(OAuthError::http(status.as_u16(), message));
        }

        return Err(OAuthError::http(status.as_u16(), body));
    }

    serde_json::from_str(&body)
        .map_err(|e| OAuthError::invalid_response(format!("token response is not JSON: {e}")))
}
