//! OAuth client error types.
//!
//! Every failure produced by this crate is an [`OAuthError`]. Each variant maps
//! to a stable, machine-readable kind string (see [`OAuthError::kind`]) that
//! callers can match on without parsing messages.

use std::fmt;

/// Errors that can occur while running a SMART on FHIR authorization flow.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// The authorization server redirected back with an `error` parameter.
    #[error("Authorization server returned {error}: {description}")]
    Authorization {
        /// The OAuth error code (e.g. `access_denied`).
        error: String,
        /// The `error_description` parameter, or an empty string.
        description: String,
    },

    /// The callback `state` does not match the stored session.
    #[error("State mismatch: callback state does not match the stored session")]
    StateMismatch,

    /// The callback carries no authorization code.
    #[error("Callback is missing the authorization code")]
    MissingCode,

    /// PKCE is enabled but the stored session has no code verifier.
    #[error("Session is missing the PKCE code verifier")]
    MissingCodeVerifier,

    /// An ID token was required but the token response carried none.
    #[error("Token response is missing the id_token")]
    MissingIdToken,

    /// The ID token nonce does not match the session nonce.
    #[error("Nonce mismatch: id_token nonce does not match the stored session")]
    NonceMismatch,

    /// The patient identifier could not be located.
    #[error("Patient identifier not found: {message}")]
    MissingPatient {
        /// Where the identifier was expected.
        message: String,
    },

    /// A JWT claim needed to locate the patient is absent.
    #[error("Token is missing claim: {claim}")]
    MissingClaim {
        /// The claim name.
        claim: String,
    },

    /// A token could not be decoded as a JWT.
    #[error("Invalid JWT: {message}")]
    InvalidJwt {
        /// Description of the decoding failure.
        message: String,
    },

    /// A server response did not have the expected shape.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of what was wrong with the response.
        message: String,
    },

    /// The vendor does not support refreshing tokens in this configuration.
    #[error("Refresh is not supported: {message}")]
    RefreshNotSupported {
        /// Why refresh is unavailable.
        message: String,
    },

    /// A standard refresh was attempted without a refresh token.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// A JWT-bearer refresh was attempted without a registered client id.
    #[error("No registered client id available")]
    NoClientId,

    /// Dynamic client registration is disabled on this server (HTTP 404).
    #[error("Dynamic client registration is not supported by this server")]
    DcrNotSupported,

    /// Dynamic client registration failed with a non-404 status.
    #[error("Dynamic client registration failed (HTTP {status}): {message}")]
    DcrFailed {
        /// The HTTP status code.
        status: u16,
        /// The response body or error description.
        message: String,
    },

    /// The vendor requires an `aud` parameter but the tenant has no FHIR base URL.
    #[error("Audience required but tenant has no FHIR base URL")]
    MissingAud,

    /// The vendor requires a tenant id but the tenant has none.
    #[error("Tenant id is required for this vendor")]
    MissingTenantId,

    /// Configuration values are malformed (e.g. an unparsable URL).
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration problem.
        message: String,
    },

    /// The token endpoint returned a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// The HTTP status code.
        status: u16,
        /// The OAuth error description or response body.
        message: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("Network error: {message}")]
    Network {
        /// Description of the transport failure.
        message: String,
    },

    /// The session store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// A persisted session could not be decoded.
    #[error("Invalid session: {message}")]
    InvalidSession {
        /// Description of the decoding failure.
        message: String,
    },

    /// Signing a JWT-bearer assertion failed.
    #[error("Assertion signing failed: {message}")]
    Assertion {
        /// Description of the signing failure.
        message: String,
    },
}

impl OAuthError {
    /// Creates an `Authorization` error from callback parameters.
    #[must_use]
    pub fn authorization(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Authorization {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Creates a `MissingPatient` error.
    #[must_use]
    pub fn missing_patient(message: impl Into<String>) -> Self {
        Self::MissingPatient {
            message: message.into(),
        }
    }

    /// Creates a `MissingClaim` error.
    #[must_use]
    pub fn missing_claim(claim: impl Into<String>) -> Self {
        Self::MissingClaim {
            claim: claim.into(),
        }
    }

    /// Creates an `InvalidJwt` error.
    #[must_use]
    pub fn invalid_jwt(message: impl Into<String>) -> Self {
        Self::InvalidJwt {
            message: message.into(),
        }
    }

    /// Creates an `InvalidResponse` error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Creates a `RefreshNotSupported` error.
    #[must_use]
    pub fn refresh_not_supported(message: impl Into<String>) -> Self {
        Self::RefreshNotSupported {
            message: message.into(),
        }
    }

    /// Creates a `DcrFailed` error.
    #[must_use]
    pub fn dcr_failed(status: u16, message: impl Into<String>) -> Self {
        Self::DcrFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates an `InvalidConfig` error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an `Http` error.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Creates a `Network` error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates an `InvalidSession` error.
    #[must_use]
    pub fn invalid_session(message: impl Into<String>) -> Self {
        Self::InvalidSession {
            message: message.into(),
        }
    }

    /// Creates an `Assertion` error.
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    /// Returns the machine-readable kind of this error.
    ///
    /// For [`OAuthError::Authorization`] this is the vendor's own error code,
    /// so `error=access_denied` surfaces as kind `access_denied`.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Authorization { error, .. } => error,
            Self::StateMismatch => "state_mismatch",
            Self::MissingCode => "missing_code",
            Self::MissingCodeVerifier => "missing_code_verifier",
            Self::MissingIdToken => "missing_id_token",
            Self::NonceMismatch => "nonce_mismatch",
            Self::MissingPatient { .. } => "missing_patient",
            Self::MissingClaim { .. } => "missing_claim",
            Self::InvalidJwt { .. } => "invalid_jwt",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::RefreshNotSupported { .. } => "refresh_not_supported",
            Self::NoRefreshToken => "no_refresh_token",
            Self::NoClientId => "no_client_id",
            Self::DcrNotSupported => "dcr_not_supported",
            Self::DcrFailed { .. } => "dcr_failed",
            Self::MissingAud => "missing_aud",
            Self::MissingTenantId => "missing_tenant_id",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::Http { .. } => "http_error",
            Self::Network { .. } => "network_error",
            Self::Storage { .. } => "storage_error",
            Self::InvalidSession { .. } => "invalid_session",
            Self::Assertion { .. } => "assertion_failed",
        }
    }

    /// Returns the HTTP status for failures that carry one.
    ///
    /// Only `dcr_failed` and raw token endpoint failures (`http_error`) carry a
    /// status, for caller-side backoff decisions.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::DcrFailed { status, .. } | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authorization { .. }
            | Self::StateMismatch
            | Self::MissingCode
            | Self::MissingCodeVerifier
            | Self::NonceMismatch => ErrorCategory::Protocol,
            Self::MissingIdToken
            | Self::MissingPatient { .. }
            | Self::MissingClaim { .. }
            | Self::InvalidJwt { .. }
            | Self::InvalidResponse { .. } => ErrorCategory::Response,
            Self::RefreshNotSupported { .. }
            | Self::NoRefreshToken
            | Self::NoClientId
            | Self::DcrNotSupported
            | Self::DcrFailed { .. } => ErrorCategory::Capability,
            Self::MissingAud | Self::MissingTenantId | Self::InvalidConfig { .. } => {
                ErrorCategory::Configuration
            }
            Self::Http { .. } | Self::Network { .. } => ErrorCategory::Transport,
            Self::Storage { .. } | Self::InvalidSession { .. } => ErrorCategory::Storage,
            Self::Assertion { .. } => ErrorCategory::Signing,
        }
    }

    /// Returns `true` if re-running the full authorization flow is the only
    /// way to obtain new tokens.
    #[must_use]
    pub fn requires_reauthorization(&self) -> bool {
        matches!(
            self,
            Self::RefreshNotSupported { .. } | Self::NoRefreshToken | Self::NoClientId
        )
    }
}

/// Error categories, for logging and caller-side handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The vendor or callback violated the authorization protocol.
    Protocol,
    /// A response lacked data the flow depends on.
    Response,
    /// The vendor or token set lacks a capability.
    Capability,
    /// Caller-supplied configuration is incomplete or malformed.
    Configuration,
    /// HTTP transport failures.
    Transport,
    /// Session store failures.
    Storage,
    /// Assertion signing failures.
    Signing,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol => write!(f, "protocol"),
            Self::Response => write!(f, "response"),
            Self::Capability => write!(f, "capability"),
            Self::Configuration => write!(f, "configuration"),
            Self::Transport => write!(f, "transport"),
            Self::Storage => write!(f, "storage"),
            Self::Signing => write!(f, "signing"),
        }
    }
}

impl From<url::ParseError> for OAuthError {
    fn from(err: url::ParseError) -> Self {
        Self::invalid_config(format!("invalid URL: {err}"))
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::network(err.to_string())
    }
}
