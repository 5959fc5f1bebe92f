//! # fhirlink-oauth
//!
//! Multi-vendor SMART on FHIR OAuth client framework.
//!
//! This crate provides:
//! - One authorization-code flow (with optional PKCE) shared by every vendor
//! - Pluggable policies for URL building, code exchange, patient-id lookup and refresh
//! - Vendor configurations for Epic, Cerner, Veradigm, Healow, VA, OnPatient and Athena
//! - Session persistence across the authorization redirect
//! - Epic dynamic client registration and JWT-bearer refresh
//!
//! ## Overview
//!
//! A [`SmartClient`] is assembled from one policy per axis. Vendor modules
//! under [`vendors`] pick the policies; callers see the same contract for all
//! of them:
//!
//! ```no_run
//! use fhirlink_oauth::prelude::*;
//!
//! # async fn run(config: OAuthConfig, callback_url: &str) -> OAuthResult<()> {
//! let context = ClientContext::system()?;
//! let client = vendors::epic::client(&context, vendors::epic::EpicOptions::default());
//! let sessions = SessionPersistence::new(MemorySessionStore::new(), context.clock.clone());
//!
//! let start = client.initiate_auth(&config)?;
//! sessions.save(client.session_key(), &start.session).await?;
//! // ... send the user to start.url, wait for the redirect ...
//!
//! let session = sessions.take(client.session_key()).await?;
//! let params = CallbackParams::from_url(callback_url)?;
//! let tokens = client.handle_callback(&params, &config, session.as_ref()).await?;
//! assert!(tokens.patient_id.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`session`] - Per-attempt PKCE verifier, state and nonce
//! - [`authorize`] - Authorization URL construction
//! - [`exchange`] - Authorization code exchange
//! - [`patient`] - Patient id extraction
//! - [`refresh`] - Token refresh strategies
//! - [`client`] - The composed client
//! - [`storage`] - Session persistence
//! - [`registration`] - Epic dynamic client registration
//! - [`vendors`] - Vendor configurations
//! - [`config`] - Deserializable client configuration

pub mod authorize;
pub mod client;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod exchange;
pub mod jwt;
pub mod patient;
pub mod pkce;
pub mod random;
pub mod refresh;
pub mod registration;
pub mod session;
pub mod storage;
pub mod tenant;
pub mod token;
pub mod transport;
pub mod vendors;

pub use authorize::{Audience, AuthUrlPolicy, build_authorization_url};
pub use client::{AuthorizationStart, CallbackParams, DEFAULT_EXPIRY_BUFFER, SmartClient};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, FhirlinkConfig, VendorSettings};
pub use context::ClientContext;
pub use error::{ErrorCategory, OAuthError};
pub use exchange::{CodeExchanger, ProxyEndpoint, TokenExchanger};
pub use jwt::{AssertionClaims, AssertionSigner, Jwk, Jwks, SigningAlgorithm, SigningKeyPair};
pub use patient::{FromAccessTokenClaim, FromIdTokenClaim, FromResponseField, PatientIdExtractor};
pub use random::{OsRandom, RandomSource, SequenceRandom};
pub use refresh::{
    ConditionalRefresher, JwtBearerRefresher, StandardRefresher, TokenRefresher,
    UnsupportedRefresher,
};
pub use registration::{DynamicRegistration, RegisteredClient};
pub use session::{AuthorizationRequestState, SessionGenerator, SessionPolicy};
pub use storage::{FileSessionStore, MemorySessionStore, SessionPersistence, SessionStore};
pub use tenant::{OAuthConfig, TenantConfig};
pub use token::TokenSet;
pub use vendors::Vendor;

/// Type alias for OAuth client results.
pub type OAuthResult<T> = Result<T, OAuthError>;

/// Prelude module for convenient imports.
///
/// ```
/// use fhirlink_oauth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::OAuthResult;
    pub use crate::client::{AuthorizationStart, CallbackParams, SmartClient};
    pub use crate::context::ClientContext;
    pub use crate::error::{ErrorCategory, OAuthError};
    pub use crate::session::AuthorizationRequestState;
    pub use crate::storage::{
        FileSessionStore, MemorySessionStore, SessionPersistence, SessionStore,
    };
    pub use crate::tenant::{OAuthConfig, TenantConfig};
    pub use crate::token::TokenSet;
    pub use crate::vendors::{self, Vendor};
}
