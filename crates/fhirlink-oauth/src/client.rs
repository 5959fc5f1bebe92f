//! The vendor-agnostic SMART client.
//!
//! A [`SmartClient`] binds one policy per axis (session material,
//! authorization URL, exchange, patient extraction, refresh) and exposes the
//! same contract for every vendor. Vendor modules in [`crate::vendors`] are
//! just functions that pick those policies.
//!
//! The client persists nothing. Callers save the session returned by
//! [`SmartClient::initiate_auth`] before navigating away and hand it back to
//! [`SmartClient::handle_callback`]; see [`crate::storage::SessionPersistence`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::authorize::{AuthUrlPolicy, build_authorization_url};
use crate::clock::Clock;
use crate::context::ClientContext;
use crate::error::OAuthError;
use crate::exchange::{CodeExchanger, TokenExchanger};
use crate::jwt::{claim_str, decode_payload};
use crate::patient::{FromResponseField, PatientIdExtractor};
use crate::refresh::{TokenRefresher, UnsupportedRefresher};
use crate::session::{AuthorizationRequestState, SessionGenerator, SessionPolicy};
use crate::tenant::OAuthConfig;
use crate::token::TokenSet;

/// Expiry buffer used by [`SmartClient::is_expired_default`].
pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Query parameters of the redirect back from the authorization server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    /// Authorization code.
    pub code: Option<String>,
    /// Echoed anti-CSRF state.
    pub state: Option<String>,
    /// OAuth error code.
    pub error: Option<String>,
    /// OAuth error description.
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parses a query string, with or without the leading `?`.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }
        params
    }

    /// Parses the query of a full redirect URL.
    ///
    /// # Errors
    ///
    /// Returns `invalid_config` if `url` is not an absolute URL.
    pub fn from_url(url: &str) -> Result<Self, OAuthError> {
        let url = Url::parse(url)?;
        Ok(Self::from_query(url.query().unwrap_or("")))
    }
}

/// Result of [`SmartClient::initiate_auth`].
#[derive(Debug, Clone)]
pub struct AuthorizationStart {
    /// Where to send the user.
    pub url: Url,
    /// Session material the caller must persist until the callback.
    pub session: AuthorizationRequestState,
}

/// A SMART on FHIR client assembled from per-axis policies.
#[derive(Clone)]
pub struct SmartClient {
    session_key: String,
    clock: Arc<dyn Clock>,
    generator: SessionGenerator,
    session_policy: SessionPolicy,
    auth_url_policy: AuthUrlPolicy,
    exchanger: Arc<dyn TokenExchanger>,
    extractor: Arc<dyn PatientIdExtractor>,
    refresher: Arc<dyn TokenRefresher>,
}

impl SmartClient {
    /// Creates a client with the baseline policies: PKCE with state, optional
    /// `aud`, direct PKCE exchange, `patient` response field, no refresh.
    #[must_use]
    pub fn new(session_key: impl Into<String>, context: &ClientContext) -> Self {
        Self {
            session_key: session_key.into(),
            clock: context.clock.clone(),
            generator: SessionGenerator::new(context.random.clone(), context.clock.clone()),
            session_policy: SessionPolicy::default(),
            auth_url_policy: AuthUrlPolicy::default(),
            exchanger: Arc::new(CodeExchanger::pkce(context)),
            extractor: Arc::new(FromResponseField::patient()),
            refresher: Arc::new(UnsupportedRefresher::new(
                "this client has no refresh strategy",
            )),
        }
    }

    /// Sets the session policy.
    #[must_use]
    pub fn with_session_policy(mut self, policy: SessionPolicy) -> Self {
        self.session_policy = policy;
        self
    }

    /// Sets the authorization URL policy.
    #[must_use]
    pub fn with_auth_url_policy(mut self, policy: AuthUrlPolicy) -> Self {
        self.auth_url_policy = policy;
        self
    }

    /// Sets the code exchanger.
    #[must_use]
    pub fn with_exchanger(mut self, exchanger: impl TokenExchanger + 'static) -> Self {
        self.exchanger = Arc::new(exchanger);
        self
    }

    /// Sets the patient id extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: impl PatientIdExtractor + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Sets the refresher.
    #[must_use]
    pub fn with_refresher(mut self, refresher: impl TokenRefresher + 'static) -> Self {
        self.refresher = Arc::new(refresher);
        self
    }

    /// Key under which this client's sessions are stored.
    #[must_use]
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// The session policy.
    #[must_use]
    pub fn session_policy(&self) -> SessionPolicy {
        self.session_policy
    }

    /// Generates session material and the authorization URL.
    ///
    /// Nothing is persisted; the caller must store the returned session
    /// before redirecting.
    ///
    /// # Errors
    ///
    /// Returns `missing_aud`, `missing_tenant_id` or `invalid_config` from
    /// the URL builder.
    pub fn initiate_auth(&self, config: &OAuthConfig) -> Result<AuthorizationStart, OAuthError> {
        let session = self
            .generator
            .generate(self.session_policy, Some(&config.tenant));
        let url = build_authorization_url(config, &session, &self.auth_url_policy)?;

        tracing::info!(
            client = %self.session_key,
            tenant = %config.tenant.id,
            "Started authorization"
        );

        Ok(AuthorizationStart { url, session })
    }

    /// Completes the flow from the callback parameters and the stored session.
    ///
    /// Checks run in order and the first failure is returned: vendor `error`,
    /// state, code, PKCE verifier, exchange, nonce, patient extraction. There
    /// is no partial success.
    ///
    /// # Errors
    ///
    /// See [`OAuthError`]; the vendor's own error code is the kind for
    /// callbacks carrying `error`.
    pub async fn handle_callback(
        &self,
        params: &CallbackParams,
        config: &OAuthConfig,
        session: Option<&AuthorizationRequestState>,
    ) -> Result<TokenSet, OAuthError> {
        if let Some(error) = &params.error {
            tracing::warn!(
                client = %self.session_key,
                error = %error,
                "Authorization server returned an error"
            );
            return Err(OAuthError::authorization(
                error.clone(),
                params.error_description.clone().unwrap_or_default(),
            ));
        }

        if self.session_policy.use_state {
            let expected = session.and_then(|s| s.state.as_deref());
            if expected.is_none() || expected != params.state.as_deref() {
                tracing::warn!(client = %self.session_key, "Callback state mismatch");
                return Err(OAuthError::StateMismatch);
            }
        }

        let code = params.code.as_deref().ok_or(OAuthError::MissingCode)?;

        if self.session_policy.use_pkce && session.and_then(|s| s.code_verifier.as_ref()).is_none()
        {
            return Err(OAuthError::MissingCodeVerifier);
        }

        let empty = AuthorizationRequestState {
            code_verifier: None,
            state: None,
            nonce: None,
            tenant: None,
            started_at: self.clock.now(),
        };
        let session = session.unwrap_or(&empty);

        let mut tokens = self.exchanger.exchange(code, config, session).await?;

        if let Some(nonce) = &session.nonce {
            verify_nonce(&tokens, nonce)?;
        }

        let patient_id = self.extractor.extract(&tokens)?;
        tokens.patient_id = Some(patient_id);

        tracing::info!(
            client = %self.session_key,
            tenant = %config.tenant.id,
            refreshable = self.can_refresh(&tokens),
            "Authorization completed"
        );

        Ok(tokens)
    }

    /// Refreshes `tokens` with the client's refresh strategy.
    ///
    /// # Errors
    ///
    /// Returns the refresher's error, or `invalid_response` if the server
    /// issued tokens that are already expired.
    pub async fn refresh(
        &self,
        tokens: &TokenSet,
        config: &OAuthConfig,
    ) -> Result<TokenSet, OAuthError> {
        let refreshed = self.refresher.refresh(tokens, config).await?;

        if refreshed.expires_at <= self.clock.now() {
            return Err(OAuthError::invalid_response(
                "refreshed token is already expired",
            ));
        }

        tracing::info!(
            client = %self.session_key,
            tenant = %config.tenant.id,
            expires_at = refreshed.expires_at,
            "Tokens refreshed"
        );

        Ok(refreshed)
    }

    /// Returns `true` if `tokens` expire within `buffer` from now.
    #[must_use]
    pub fn is_expired(&self, tokens: &TokenSet, buffer: Duration) -> bool {
        let buffer = i64::try_from(buffer.as_secs()).unwrap_or(i64::MAX);
        tokens.expires_at <= self.clock.now().saturating_add(buffer)
    }

    /// [`Self::is_expired`] with [`DEFAULT_EXPIRY_BUFFER`].
    #[must_use]
    pub fn is_expired_default(&self, tokens: &TokenSet) -> bool {
        self.is_expired(tokens, DEFAULT_EXPIRY_BUFFER)
    }

    /// Returns `true` if the token set carries what a refresh needs: a
    /// refresh token or a registered client id.
    #[must_use]
    pub fn can_refresh(&self, tokens: &TokenSet) -> bool {
        tokens.refresh_token.is_some() || tokens.client_id.is_some()
    }
}

impl fmt::Debug for SmartClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartClient")
            .field("session_key", &self.session_key)
            .field("session_policy", &self.session_policy)
            .field("auth_url_policy", &self.auth_url_policy)
            .finish_non_exhaustive()
    }
}

fn verify_nonce(tokens: &TokenSet, expected: &str) -> Result<(), OAuthError> {
    let id_token = tokens.id_token.as_deref().ok_or(OAuthError::MissingIdToken)?;
    let claims = decode_payload(id_token)?;
    if claim_str(&claims, "nonce").as_deref() != Some(expected) {
        return Err(OAuthError::NonceMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::clock::FixedClock;
    use crate::random::SequenceRandom;
    use crate::tenant::TenantConfig;

    fn context(now: i64) -> ClientContext {
        ClientContext::system()
            .unwrap()
            .with_clock(Arc::new(FixedClock::new(now)))
            .with_random(Arc::new(SequenceRandom::new(1)))
    }

    fn config() -> OAuthConfig {
        let tenant = TenantConfig::new(
            "t1",
            "T",
            "https://ehr/authorize",
            "http://127.0.0.1:1/token",
            "https://ehr/fhir",
        );
        OAuthConfig::new("client", "https://app/cb", vec!["openid"], tenant)
    }

    fn tokens(expires_at: i64) -> TokenSet {
        let mut tokens =
            TokenSet::from_response(json!({"access_token": "at", "expires_in": 0}), 0).unwrap();
        tokens.expires_at = expires_at;
        tokens
    }

    #[test]
    fn test_callback_params_from_query() {
        let params = CallbackParams::from_query("?code=abc&state=s1&extra=1");
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("s1"));
        assert!(params.error.is_none());

        let params = CallbackParams::from_url(
            "https://app/cb?error=access_denied&error_description=User+denied",
        )
        .unwrap();
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("User denied"));

        assert!(CallbackParams::from_url("/relative").is_err());
    }

    #[test]
    fn test_initiate_auth_captures_tenant() {
        let client = SmartClient::new("test", &context(100));
        let start = client.initiate_auth(&config()).unwrap();
        assert_eq!(start.session.started_at, 100);
        assert_eq!(start.session.tenant.as_ref().map(|t| t.id.as_str()), Some("t1"));
        assert!(start.url.as_str().starts_with("https://ehr/authorize?"));
    }

    #[tokio::test]
    async fn test_error_param_wins() {
        let client = SmartClient::new("test", &context(0));
        let params = CallbackParams::from_query("error=access_denied&state=wrong");
        let err = client.handle_callback(&params, &config(), None).await.unwrap_err();
        assert_eq!(err.kind(), "access_denied");
    }

    #[tokio::test]
    async fn test_state_mismatch_and_missing_session() {
        let client = SmartClient::new("test", &context(0));
        let session = client.initiate_auth(&config()).unwrap().session;

        let params = CallbackParams::from_query("code=c&state=other");
        let err = client
            .handle_callback(&params, &config(), Some(&session))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "state_mismatch");

        let err = client.handle_callback(&params, &config(), None).await.unwrap_err();
        assert_eq!(err.kind(), "state_mismatch");
    }

    #[tokio::test]
    async fn test_missing_code_and_verifier() {
        let client = SmartClient::new("test", &context(0));
        let mut session = client.initiate_auth(&config()).unwrap().session;
        let state = session.state.clone().unwrap();

        let params = CallbackParams::from_query(&format!("state={state}"));
        let err = client
            .handle_callback(&params, &config(), Some(&session))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "missing_code");

        session.code_verifier = None;
        let params = CallbackParams::from_query(&format!("code=c&state={state}"));
        let err = client
            .handle_callback(&params, &config(), Some(&session))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "missing_code_verifier");
    }

    #[test]
    fn test_is_expired_is_monotonic_in_buffer() {
        let client = SmartClient::new("test", &context(1_000));
        let t = tokens(1_100);

        assert!(!client.is_expired(&t, Duration::from_secs(0)));
        assert!(!client.is_expired(&t, Duration::from_secs(60)));
        assert!(client.is_expired(&t, Duration::from_secs(100)));
        assert!(client.is_expired(&t, Duration::from_secs(500)));
        assert!(client.is_expired(&t, Duration::MAX));

        assert!(!client.is_expired_default(&tokens(1_061)));
        assert!(client.is_expired_default(&tokens(1_060)));
    }

    #[test]
    fn test_can_refresh() {
        let client = SmartClient::new("test", &context(0));
        let mut t = tokens(10);
        assert!(!client.can_refresh(&t));
        t.client_id = Some("c".to_string());
        assert!(client.can_refresh(&t));
        t.client_id = None;
        t.refresh_token = Some("rt".to_string());
        assert!(client.can_refresh(&t));
    }

    #[tokio::test]
    async fn test_default_refresher_is_unsupported() {
        let client = SmartClient::new("test", &context(0));
        let err = client.refresh(&tokens(10), &config()).await.unwrap_err();
        assert_eq!(err.kind(), "refresh_not_supported");
    }
}
