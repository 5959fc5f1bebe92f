//! Token refresh strategies.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ClientContext;
use crate::error::OAuthError;
use crate::exchange::ProxyEndpoint;
use crate::jwt::{AssertionClaims, AssertionSigner};
use crate::tenant::OAuthConfig;
use crate::token::TokenSet;
use crate::transport::{BodyEncoding, post_token_request};

/// `grant_type` for RFC 7523 JWT-bearer assertions.
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime of a client assertion, in seconds.
pub const ASSERTION_LIFETIME_SECS: i64 = 300;

/// Obtains a new [`TokenSet`] from an existing one.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Refreshes `tokens`.
    ///
    /// # Errors
    ///
    /// Returns a capability error (`refresh_not_supported`,
    /// `no_refresh_token`, `no_client_id`) when refresh is impossible, or a
    /// transport error from the token endpoint.
    async fn refresh(&self, tokens: &TokenSet, config: &OAuthConfig)
    -> Result<TokenSet, OAuthError>;
}

// ============================================================================
// Standard refresh_token grant
// ============================================================================

/// The `refresh_token` grant.
#[derive(Debug, Clone)]
pub struct StandardRefresher {
    context: ClientContext,
    proxy: Option<ProxyEndpoint>,
}

impl StandardRefresher {
    /// Refreshes directly against the tenant token URL.
    #[must_use]
    pub fn new(context: &ClientContext) -> Self {
        Self {
            context: context.clone(),
            proxy: None,
        }
    }

    /// Refreshes through a proxy holding the client secret.
    #[must_use]
    pub fn proxy(context: &ClientContext, endpoint: ProxyEndpoint) -> Self {
        Self {
            context: context.clone(),
            proxy: Some(endpoint),
        }
    }
}

#[async_trait]
impl TokenRefresher for StandardRefresher {
    async fn refresh(
        &self,
        tokens: &TokenSet,
        config: &OAuthConfig,
    ) -> Result<TokenSet, OAuthError> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or(OAuthError::NoRefreshToken)?;

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.as_str()),
        ];

        let (url, encoding) = match &self.proxy {
            Some(proxy) => (proxy.url_for(&config.tenant), proxy.encoding()),
            None => (config.tenant.token_url.clone(), BodyEncoding::Form),
        };

        tracing::debug!(
            tenant = %config.tenant.id,
            proxied = self.proxy.is_some(),
            "Refreshing tokens"
        );

        let raw = post_token_request(&self.context.http, &url, &params, encoding).await?;
        let mut refreshed = TokenSet::from_response(raw, self.context.now())?;
        refreshed.carry_forward(tokens);
        Ok(refreshed)
    }
}

// ============================================================================
// JWT-bearer assertion
// ============================================================================

/// Refresh by presenting a signed client assertion for a dynamically
/// registered client. No refresh token or client secret is involved.
#[derive(Clone)]
pub struct JwtBearerRefresher {
    context: ClientContext,
    signer: Arc<dyn AssertionSigner>,
}

impl JwtBearerRefresher {
    /// Creates a refresher that signs assertions with `signer`.
    #[must_use]
    pub fn new(context: &ClientContext, signer: Arc<dyn AssertionSigner>) -> Self {
        Self {
            context: context.clone(),
            signer,
        }
    }
}

impl fmt::Debug for JwtBearerRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtBearerRefresher").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenRefresher for JwtBearerRefresher {
    async fn refresh(
        &self,
        tokens: &TokenSet,
        config: &OAuthConfig,
    ) -> Result<TokenSet, OAuthError> {
        let client_id = tokens.client_id.as_deref().ok_or(OAuthError::NoClientId)?;
        let token_url = config.tenant.token_url.as_str();
        let now = self.context.now();

        let claims = AssertionClaims {
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            aud: token_url.to_string(),
            exp: now + ASSERTION_LIFETIME_SECS,
            iat: now,
            jti: self.context.random.uuid().to_string(),
        };
        let assertion = self.signer.sign(&claims)?;

        let params = [
            ("grant_type", JWT_BEARER_GRANT_TYPE),
            ("assertion", assertion.as_str()),
            ("client_id", client_id),
        ];

        tracing::debug!(tenant = %config.tenant.id, "Refreshing tokens with client assertion");

        let raw =
            post_token_request(&self.context.http, token_url, &params, BodyEncoding::Form).await?;
        let mut refreshed = TokenSet::from_response(raw, self.context.now())?;
        refreshed.carry_forward(tokens);
        Ok(refreshed)
    }
}

// ============================================================================
// Unsupported and conditional
// ============================================================================

/// Always fails with `refresh_not_supported`.
#[derive(Debug, Clone)]
pub struct UnsupportedRefresher {
    reason: String,
}

impl UnsupportedRefresher {
    /// Creates a refresher that fails with `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TokenRefresher for UnsupportedRefresher {
    async fn refresh(
        &self,
        _tokens: &TokenSet,
        _config: &OAuthConfig,
    ) -> Result<TokenSet, OAuthError> {
        Err(OAuthError::refresh_not_supported(self.reason.clone()))
    }
}

type TokenPredicate = dyn Fn(&TokenSet) -> bool + Send + Sync;

/// Chooses between two refreshers based on the current token set.
#[derive(Clone)]
pub struct ConditionalRefresher {
    predicate: Arc<TokenPredicate>,
    when_true: Arc<dyn TokenRefresher>,
    when_false: Arc<dyn TokenRefresher>,
}

impl ConditionalRefresher {
    /// Uses `when_true` if `predicate` holds for the token set, else `when_false`.
    #[must_use]
    pub fn new(
        predicate: impl Fn(&TokenSet) -> bool + Send + Sync + 'static,
        when_true: Arc<dyn TokenRefresher>,
        when_false: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            predicate: Arc::new(predicate),
            when_true,
            when_false,
        }
    }
}

impl fmt::Debug for ConditionalRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalRefresher").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenRefresher for ConditionalRefresher {
    async fn refresh(
        &self,
        tokens: &TokenSet,
        config: &OAuthConfig,
    ) -> Result<TokenSet, OAuthError> {
        if (self.predicate)(tokens) {
            self.when_true.refresh(tokens, config).await
        } else {
            self.when_false.refresh(tokens, config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tenant::TenantConfig;

    fn config() -> OAuthConfig {
        let tenant = TenantConfig::new("t", "T", "https://a", "http://127.0.0.1:1/token", "https://f");
        OAuthConfig::new("client", "https://app/cb", vec!["openid"], tenant)
    }

    fn tokens() -> TokenSet {
        TokenSet::from_response(json!({"access_token": "at", "expires_in": 60}), 0).unwrap()
    }

    #[tokio::test]
    async fn test_unsupported() {
        let err = UnsupportedRefresher::new("no refresh for this vendor")
            .refresh(&tokens(), &config())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "refresh_not_supported");
    }

    #[tokio::test]
    async fn test_standard_without_refresh_token() {
        let context = ClientContext::system().unwrap();
        let err = StandardRefresher::new(&context)
            .refresh(&tokens(), &config())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "no_refresh_token");
    }

    #[tokio::test]
    async fn test_jwt_bearer_without_client_id() {
        struct NeverSign;
        impl AssertionSigner for NeverSign {
            fn sign(&self, _claims: &AssertionClaims) -> Result<String, OAuthError> {
                Err(OAuthError::assertion("unreachable"))
            }
        }

        let context = ClientContext::system().unwrap();
        let err = JwtBearerRefresher::new(&context, Arc::new(NeverSign))
            .refresh(&tokens(), &config())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "no_client_id");
    }

    #[tokio::test]
    async fn test_conditional_picks_branch() {
        let refresher = ConditionalRefresher::new(
            TokenSet::has_refresh_token,
            Arc::new(UnsupportedRefresher::new("true branch")),
            Arc::new(UnsupportedRefresher::new("false branch")),
        );

        let err = refresher.refresh(&tokens(), &config()).await.unwrap_err();
        assert!(err.to_string().contains("false branch"));

        let mut with_refresh = tokens();
        with_refresh.refresh_token = Some("rt".to_string());
        let err = refresher.refresh(&with_refresh, &config()).await.unwrap_err();
        assert!(err.to_string().contains("true branch"));
    }
}
