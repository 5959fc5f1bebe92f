//! Authorization code exchange.
//!
//! [`CodeExchanger`] covers the three exchange shapes vendors need:
//!
//! - [`CodeExchanger::pkce`]: direct POST to the tenant token URL with the
//!   PKCE verifier
//! - [`CodeExchanger::proxy`]: the same grant routed through a backend that
//!   holds a client secret the browser must not see
//! - [`CodeExchanger::without_pkce`]: direct POST without a verifier, for
//!   servers that reject PKCE parameters

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ClientContext;
use crate::error::OAuthError;
use crate::session::AuthorizationRequestState;
use crate::tenant::{OAuthConfig, TenantConfig};
use crate::token::TokenSet;
use crate::transport::{BodyEncoding, post_token_request};

/// Exchanges an authorization code for a [`TokenSet`].
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Performs the exchange. The returned token set has no patient id yet.
    ///
    /// # Errors
    ///
    /// Returns `missing_code_verifier` when PKCE is required and the session
    /// has no verifier, or any transport error from the token endpoint.
    async fn exchange(
        &self,
        code: &str,
        config: &OAuthConfig,
        session: &AuthorizationRequestState,
    ) -> Result<TokenSet, OAuthError>;
}

type UrlFn = dyn Fn(&TenantConfig) -> String + Send + Sync;

/// A backend endpoint that forwards token requests to the vendor.
#[derive(Clone)]
pub struct ProxyEndpoint {
    url: Arc<UrlFn>,
    encoding: BodyEncoding,
}

impl ProxyEndpoint {
    /// Creates an endpoint whose URL is derived from the tenant.
    #[must_use]
    pub fn new(url: impl Fn(&TenantConfig) -> String + Send + Sync + 'static) -> Self {
        Self {
            url: Arc::new(url),
            encoding: BodyEncoding::Form,
        }
    }

    /// Creates an endpoint with a fixed URL.
    #[must_use]
    pub fn fixed(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::new(move |_| url.clone())
    }

    /// Creates an endpoint from a URL template in which `{tenant}` is
    /// replaced by the tenant id.
    #[must_use]
    pub fn templated(template: impl Into<String>) -> Self {
        let template = template.into();
        Self::new(move |tenant| template.replace("{tenant}", &tenant.id))
    }

    /// Sends JSON bodies instead of form bodies.
    #[must_use]
    pub fn with_json_body(mut self) -> Self {
        self.encoding = BodyEncoding::Json;
        self
    }

    /// Resolves the URL for a tenant.
    #[must_use]
    pub fn url_for(&self, tenant: &TenantConfig) -> String {
        (self.url)(tenant)
    }

    /// Returns the body encoding.
    #[must_use]
    pub fn encoding(&self) -> BodyEncoding {
        self.encoding
    }
}

impl fmt::Debug for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyEndpoint")
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

/// The standard `authorization_code` grant.
#[derive(Debug, Clone)]
pub struct CodeExchanger {
    context: ClientContext,
    proxy: Option<ProxyEndpoint>,
    send_verifier: bool,
}

impl CodeExchanger {
    /// Direct exchange with PKCE.
    #[must_use]
    pub fn pkce(context: &ClientContext) -> Self {
        Self {
            context: context.clone(),
            proxy: None,
            send_verifier: true,
        }
    }

    /// Exchange with PKCE routed through a proxy.
    #[must_use]
    pub fn proxy(context: &ClientContext, endpoint: ProxyEndpoint) -> Self {
        Self {
            context: context.clone(),
            proxy: Some(endpoint),
            send_verifier: true,
        }
    }

    /// Direct exchange without a code verifier.
    #[must_use]
    pub fn without_pkce(context: &ClientContext) -> Self {
        Self {
            context: context.clone(),
            proxy: None,
            send_verifier: false,
        }
    }
}

#[async_trait]
impl TokenExchanger for CodeExchanger {
    async fn exchange(
        &self,
        code: &str,
        config: &OAuthConfig,
        session: &AuthorizationRequestState,
    ) -> Result<TokenSet, OAuthError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("client_id", config.client_id.as_str()),
        ];

        if self.send_verifier {
            let verifier = session
                .code_verifier
                .as_deref()
                .ok_or(OAuthError::MissingCodeVerifier)?;
            params.push(("code_verifier", verifier));
        }

        let (url, encoding) = match &self.proxy {
            Some(proxy) => (proxy.url_for(&config.tenant), proxy.encoding()),
            None => (config.tenant.token_url.clone(), BodyEncoding::Form),
        };

        tracing::debug!(
            tenant = %config.tenant.id,
            proxied = self.proxy.is_some(),
            pkce = self.send_verifier,
            "Exchanging authorization code"
        );

        let raw = post_token_request(&self.context.http, &url, &params, encoding).await?;
        TokenSet::from_response(raw, self.context.now())
    }
}
