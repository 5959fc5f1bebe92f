//! Authorization request state generated before redirecting to a vendor.
//!
//! The [`AuthorizationRequestState`] is the only context that survives the
//! browser navigation to the authorization server. It is created by
//! [`SessionGenerator::generate`], persisted by the caller, and consumed exactly
//! once on callback.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::pkce::PkceVerifier;
use crate::random::RandomSource;
use crate::tenant::TenantConfig;

/// Secret per-attempt material: PKCE verifier, anti-CSRF state, optional nonce.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequestState {
    /// PKCE code verifier, present when the vendor uses PKCE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,

    /// Anti-CSRF state token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// OpenID Connect nonce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Tenant the attempt was started against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantConfig>,

    /// When the attempt started (Unix seconds).
    pub started_at: i64,
}

impl AuthorizationRequestState {
    /// Returns the age of this session in seconds at `now`.
    #[must_use]
    pub fn age(&self, now: i64) -> i64 {
        now - self.started_at
    }
}

impl std::fmt::Debug for AuthorizationRequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationRequestState")
            .field("code_verifier", &self.code_verifier.as_ref().map(|_| ".."))
            .field("state", &self.state)
            .field("nonce", &self.nonce)
            .field("tenant", &self.tenant.as_ref().map(|t| &t.id))
            .field("started_at", &self.started_at)
            .finish()
    }
}

/// Which parts of the session a vendor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Generate a PKCE verifier.
    pub use_pkce: bool,
    /// Generate an anti-CSRF state token and check it on callback.
    pub use_state: bool,
    /// Generate an OpenID Connect nonce and check it against the ID token.
    pub use_nonce: bool,
}

impl SessionPolicy {
    /// PKCE and state, no nonce. Used by most vendors.
    pub const PKCE_WITH_STATE: Self = Self {
        use_pkce: true,
        use_state: true,
        use_nonce: false,
    };

    /// State only, for servers without PKCE support.
    pub const STATE_ONLY: Self = Self {
        use_pkce: false,
        use_state: true,
        use_nonce: false,
    };

    /// Enables the nonce.
    #[must_use]
    pub const fn with_nonce(mut self) -> Self {
        self.use_nonce = true;
        self
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::PKCE_WITH_STATE
    }
}

/// Produces [`AuthorizationRequestState`] values from injected randomness and time.
#[derive(Clone)]
pub struct SessionGenerator {
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
}

impl SessionGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new(random: Arc<dyn RandomSource>, clock: Arc<dyn Clock>) -> Self {
        Self { random, clock }
    }

    /// Generates a fresh session. Cannot fail.
    #[must_use]
    pub fn generate(
        &self,
        policy: SessionPolicy,
        tenant: Option<&TenantConfig>,
    ) -> AuthorizationRequestState {
        let code_verifier = policy
            .use_pkce
            .then(|| PkceVerifier::generate(self.random.as_ref()).into_inner());
        let state = policy.use_state.then(|| self.random.uuid().to_string());
        let nonce = policy.use_nonce.then(|| self.random.uuid().to_string());

        AuthorizationRequestState {
            code_verifier,
            state,
            nonce,
            tenant: tenant.cloned(),
            started_at: self.clock.now(),
        }
    }
}
