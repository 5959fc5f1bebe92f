//! Shared collaborators injected into every policy.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::OAuthError;
use crate::random::{OsRandom, RandomSource};

/// Default timeout for token endpoint and registration calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client, clock and randomness shared by a client's policies.
#[derive(Clone)]
pub struct ClientContext {
    /// HTTP client used for token, refresh and registration calls.
    pub http: reqwest::Client,
    /// Time source for expiry computation and session timestamps.
    pub clock: Arc<dyn Clock>,
    /// Randomness for verifiers, state, nonces and assertion ids.
    pub random: Arc<dyn RandomSource>,
}

impl ClientContext {
    /// Creates a context from explicit collaborators.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            http,
            clock,
            random,
        }
    }

    /// Creates a context with the system clock, OS randomness and an HTTP
    /// client with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns `invalid_config` if the HTTP client cannot be built.
    pub fn system() -> Result<Self, OAuthError> {
        let http = build_http_client(DEFAULT_REQUEST_TIMEOUT, None)?;
        Ok(Self::new(http, Arc::new(SystemClock), Arc::new(OsRandom)))
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the random source.
    #[must_use]
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// Current time from the injected clock (Unix seconds).
    #[must_use]
    pub fn now(&self) -> i64 {
        self.clock.now()
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext").finish_non_exhaustive()
    }
}

/// Builds an HTTP client with a request timeout and optional user agent.
///
/// # Errors
///
/// Returns `invalid_config` if the client cannot be built (e.g. the TLS
/// backend fails to initialize).
pub fn build_http_client(
    timeout: Duration,
    user_agent: Option<&str>,
) -> Result<reqwest::Client, OAuthError> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(user_agent) = user_agent {
        builder = builder.user_agent(user_agent.to_string());
    }
    builder
        .build()
        .map_err(|e| OAuthError::invalid_config(format!("failed to build HTTP client: {e}")))
}
