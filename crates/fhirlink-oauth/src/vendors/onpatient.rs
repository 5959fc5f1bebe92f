//! OnPatient (DrChrono).
//!
//! The authorization server rejects the `aud` parameter. Refresh needs the
//! client secret, so it is only available through a backend proxy.

use crate::authorize::{AuthUrlPolicy, Audience};
use crate::client::SmartClient;
use crate::context::ClientContext;
use crate::exchange::{CodeExchanger, ProxyEndpoint};
use crate::patient::FromResponseField;
use crate::refresh::{StandardRefresher, UnsupportedRefresher};
use crate::session::SessionPolicy;

/// Session storage key.
pub const SESSION_KEY: &str = "onpatient";

/// Requested scopes.
pub const SCOPES: &[&str] = &[
    "launch/patient",
    "openid",
    "fhirUser",
    "offline_access",
    "patient/*.read",
];

/// OnPatient client options.
#[derive(Debug, Clone, Default)]
pub struct OnPatientOptions {
    /// Backend proxy holding the client secret. Enables refresh.
    pub backend: Option<ProxyEndpoint>,
}

/// Builds the OnPatient client.
#[must_use]
pub fn client(context: &ClientContext, options: OnPatientOptions) -> SmartClient {
    let client = SmartClient::new(SESSION_KEY, context)
        .with_session_policy(SessionPolicy::PKCE_WITH_STATE)
        .with_auth_url_policy(AuthUrlPolicy::new(Audience::Omit))
        .with_extractor(FromResponseField::patient());

    match options.backend {
        Some(proxy) => client
            .with_exchanger(CodeExchanger::proxy(context, proxy.clone()))
            .with_refresher(StandardRefresher::proxy(context, proxy)),
        None => client
            .with_exchanger(CodeExchanger::pkce(context))
            .with_refresher(UnsupportedRefresher::new(
                "OnPatient refresh requires a backend proxy",
            )),
    }
}
