pub mod authorize;
pub mod register;
pub mod tenants;
pub mod tokens;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use fhirlink_oauth::{
    AssertionSigner, ClientContext, FhirlinkConfig, FileSessionStore, OsRandom,
    SessionPersistence, SigningAlgorithm, SigningKeyPair, SmartClient, SystemClock, Vendor,
    VendorSettings, vendors,
};

use crate::credentials;

/// Everything a command needs: configuration, the data directory and the
/// shared HTTP client, clock and randomness.
pub struct App {
    pub config: FhirlinkConfig,
    pub home: PathBuf,
    pub context: ClientContext,
}

impl App {
    pub fn new(config: FhirlinkConfig, home: PathBuf) -> Result<Self> {
        let http = config
            .http
            .build_client()
            .context("Failed to build HTTP client")?;
        let context = ClientContext::new(http, Arc::new(SystemClock), Arc::new(OsRandom));
        Ok(Self {
            config,
            home,
            context,
        })
    }

    pub fn settings(&self, vendor: Vendor) -> Result<&VendorSettings> {
        self.config.vendor(vendor).with_context(|| {
            format!("Vendor {vendor} is not configured. Add a [vendors.{vendor}] section")
        })
    }

    pub fn client(&self, vendor: Vendor) -> Result<SmartClient> {
        let settings = self.settings(vendor)?;
        let signer = match (vendor, &settings.signing_key, &settings.signing_key_id) {
            (Vendor::Epic, Some(path), Some(kid)) => {
                Some(Arc::new(load_key(path, kid)?) as Arc<dyn AssertionSigner>)
            }
            _ => None,
        };
        Ok(vendors::build_client(vendor, &self.context, settings, signer)?)
    }

    pub fn sessions(&self) -> SessionPersistence<FileSessionStore> {
        SessionPersistence::new(
            FileSessionStore::new(credentials::sessions_dir(&self.home)),
            self.context.clock.clone(),
        )
    }
}

pub fn load_key(path: &Path, kid: &str) -> Result<SigningKeyPair> {
    let pem = fs::read_to_string(path)
        .with_context(|| format!("Cannot read signing key {}", path.display()))?;
    SigningKeyPair::from_pem(kid, SigningAlgorithm::default(), &pem)
        .with_context(|| format!("Invalid signing key {}", path.display()))
}
