use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fhirlink_oauth::{TokenSet, Vendor};
use serde::{Deserialize, Serialize};

/// Tokens obtained for one vendor, with the tenant they belong to.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredTokens {
    pub vendor: Vendor,
    pub tenant: String,
    pub tokens: TokenSet,
}

fn tokens_path(dir: &Path, vendor: Vendor) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
    Ok(dir.join(format!("tokens.{vendor}.json")))
}

pub fn sessions_dir(dir: &Path) -> PathBuf {
    dir.join("sessions")
}

pub fn load_tokens(dir: &Path, vendor: Vendor) -> Result<Option<StoredTokens>> {
    let path = tokens_path(dir, vendor)?;
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    let stored: StoredTokens = serde_json::from_str(&content)
        .with_context(|| format!("Corrupt token file {}", path.display()))?;
    Ok(Some(stored))
}

/// Like [`load_tokens`], but a missing file is an error.
pub fn require_tokens(dir: &Path, vendor: Vendor) -> Result<StoredTokens> {
    load_tokens(dir, vendor)?.with_context(|| {
        format!("No stored tokens for {vendor}. Run: fhirlink authorize --vendor {vendor}")
    })
}

pub fn save_tokens(dir: &Path, stored: &StoredTokens) -> Result<()> {
    let path = tokens_path(dir, stored.vendor)?;
    let content = serde_json::to_string_pretty(stored)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn remove_tokens(dir: &Path, vendor: Vendor) -> Result<bool> {
    let path = tokens_path(dir, vendor)?;
    if path.exists() {
        fs::remove_file(path)?;
        Ok(true)
    } else {
        Ok(false)
    }
}
