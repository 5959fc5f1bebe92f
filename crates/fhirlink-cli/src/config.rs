use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use fhirlink_oauth::FhirlinkConfig;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fhirlink.toml";

/// Loads configuration from a TOML file with environment overrides, e.g.
/// `FHIRLINK__VENDORS__EPIC__CLIENT_ID=abc`.
///
/// A missing file is not an error: everything may come from the environment.
pub fn load_config(path: Option<&Path>) -> Result<FhirlinkConfig> {
    let mut builder = Config::builder();
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if path.exists() {
        builder = builder.add_source(File::from(path.clone()));
    } else {
        tracing::debug!(path = %path.display(), "Config file not found; using defaults");
    }
    builder = builder.add_source(
        Environment::with_prefix("FHIRLINK")
            .try_parsing(true)
            .separator("__"),
    );

    let cfg = builder.build().context("config build error")?;
    let merged: FhirlinkConfig = cfg
        .try_deserialize()
        .context("config deserialize error")?;
    merged
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(merged)
}

/// Resolves the data directory: `--home`/`FHIRLINK_HOME`, else `~/.fhirlink`.
pub fn data_dir(home: Option<&Path>) -> Result<PathBuf> {
    match home {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Ok(dirs::home_dir()
            .context("Cannot determine home directory")?
            .join(".fhirlink")),
    }
}
