use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use fhirlink_oauth::Vendor;

#[derive(Parser)]
#[command(name = "fhirlink")]
#[command(about = "fhirlink CLI: SMART on FHIR authorization against EHR vendors")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./fhirlink.toml when present)
    #[arg(short, long, global = true, env = "FHIRLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for pending sessions and stored tokens (defaults to ~/.fhirlink)
    #[arg(long, global = true, env = "FHIRLINK_HOME")]
    pub home: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start authorization: save a pending session and print the vendor URL
    Authorize(AuthorizeArgs),
    /// Complete authorization from the redirect URL
    Callback(CallbackArgs),
    /// Refresh stored tokens
    Refresh(VendorArgs),
    /// Show stored token expiry and refresh capability
    Status(VendorArgs),
    /// Remove stored tokens and any pending session
    Logout(VendorArgs),
    /// List configured tenants
    Tenants(TenantsArgs),
    /// Print the scopes requested from a vendor
    Scopes(VendorArgs),
    /// Register a dynamic client with Epic using the stored patient token
    Register(RegisterArgs),
}

#[derive(clap::Args)]
pub struct VendorArgs {
    /// Vendor (epic, cerner, veradigm, healow, va, onpatient, athena)
    #[arg(long, value_parser = Vendor::from_str)]
    pub vendor: Vendor,
}

#[derive(clap::Args)]
pub struct AuthorizeArgs {
    /// Vendor (epic, cerner, veradigm, healow, va, onpatient, athena)
    #[arg(long, value_parser = Vendor::from_str)]
    pub vendor: Vendor,
    /// Tenant id from the configuration
    #[arg(long)]
    pub tenant: String,
}

#[derive(clap::Args)]
pub struct CallbackArgs {
    /// Vendor (epic, cerner, veradigm, healow, va, onpatient, athena)
    #[arg(long, value_parser = Vendor::from_str)]
    pub vendor: Vendor,
    /// Full redirect URL the browser landed on
    #[arg(long)]
    pub url: String,
    /// Tenant id, when the pending session does not record one
    #[arg(long)]
    pub tenant: Option<String>,
}

#[derive(clap::Args)]
pub struct TenantsArgs {
    /// Only list tenants of this vendor
    #[arg(long, value_parser = Vendor::from_str)]
    pub vendor: Option<Vendor>,
}

#[derive(clap::Args)]
pub struct RegisterArgs {
    /// Vendor; only epic supports dynamic client registration
    #[arg(long, value_parser = Vendor::from_str, default_value = "epic")]
    pub vendor: Vendor,
    /// PEM private key to register (defaults to vendors.epic.signing_key)
    #[arg(long)]
    pub key: Option<PathBuf>,
    /// Key id for the registered JWK (defaults to vendors.epic.signing_key_id)
    #[arg(long)]
    pub kid: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_authorize() {
        let cli = Cli::try_parse_from([
            "fhirlink",
            "authorize",
            "--vendor",
            "Epic",
            "--tenant",
            "sandbox",
        ])
        .unwrap();
        match cli.command {
            Commands::Authorize(args) => {
                assert_eq!(args.vendor, Vendor::Epic);
                assert_eq!(args.tenant, "sandbox");
            }
            _ => panic!("expected authorize"),
        }
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_unknown_vendor_is_rejected() {
        assert!(Cli::try_parse_from(["fhirlink", "status", "--vendor", "meditech"]).is_err());
    }

    #[test]
    fn test_register_defaults_to_epic() {
        let cli = Cli::try_parse_from(["fhirlink", "register", "--kid", "k1"]).unwrap();
        match cli.command {
            Commands::Register(args) => {
                assert_eq!(args.vendor, Vendor::Epic);
                assert_eq!(args.kid.as_deref(), Some("k1"));
                assert!(args.key.is_none());
            }
            _ => panic!("expected register"),
        }
    }
}
