use colored::Colorize;
use fhirlink_oauth::{FhirlinkConfig, Vendor};

pub fn tenants(config: &FhirlinkConfig, vendor: Option<Vendor>) {
    let tenants: Vec<_> = config
        .tenants
        .iter()
        .filter(|t| vendor.is_none_or(|v| t.vendor.parse::<Vendor>().is_ok_and(|tv| tv == v)))
        .collect();

    if tenants.is_empty() {
        println!("No tenants configured.");
        return;
    }
    for tenant in tenants {
        println!(
            "{:<10} {:<20} {}",
            tenant.vendor.cyan(),
            tenant.id,
            tenant.name
        );
    }
}

/// The scopes requested from `vendor`: the configured override, else the
/// vendor's defaults.
pub fn scope_list(config: &FhirlinkConfig, vendor: Vendor) -> Vec<String> {
    config
        .vendor(vendor)
        .and_then(|s| s.scopes.clone())
        .unwrap_or_else(|| vendor.scopes().iter().map(|s| (*s).to_string()).collect())
}

pub fn scopes(config: &FhirlinkConfig, vendor: Vendor) {
    for scope in scope_list(config, vendor) {
        println!("{scope}");
    }
}
