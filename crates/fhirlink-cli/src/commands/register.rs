use anyhow::{Context, Result, bail};
use colored::Colorize;
use fhirlink_oauth::Vendor;
use fhirlink_oauth::vendors::epic;

use super::{App, load_key};
use crate::cli::RegisterArgs;
use crate::credentials;
use crate::output::print_success;

pub async fn register(app: &App, args: &RegisterArgs) -> Result<()> {
    if args.vendor != Vendor::Epic {
        bail!(
            "Dynamic client registration is only supported for epic, not {}",
            args.vendor
        );
    }
    let settings = app.settings(Vendor::Epic)?;

    let key_path = args
        .key
        .as_ref()
        .or(settings.signing_key.as_ref())
        .context("--key is required (or set vendors.epic.signing_key)")?;
    let kid = args
        .kid
        .as_deref()
        .or(settings.signing_key_id.as_deref())
        .context("--kid is required (or set vendors.epic.signing_key_id)")?;
    let key = load_key(key_path, kid)?;

    let mut stored = credentials::require_tokens(&app.home, Vendor::Epic)?;
    let tenant = app
        .config
        .tenant(Vendor::Epic, &stored.tenant)
        .with_context(|| format!("Tenant '{}' is no longer configured", stored.tenant))?;

    let registered = epic::registration(&app.context, settings.proxy_register_url.as_deref())
        .register(
            &stored.tokens.access_token,
            &tenant.fhir_base_url,
            settings.software_id(),
            key.to_jwk(),
        )
        .await?;

    stored.tokens.client_id = Some(registered.client_id.clone());
    credentials::save_tokens(&app.home, &stored)?;

    print_success(&format!(
        "Registered client {}",
        registered.client_id.cyan()
    ));
    if settings.signing_key.is_none() {
        println!(
            "Set vendors.epic.signing_key = \"{}\" and signing_key_id = \"{kid}\" to refresh with this client",
            key_path.display()
        );
    }
    Ok(())
}
