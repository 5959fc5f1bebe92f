use anyhow::{Result, bail};
use fhirlink_oauth::Vendor;

use super::App;
use crate::credentials::{self, StoredTokens};
use crate::output::{format_timestamp, print_field, print_success};

pub async fn refresh(app: &App, vendor: Vendor) -> Result<()> {
    let stored = credentials::require_tokens(&app.home, vendor)?;
    let client = app.client(vendor)?;
    let reauthorize = format!(
        "Run: fhirlink authorize --vendor {vendor} --tenant {}",
        stored.tenant
    );

    if !client.can_refresh(&stored.tokens) {
        bail!("Stored {vendor} tokens cannot be refreshed. {reauthorize}");
    }

    let config = app.config.oauth_config(vendor, &stored.tenant)?;
    let tokens = match client.refresh(&stored.tokens, &config).await {
        Ok(tokens) => tokens,
        Err(e) if e.requires_reauthorization() => bail!("{e}. {reauthorize}"),
        Err(e) => return Err(e.into()),
    };

    let stored = StoredTokens { tokens, ..stored };
    credentials::save_tokens(&app.home, &stored)?;
    print_success(&format!(
        "Refreshed {vendor} tokens; valid until {}",
        format_timestamp(stored.tokens.expires_at)
    ));
    Ok(())
}

pub fn status(app: &App, vendor: Vendor) -> Result<()> {
    let Some(stored) = credentials::load_tokens(&app.home, vendor)? else {
        println!("No stored tokens for {vendor}");
        return Ok(());
    };
    let client = app.client(vendor)?;
    let tokens = &stored.tokens;

    let expires = format_timestamp(tokens.expires_at);
    let expires = if client.is_expired(tokens, app.config.tokens.expiry_buffer) {
        format!("{expires} (expired)")
    } else {
        expires
    };

    print_field("Vendor", vendor.as_str());
    print_field("Tenant", &stored.tenant);
    print_field("Patient", tokens.patient_id.as_deref().unwrap_or("-"));
    print_field("Expires", &expires);
    print_field(
        "Refreshable",
        if client.can_refresh(tokens) { "yes" } else { "no" },
    );
    if let Some(client_id) = &tokens.client_id {
        print_field("Registered client", client_id);
    }
    if let Some(scope) = &tokens.scope {
        print_field("Scope", scope);
    }
    Ok(())
}

pub async fn logout(app: &App, vendor: Vendor) -> Result<()> {
    app.sessions().clear(vendor.session_key()).await?;
    if credentials::remove_tokens(&app.home, vendor)? {
        print_success(&format!("Logged out of {vendor} (tokens removed)"));
    } else {
        println!("No stored tokens for {vendor}");
    }
    Ok(())
}
