use anyhow::{Context, Result};
use colored::Colorize;
use fhirlink_oauth::CallbackParams;

use super::App;
use crate::cli::{AuthorizeArgs, CallbackArgs};
use crate::credentials::{self, StoredTokens};
use crate::output::{print_success, print_tokens};

pub async fn authorize(app: &App, args: &AuthorizeArgs) -> Result<()> {
    let vendor = args.vendor;
    let client = app.client(vendor)?;
    let config = app.config.oauth_config(vendor, &args.tenant)?;

    let start = client.initiate_auth(&config)?;
    app.sessions()
        .save(client.session_key(), &start.session)
        .await
        .context("Failed to save pending session")?;

    print_success(&format!(
        "Pending session saved for {} ({})",
        vendor.to_string().cyan(),
        args.tenant.cyan()
    ));
    println!("\nOpen this URL in a browser:\n\n  {}\n", start.url);
    println!("Then run: fhirlink callback --vendor {vendor} --url '<redirect url>'");
    Ok(())
}

pub async fn callback(app: &App, args: &CallbackArgs) -> Result<()> {
    let vendor = args.vendor;
    let client = app.client(vendor)?;
    let params = CallbackParams::from_url(&args.url)?;

    // Taken before anything else can fail: a session is good for one attempt.
    let session = app
        .sessions()
        .take_fresh(client.session_key(), app.config.sessions.max_age)
        .await?;

    let tenant = args
        .tenant
        .clone()
        .or_else(|| session.as_ref()?.tenant.as_ref().map(|t| t.id.clone()))
        .with_context(|| {
            format!(
                "No pending authorization for {vendor}. Run: fhirlink authorize --vendor {vendor} --tenant <id>"
            )
        })?;
    let config = app.config.oauth_config(vendor, &tenant)?;

    let tokens = client
        .handle_callback(&params, &config, session.as_ref())
        .await?;

    let stored = StoredTokens {
        vendor,
        tenant,
        tokens,
    };
    credentials::save_tokens(&app.home, &stored)?;

    print_success(&format!(
        "Authorized {} for patient {}",
        vendor.to_string().cyan(),
        stored.tokens.patient_id.as_deref().unwrap_or("-").cyan()
    ));
    print_tokens(&stored.tokens)
}
