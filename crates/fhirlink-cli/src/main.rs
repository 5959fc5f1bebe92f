mod cli;
mod commands;
mod config;
mod credentials;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use commands::App;
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing(&cli.log_level);

    let config = config::load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Tenants(args) => {
            commands::tenants::tenants(&config, args.vendor);
            return Ok(());
        }
        Commands::Scopes(args) => {
            commands::tenants::scopes(&config, args.vendor);
            return Ok(());
        }
        _ => {}
    }

    let home = config::data_dir(cli.home.as_deref())?;
    let app = App::new(config, home)?;

    match &cli.command {
        Commands::Authorize(args) => commands::authorize::authorize(&app, args).await?,
        Commands::Callback(args) => commands::authorize::callback(&app, args).await?,
        Commands::Refresh(args) => commands::tokens::refresh(&app, args.vendor).await?,
        Commands::Status(args) => commands::tokens::status(&app, args.vendor)?,
        Commands::Logout(args) => commands::tokens::logout(&app, args.vendor).await?,
        Commands::Register(args) => commands::register::register(&app, args).await?,
        Commands::Tenants(_) | Commands::Scopes(_) => {}
    }

    Ok(())
}
