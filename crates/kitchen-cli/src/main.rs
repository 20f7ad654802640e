//! Kitchen CLI - keep track of kitchen items from the terminal
//!
//! Lists, edits and watches the shared inventory of a Supabase project, or
//! of a built-in sample kitchen with `--demo`.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::{run_add, AddOptions};
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::AppContext;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_edit, ItemChanges};
use crate::commands::list::{run_list, ListOptions};
use crate::commands::locations::run_locations;
use crate::commands::upload::run_upload;
use crate::commands::watch::run_watch;
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "kitchen=info,kitchen_core=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Config { command } => run_config(command, profile)?,
        Commands::Auth { command } => run_auth(command, profile, cli.demo).await?,
        Commands::List {
            search,
            category,
            view,
            json,
        } => {
            let context = AppContext::open(profile, cli.demo)?;
            let options = ListOptions {
                search,
                category,
                view: view.map(Into::into),
            };
            run_list(&context, options, json).await?;
        }
        Commands::Locations { name, json } => {
            let context = AppContext::open(profile, cli.demo)?;
            run_locations(&context, name.as_deref(), json).await?;
        }
        Commands::Add {
            name,
            category,
            quantity,
            location,
            description,
            image,
        } => {
            let context = AppContext::open(profile, cli.demo)?;
            let options = AddOptions {
                name,
                category,
                quantity,
                location,
                description,
                image,
            };
            run_add(&context, options).await?;
        }
        Commands::Edit {
            id,
            name,
            category,
            quantity,
            location,
            description,
        } => {
            let context = AppContext::open(profile, cli.demo)?;
            let changes = ItemChanges {
                name,
                category,
                quantity,
                location,
                description,
            };
            run_edit(&context, &id, changes).await?;
        }
        Commands::Delete { id } => {
            let context = AppContext::open(profile, cli.demo)?;
            run_delete(&context, &id).await?;
        }
        Commands::Upload { id, path } => {
            let context = AppContext::open(profile, cli.demo)?;
            run_upload(&context, &id, &path).await?;
        }
        Commands::Watch { view } => {
            let context = AppContext::open(profile, cli.demo)?;
            run_watch(&context, view.map(Into::into)).await?;
        }
    }

    Ok(())
}
