//! Phonebook CLI - operator tooling for the directory mirror
//!
//! Registers directories, runs sync cycles on demand and applies deferred
//! changes from the terminal.

mod cli;
mod commands;
mod error;


use std::sync::Arc;

use clap::Parser;
use phonebook_core::directory::{DirectoryConnector, LdapConnector};
use phonebook_core::notify::SmtpMailer;
use phonebook_core::quick_action::QuickActionResolver;
use phonebook_core::sync::Orchestrator;

use crate::cli::{Cli, Commands, ContactCommands, DirectoryCommands};
use crate::commands::common::{load_config, open_database};
use crate::commands::contact::{
    run_contact_add, run_contact_delete, run_contact_edit, run_contact_list,
};
use crate::commands::directory::{
    run_directory_add, run_directory_delete, run_directory_edit, run_directory_list,
    run_directory_test, run_directory_test_mail,
};
use crate::commands::quick::{run_quick_add, run_quick_update};
use crate::commands::sync::run_sync;
use crate::error::CliError;

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
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("phonebook=info".parse().expect("valid directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.db_path)?;
    let db = open_database(&config)?;
    let connector: Arc<dyn DirectoryConnector> =
        Arc::new(LdapConnector::new(config.directory_timeout));

    match cli.command {
        Commands::Directory { command } => match command {
            DirectoryCommands::Add(args) => {
                run_directory_add(args, &db).await?;
            }
            DirectoryCommands::Edit(args) => {
                run_directory_edit(args, &db).await?;
            }
            DirectoryCommands::Delete { id } => run_directory_delete(id, &db).await?,
            DirectoryCommands::List { json } => run_directory_list(json, &db).await?,
            DirectoryCommands::Test { id } => {
                run_directory_test(id, &db, connector.as_ref()).await?;
            }
            DirectoryCommands::TestMail { id } => {
                run_directory_test_mail(id, &db, &SmtpMailer::new()).await?;
            }
        },
        Commands::Contact { command } => match command {
            ContactCommands::List { directory_id, json } => {
                run_contact_list(directory_id, json, &db).await?;
            }
            ContactCommands::Add(args) => {
                run_contact_add(args, &db).await?;
            }
            ContactCommands::Edit(args) => {
                run_contact_edit(args, &db).await?;
            }
            ContactCommands::Delete { id } => run_contact_delete(id, &db).await?,
        },
        Commands::Sync { directory } => {
            let orchestrator = Orchestrator::new(
                db,
                connector,
                Arc::new(SmtpMailer::new()),
                config.app_base_url.clone(),
            )
            .with_lock_file(&config.lock_path);
            run_sync(&orchestrator, directory).await?;
        }
        Commands::QuickAdd { directory_id, guid } => {
            let resolver = QuickActionResolver::new(db, connector);
            run_quick_add(&resolver, directory_id, &guid).await?;
        }
        Commands::QuickUpdate { directory_id, guid } => {
            let resolver = QuickActionResolver::new(db, connector);
            run_quick_update(&resolver, directory_id, &guid).await?;
        }
    }

    Ok(())
}
