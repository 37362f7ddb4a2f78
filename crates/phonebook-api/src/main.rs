mod config;
mod error;
mod routes;
mod scheduler;

use std::sync::Arc;

use config::AppConfig;
use phonebook_core::directory::LdapConnector;
use phonebook_core::notify::SmtpMailer;
use phonebook_core::quick_action::QuickActionResolver;
use phonebook_core::services::DatabaseService;
use phonebook_core::sync::Orchestrator;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("phonebook_api=info".parse()?)
                .add_directive("phonebook_core=info".parse()?),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!("Starting phonebook-api with config: {:?}", config);

    let db = DatabaseService::open_path(&config.sync.db_path)?;
    let connector = Arc::new(LdapConnector::new(config.sync.directory_timeout));

    if config.sync.sync_enabled {
        let orchestrator = Orchestrator::new(
            db.clone(),
            connector.clone(),
            Arc::new(SmtpMailer::new()),
            config.sync.app_base_url.clone(),
        )
        .with_lock_file(&config.sync.lock_path);
        scheduler::spawn(orchestrator, config.sync.sync_interval);
    } else {
        tracing::info!("Scheduled sync disabled");
    }

    let router = app_router(AppState::new(QuickActionResolver::new(db, connector)));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("phonebook-api listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
