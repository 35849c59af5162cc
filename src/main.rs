use std::sync::Arc;

use acas::{
    api::{router, AppState},
    auth::AuthState,
    config::{CliArgs, Config, StorageKind},
    Services,
};
use acas_core::{StorageBackend, Store};
use acas_memory::InMemoryStorage;
use acas_sqlite::SqliteStorage;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "ACAS terminated");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let backend: Arc<dyn StorageBackend> = match config.storage.backend {
        StorageKind::Memory => {
            tracing::info!("Using in-memory storage");
            Arc::new(InMemoryStorage::new())
        }
        StorageKind::Sqlite => {
            tracing::info!(path = %config.storage.path, "Using SQLite storage");
            Arc::new(SqliteStorage::new(&config.storage.path)?)
        }
    };
    let services = Services::new(Arc::new(Store::new(backend)));

    if let Some(ref admin) = config.auth.bootstrap_admin {
        services
            .system
            .ensure_bootstrap_admin(&admin.username, &admin.password)?;
    }
    if config.auth.enabled && config.auth.jwt_secret == "change-me" {
        tracing::warn!("Authentication is enabled with the default JWT secret");
    }

    let metrics = PrometheusBuilder::new().install_recorder()?;
    let auth = Arc::new(AuthState::new(&config.auth, services.system.clone())?);
    let app = router(AppState {
        services,
        auth,
        metrics: Some(metrics),
    });

    let addr = config.listen_addr()?;
    tracing::info!(%addr, auth = config.auth.enabled, "ACAS API listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
