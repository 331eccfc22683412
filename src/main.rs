use std::{net::SocketAddr, sync::Arc};

use points_ledger_backend::{
    api,
    auth::AccessGate,
    catalog::TaskCatalog,
    config::{self, Config},
    db::PgLedger,
    AppState,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let env_file = config::load_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if !env_file {
        tracing::info!("No .env file found, using environment variables");
    }

    if let Err(e) = run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let ledger = PgLedger::connect(&config.database_url, config.max_connections).await?;
    ledger.migrate().await?;
    tracing::info!("Database ready");

    let state = AppState::new(
        Arc::new(ledger),
        TaskCatalog::default(),
        AccessGate::new(config.jwt_secret.as_bytes(), config.jwt_maxage_minutes),
    );
    let app = api::router(state, config.request_timeout);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server running at http://{addr}");

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
