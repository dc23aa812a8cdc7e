use jobflow_backend::{
    config::{init_config, LogFormat, StoreBackend},
    database::pool::{create_pool, run_migrations},
    error::Error,
    routes,
    services::{job_store::JobStore, memory_store::InMemoryJobStore, pg_store::PgJobStore},
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = init_config()?;
    init_tracing(config.log_format);

    let store: Arc<dyn JobStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| Error::Config("DATABASE_URL is not set".to_string()))?;
            let pool = create_pool(database_url).await?;
            run_migrations(&pool).await?;
            info!("Connected to Postgres and applied migrations");
            Arc::new(PgJobStore::new(pool))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory job store; data is lost on restart");
            Arc::new(InMemoryJobStore::new())
        }
    };

    let app_state = AppState::new(store, config)?;
    let app = routes::router(app_state);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}
