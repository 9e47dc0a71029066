use std::{sync::Arc, time::Duration};

use blockscout_service_launcher::{database, launcher::ConfigSettings};
use migration::Migrator;
use tokio_util::sync::CancellationToken;

mod indexer;
mod settings;

pub use settings::Settings;

const SERVICE_NAME: &str = "swap_points_indexer";

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // the conventional variable feeds the layered settings
    if let Ok(database_url) = std::env::var("DATABASE_URL") {
        std::env::set_var("SWAP_POINTS_INDEXER__DATABASE__CONNECT__URL", database_url);
    }

    let settings = Settings::build().expect("failed to read config");

    blockscout_service_launcher::tracing::init_logs(
        SERVICE_NAME,
        &settings.tracing,
        &settings.jaeger,
    )?;

    let database_url = settings.database.connect.clone().url();
    let db_connection = database::initialize_postgres::<Migrator>(
        &database_url,
        settings.database.create_database,
        settings.database.run_migrations,
    )
    .await?;

    let shutdown = CancellationToken::new();
    let indexer = indexer::start(&settings, Arc::new(db_connection), shutdown.clone())?;

    wait_for_shutdown_signal().await?;
    tracing::info!("shutdown signal received, stopping pipelines");
    if indexer.shutdown(SHUTDOWN_TIMEOUT).await.is_err() {
        tracing::warn!("indexer tasks did not finish within the shutdown timeout");
    }

    Ok(())
}

async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
