use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;

use swap_points_indexer_logic::{
    handlers::{Erc20ActivityHandler, HandlerRegistry, UsdcWethSwapHandler},
    indexer::Indexer,
    service::Service,
};

use crate::Settings;

/// Registers every event handler. Keys follow
/// `{contract}:{network}:{event}` from the configuration document; events
/// listed there without a handler stay inert.
fn handler_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    let erc20 = Arc::new(Erc20ActivityHandler);
    registry.register("UniswapV2", "mainnet", "Swap", Arc::new(UsdcWethSwapHandler));
    registry.register("USDC", "mainnet", "Transfer", erc20.clone());
    registry.register("USDC", "base", "Approval", erc20);
    registry
}

pub fn start(
    settings: &Settings,
    db: Arc<DatabaseConnection>,
    shutdown: CancellationToken,
) -> anyhow::Result<Indexer> {
    let registry = handler_registry();
    tracing::info!(handlers = registry.len(), "starting indexer");
    Indexer::start(&settings.indexer, &registry, Service::new(db), shutdown)
}
