mod erc20;
mod uniswap_v2;

pub use erc20::Erc20ActivityHandler;
pub use uniswap_v2::UsdcWethSwapHandler;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

use crate::{
    indexer::{client::ChainClient, Event},
    service::Service,
};

/// User code invoked for every decoded event of a registered
/// `(contract, network, event)` triple.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext, event: &Event) -> anyhow::Result<()>;
}

/// Per-task runtime view handed to handlers: read access to the network's
/// chain client plus the full service layer. Cheap to clone.
#[derive(Clone)]
pub struct HandlerContext {
    pub client: Arc<dyn ChainClient>,
    pub service: Service,
}

impl HandlerContext {
    pub fn new(client: Arc<dyn ChainClient>, service: Service) -> Self {
        Self { client, service }
    }
}

/// Handlers keyed by `{contract}:{network}:{event}`. Built once at startup;
/// triples without an entry stay inert.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        contract: &str,
        network: &str,
        event: &str,
        handler: Arc<dyn EventHandler>,
    ) -> &mut Self {
        self.handlers
            .insert(format!("{contract}:{network}:{event}"), handler);
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn EventHandler>> {
        self.handlers.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
