pub mod abi;
pub mod client;
pub mod config;
mod fetcher;
#[cfg(test)]
pub(crate) mod mock;
mod processor;
pub mod settings;
mod types;
mod worker;

pub use settings::IndexerSettings;
pub use types::{Event, EventsTask, HandlerTask};

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::{sync::mpsc, task::JoinSet, time::error::Elapsed};
use tokio_util::sync::CancellationToken;

use crate::{
    handlers::{HandlerContext, HandlerRegistry},
    service::Service,
};
use client::{ChainClient, RpcClient};
use config::{EventConfigTable, IndexerConfig};
use fetcher::BlockFetcher;
use processor::LogProcessor;
use worker::TaskWorker;

/// The running engine: one fetcher/processor/worker triple per configured
/// network, all children of a single cancellation token.
pub struct Indexer {
    shutdown: CancellationToken,
    tasks: JoinSet<()>,
}

impl Indexer {
    /// Loads the configuration document, connects the per-network clients
    /// and spawns every pipeline. Configuration problems are fatal here;
    /// runtime RPC failures are retried inside the fetchers and never
    /// terminate the engine.
    pub fn start(
        settings: &IndexerSettings,
        handlers: &HandlerRegistry,
        service: Service,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        let config = IndexerConfig::from_file(&settings.config_file)
            .context("failed to load indexer config")?;
        let table = Arc::new(
            EventConfigTable::build(&config, &settings.abi_dir, handlers)
                .context("failed to build event config table")?,
        );

        let mut clients: HashMap<String, Arc<dyn ChainClient>> = HashMap::new();
        for network in table.networks() {
            let network_config = config
                .networks
                .get(&network)
                .with_context(|| format!("network configuration not found: {network}"))?;
            let client = RpcClient::new(
                &network,
                &network_config.rpc_url,
                settings.block_cache_ttl,
            )
            .with_context(|| format!("failed to connect to network {network}"))?;
            clients.insert(network, Arc::new(client));
        }

        Ok(Self::start_networks(
            table, clients, settings, service, shutdown,
        ))
    }

    pub(crate) fn start_networks(
        table: Arc<EventConfigTable>,
        clients: HashMap<String, Arc<dyn ChainClient>>,
        settings: &IndexerSettings,
        service: Service,
        shutdown: CancellationToken,
    ) -> Self {
        let mut tasks = JoinSet::new();

        for network in table.networks() {
            let Some(client) = clients.get(&network).cloned() else {
                tracing::error!(network = %network, "no client for network, skipping");
                continue;
            };
            let Some(params) = table.fetch_params(&network) else {
                continue;
            };

            tracing::info!(
                network = %network,
                min_start_block = params.min_start_block,
                finality_lag = params.finality_lag,
                watched = params.watched_addresses.len(),
                "starting network pipeline"
            );

            let (events_tx, events_rx) = mpsc::channel(settings.event_queue_size);
            let (handlers_tx, handlers_rx) = mpsc::channel(settings.handler_queue_size);
            let network_token = shutdown.child_token();
            let context = HandlerContext::new(client.clone(), service.clone());

            tasks.spawn(
                BlockFetcher {
                    network: network.clone(),
                    client,
                    params,
                    window_size: settings.window_size,
                    tail_delay: settings.tail_delay,
                    error_backoff: settings.error_backoff,
                    events_tx,
                    shutdown: network_token.clone(),
                }
                .run(),
            );
            tasks.spawn(
                LogProcessor {
                    network: network.clone(),
                    table: table.clone(),
                    context,
                    events_rx,
                    handlers_tx,
                    shutdown: network_token.clone(),
                }
                .run(),
            );
            tasks.spawn(
                TaskWorker {
                    network,
                    handlers_rx,
                    shutdown: network_token,
                }
                .run(),
            );
        }

        Self { shutdown, tasks }
    }

    /// Cancels every pipeline and joins the tasks within `timeout`.
    pub async fn shutdown(mut self, timeout: Duration) -> Result<(), Elapsed> {
        self.shutdown.cancel();
        tokio::time::timeout(timeout, async {
            while self.tasks.join_next().await.is_some() {}
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc, time::Duration};

    use alloy::json_abi::Event as AbiEvent;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::indexer::{
        config::EventConfig,
        mock::{make_block, transfer_log, MockChainClient, RecordingHandler},
    };

    fn transfer_table(
        client: &MockChainClient,
        handler: Arc<RecordingHandler>,
    ) -> EventConfigTable {
        let event =
            AbiEvent::parse("event Transfer(address indexed from, address indexed to, uint256 value)")
                .unwrap();
        let topic0 = abi::event_topic0(&event);
        EventConfigTable::from_configs([EventConfig {
            contract_name: "Token".to_string(),
            network: "mainnet".to_string(),
            event_name: "Transfer".to_string(),
            address: client.watched_address(),
            event,
            topic0,
            start_block: 100,
            finality_block_count: 20,
            handler: Some(handler),
        }])
    }

    fn test_settings() -> IndexerSettings {
        IndexerSettings {
            tail_delay: Duration::from_secs(60),
            error_backoff: Duration::from_millis(10),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn delivers_logs_end_to_end_and_shuts_down() {
        let client = Arc::new(MockChainClient::new("mainnet"));
        client.set_head(200);
        let (block_110, hash_110) = make_block(110, 1_700_000_110);
        let (block_130, hash_130) = make_block(130, 1_700_000_130);
        client.put_block(hash_110, block_110);
        client.put_block(hash_130, block_130);
        client.push_log(transfer_log(client.watched_address(), 110, hash_110, 0));
        client.push_log(transfer_log(client.watched_address(), 130, hash_130, 1));

        let handler = Arc::new(RecordingHandler::default());
        let table = Arc::new(transfer_table(&client, handler.clone()));
        let mut clients: HashMap<String, Arc<dyn client::ChainClient>> = HashMap::new();
        clients.insert("mainnet".to_string(), client);

        let indexer = Indexer::start_networks(
            table,
            clients,
            &test_settings(),
            crate::indexer::mock::mock_context().service,
            CancellationToken::new(),
        );

        // handler invocations arrive in block order
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while handler.invocations().len() < 2 {
            assert!(tokio::time::Instant::now() < deadline, "pipeline stalled");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(handler.invocations(), vec![110, 130]);

        // graceful shutdown joins every task within the bound
        indexer.shutdown(Duration::from_secs(2)).await.unwrap();
    }
}
