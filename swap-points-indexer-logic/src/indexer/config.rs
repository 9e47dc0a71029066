use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use alloy::{
    json_abi::Event as AbiEvent,
    primitives::{Address, B256},
};
use serde::Deserialize;
use thiserror::Error;

use super::abi::{self, AbiError, AbiRegistry};
use crate::handlers::{EventHandler, HandlerRegistry};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config document {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("network configuration not found for contract {contract}: {network}")]
    UnknownNetwork { contract: String, network: String },
    #[error(transparent)]
    Abi(#[from] AbiError),
}

/// The engine configuration document: two top-level maps, `networks` and
/// `contracts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexerConfig {
    pub networks: HashMap<String, NetworkConfig>,
    pub contracts: HashMap<String, ContractConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    pub rpc_url: String,
    #[serde(rename = "finalityBlockCount")]
    pub finality_block_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractConfig {
    /// Basename of an ABI document inside the assets directory.
    pub abi: String,
    #[serde(rename = "network")]
    pub networks: HashMap<String, ContractNetworkConfig>,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractNetworkConfig {
    pub address: Address,
    #[serde(rename = "startBlock")]
    pub start_block: u64,
}

impl IndexerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// One watched `(contract, network, event)` triple. Triples without a
/// handler stay in the table but are never dispatched.
pub struct EventConfig {
    pub contract_name: String,
    pub network: String,
    pub event_name: String,
    pub address: Address,
    pub event: AbiEvent,
    pub topic0: B256,
    pub start_block: u64,
    pub finality_block_count: u64,
    pub handler: Option<Arc<dyn EventHandler>>,
}

impl EventConfig {
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.contract_name, self.network, self.event_name
        )
    }
}

/// Per-network fetch parameters derived from the registered events.
#[derive(Debug, Clone)]
pub struct FetchParams {
    /// The maximum configured start block on the network; the fetcher never
    /// re-scans windows before the latest configured requirement.
    pub min_start_block: u64,
    pub finality_lag: u64,
    pub watched_addresses: Vec<Address>,
}

/// `network -> topic0 -> [EventConfig]`, built once at startup and read-only
/// afterwards.
#[derive(Default)]
pub struct EventConfigTable {
    by_network: HashMap<String, HashMap<B256, Vec<Arc<EventConfig>>>>,
}

impl EventConfigTable {
    pub fn build(
        config: &IndexerConfig,
        abi_dir: &Path,
        handlers: &HandlerRegistry,
    ) -> Result<Self, ConfigError> {
        let mut registry = AbiRegistry::new();
        let mut configs = Vec::new();

        for (contract_name, contract) in &config.contracts {
            for (network_name, deployment) in &contract.networks {
                let network = config.networks.get(network_name).ok_or_else(|| {
                    ConfigError::UnknownNetwork {
                        contract: contract_name.clone(),
                        network: network_name.clone(),
                    }
                })?;

                for event_name in &contract.events {
                    let document = registry.load(abi_dir, &contract.abi)?;
                    let event = abi::resolve_event(document, event_name)?.clone();
                    let topic0 = abi::event_topic0(&event);
                    let handler = handlers
                        .get(&format!("{contract_name}:{network_name}:{event_name}"));

                    configs.push(EventConfig {
                        contract_name: contract_name.clone(),
                        network: network_name.clone(),
                        event_name: event_name.clone(),
                        address: deployment.address,
                        event,
                        topic0,
                        start_block: deployment.start_block,
                        finality_block_count: network.finality_block_count,
                        handler,
                    });
                }
            }
        }

        Ok(Self::from_configs(configs))
    }

    pub fn from_configs(configs: impl IntoIterator<Item = EventConfig>) -> Self {
        let mut by_network: HashMap<String, HashMap<B256, Vec<Arc<EventConfig>>>> = HashMap::new();
        for config in configs {
            by_network
                .entry(config.network.clone())
                .or_default()
                .entry(config.topic0)
                .or_default()
                .push(Arc::new(config));
        }
        Self { by_network }
    }

    pub fn networks(&self) -> Vec<String> {
        self.by_network.keys().cloned().collect()
    }

    pub fn lookup(&self, network: &str, topic0: &B256) -> &[Arc<EventConfig>] {
        self.by_network
            .get(network)
            .and_then(|topics| topics.get(topic0))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn fetch_params(&self, network: &str) -> Option<FetchParams> {
        let topics = self.by_network.get(network)?;
        let configs = || topics.values().flatten();

        let min_start_block = configs().map(|c| c.start_block).max()?;
        let finality_lag = configs()
            .map(|c| c.finality_block_count)
            .max()
            .unwrap_or_default();
        let watched_addresses: Vec<Address> = configs()
            .map(|c| c.address)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Some(FetchParams {
            min_start_block,
            finality_lag,
            watched_addresses,
        })
    }
}
