use std::{path::PathBuf, time};

use serde::Deserialize;
use serde_with::serde_as;

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct IndexerSettings {
    /// Path to the networks/contracts configuration document (§ config format).
    pub config_file: PathBuf,

    /// Directory holding the ABI documents referenced by the config file.
    pub abi_dir: PathBuf,

    /// Fixed block span fetched per `eth_getLogs` window.
    pub window_size: u64,

    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub tail_delay: time::Duration,

    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub error_backoff: time::Duration,

    pub event_queue_size: usize,

    pub handler_queue_size: usize,

    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub block_cache_ttl: time::Duration,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("config/indexer.json"),
            abi_dir: PathBuf::from("config/abis"),
            window_size: 37,
            tail_delay: time::Duration::from_secs(20),
            error_backoff: time::Duration::from_secs(5),
            event_queue_size: 10,
            handler_queue_size: 200,
            block_cache_ttl: time::Duration::from_secs(5),
        }
    }
}
