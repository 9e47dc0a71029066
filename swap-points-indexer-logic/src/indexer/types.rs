use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, U256},
    rpc::types::{Block, Log, Transaction},
};
use tokio_util::sync::CancellationToken;

use crate::handlers::{EventHandler, HandlerContext};

/// One fetch window worth of raw logs plus every block body they reference,
/// keyed by block number. Filled by the fetcher, consumed once by the
/// processor.
pub struct EventsTask {
    pub network: String,
    pub logs: Vec<Log>,
    pub blocks: HashMap<u64, Arc<Block>>,
}

/// A decoded event paired with its handler, ready for serial execution.
pub struct HandlerTask {
    pub network: String,
    pub block_number: u64,
    pub handler: Arc<dyn EventHandler>,
    pub context: HandlerContext,
    pub event: Event,
}

/// A decoded log as seen by handlers.
#[derive(Clone)]
pub struct Event {
    pub contract_name: String,
    pub event_name: String,
    pub network: String,
    pub contract_address: Address,
    /// Every declared parameter, indexed and non-indexed.
    pub args: BTreeMap<String, DynSolValue>,
    pub transaction_hash: B256,
    pub block_hash: B256,
    pub block: Arc<Block>,
    /// The originating transaction, resolved from the block body.
    pub transaction: Option<Transaction>,
    /// Child of the per-network token; handlers must return promptly once
    /// it is cancelled.
    pub cancellation: CancellationToken,
}

impl Event {
    /// The dispatch key: `{contract}:{network}:{event}`.
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.contract_name, self.network, self.event_name
        )
    }

    pub fn block_number(&self) -> u64 {
        self.block.header.number
    }

    pub fn block_timestamp(&self) -> u64 {
        self.block.header.timestamp
    }

    pub fn arg(&self, name: &str) -> Option<&DynSolValue> {
        self.args.get(name)
    }

    pub fn arg_address(&self, name: &str) -> Option<Address> {
        self.args.get(name).and_then(DynSolValue::as_address)
    }

    pub fn arg_uint(&self, name: &str) -> Option<U256> {
        self.args
            .get(name)
            .and_then(DynSolValue::as_uint)
            .map(|(value, _)| value)
    }
}
