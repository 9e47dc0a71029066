//! In-memory `ChainClient` and handler doubles for pipeline tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use alloy::{
    consensus::{transaction::Recovered, SignableTransaction, TxEnvelope, TxLegacy},
    dyn_abi::DynSolValue,
    json_abi::Event as AbiEvent,
    primitives::{address, Address, Bytes, LogData, Signature, TxKind, B256, U256},
    rpc::types::{Block, BlockTransactions, Header, Log, Transaction},
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{
    abi,
    client::{ChainClient, ClientError},
    types::{Event, HandlerTask},
};
use crate::{
    handlers::{EventHandler, HandlerContext},
    service::Service,
};

const WATCHED: Address = address!("00000000000000000000000000000000000000aa");

pub(crate) struct MockChainClient {
    network: String,
    head: AtomicU64,
    logs: Mutex<Vec<Log>>,
    blocks: Mutex<HashMap<B256, Arc<Block>>>,
    filter_calls: Mutex<Vec<(u64, u64)>>,
    call_responses: Mutex<HashMap<[u8; 4], Bytes>>,
    fail_blocks: AtomicBool,
}

impl MockChainClient {
    pub fn new(network: &str) -> Self {
        Self {
            network: network.to_string(),
            head: AtomicU64::new(0),
            logs: Mutex::new(Vec::new()),
            blocks: Mutex::new(HashMap::new()),
            filter_calls: Mutex::new(Vec::new()),
            call_responses: Mutex::new(HashMap::new()),
            fail_blocks: AtomicBool::new(false),
        }
    }

    pub fn watched_address(&self) -> Address {
        WATCHED
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn push_log(&self, log: Log) {
        self.logs.lock().unwrap().push(log);
    }

    pub fn put_block(&self, hash: B256, block: Arc<Block>) {
        self.blocks.lock().unwrap().insert(hash, block);
    }

    pub fn put_call_response(&self, selector: [u8; 4], response: Bytes) {
        self.call_responses.lock().unwrap().insert(selector, response);
    }

    pub fn fail_blocks(&self, fail: bool) {
        self.fail_blocks.store(fail, Ordering::SeqCst);
    }

    pub fn filter_calls(&self) -> Vec<(u64, u64)> {
        self.filter_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn network(&self) -> &str {
        &self.network
    }

    async fn latest_block_number(&self) -> Result<u64, ClientError> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn filter_logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &[Address],
    ) -> Result<Vec<Log>, ClientError> {
        self.filter_calls.lock().unwrap().push((from_block, to_block));
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| {
                log.block_number
                    .map_or(false, |n| n >= from_block && n <= to_block)
                    && addresses.contains(&log.address())
            })
            .cloned()
            .collect())
    }

    async fn block_by_hash(&self, hash: B256) -> Result<Arc<Block>, ClientError> {
        if self.fail_blocks.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("mock block fetch failure".into()));
        }
        self.blocks
            .lock()
            .unwrap()
            .get(&hash)
            .cloned()
            .ok_or(ClientError::BlockNotFound(hash))
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<Transaction>, ClientError> {
        Ok(self.blocks.lock().unwrap().values().find_map(|block| {
            block
                .transactions
                .txns()
                .find(|tx| *tx.inner.tx_hash() == hash)
                .cloned()
        }))
    }

    async fn call_contract(
        &self,
        _to: Address,
        call_data: Bytes,
        _at_block: u64,
    ) -> Result<Bytes, ClientError> {
        let selector: [u8; 4] = call_data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| ClientError::Transport("call data too short".into()))?;
        self.call_responses
            .lock()
            .unwrap()
            .get(&selector)
            .cloned()
            .ok_or_else(|| ClientError::Transport("unexpected contract call".into()))
    }
}

pub(crate) fn block_hash_for(number: u64) -> B256 {
    B256::from(U256::from(number) + U256::from(0x1000u64))
}

pub(crate) fn make_block(number: u64, timestamp: u64) -> (Arc<Block>, B256) {
    let hash = block_hash_for(number);
    let block = Block {
        header: Header {
            hash,
            inner: alloy::consensus::Header {
                number,
                timestamp,
                ..Default::default()
            },
            total_difficulty: None,
            size: None,
        },
        uncles: vec![],
        transactions: BlockTransactions::Full(vec![]),
        withdrawals: None,
    };
    (Arc::new(block), hash)
}

/// A block carrying one legacy transaction sent by `from`; returns the
/// block, its hash and the transaction hash.
pub(crate) fn make_block_with_tx(
    number: u64,
    timestamp: u64,
    from: Address,
    nonce: u64,
) -> (Arc<Block>, B256, B256) {
    let hash = block_hash_for(number);
    let tx = TxLegacy {
        chain_id: Some(1),
        nonce,
        gas_price: 1,
        gas_limit: 21_000,
        to: TxKind::Call(Address::ZERO),
        value: U256::ZERO,
        input: Bytes::new(),
    };
    let signature = Signature::new(U256::from(1), U256::from(1), false);
    let signed = tx.into_signed(signature);
    let tx_hash = *signed.hash();
    let transaction = Transaction {
        inner: Recovered::new_unchecked(TxEnvelope::Legacy(signed), from),
        block_hash: Some(hash),
        block_number: Some(number),
        transaction_index: Some(0),
        effective_gas_price: None,
    };
    let block = Block {
        header: Header {
            hash,
            inner: alloy::consensus::Header {
                number,
                timestamp,
                ..Default::default()
            },
            total_difficulty: None,
            size: None,
        },
        uncles: vec![],
        transactions: BlockTransactions::Full(vec![transaction]),
        withdrawals: None,
    };
    (Arc::new(block), hash, tx_hash)
}

pub(crate) fn make_log(address: Address, block_number: u64, block_hash: B256, index: u64) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address,
            data: LogData::new_unchecked(vec![B256::ZERO], Bytes::new()),
        },
        block_hash: Some(block_hash),
        block_number: Some(block_number),
        block_timestamp: None,
        transaction_hash: Some(B256::with_last_byte((index + 1) as u8)),
        transaction_index: Some(index),
        log_index: Some(index),
        removed: false,
    }
}

/// A well-formed ERC-20 Transfer log emitted by `address`.
pub(crate) fn transfer_log(
    address: Address,
    block_number: u64,
    block_hash: B256,
    index: u64,
) -> Log {
    let event =
        AbiEvent::parse("event Transfer(address indexed from, address indexed to, uint256 value)")
            .unwrap();
    let from = Address::with_last_byte(0x11);
    let to = Address::with_last_byte(0x22);
    let topics = vec![
        abi::event_topic0(&event),
        from.into_word(),
        to.into_word(),
    ];
    let data = DynSolValue::Tuple(vec![DynSolValue::Uint(U256::from(1000), 256)])
        .abi_encode_params();
    Log {
        inner: alloy::primitives::Log {
            address,
            data: LogData::new_unchecked(topics, data.into()),
        },
        block_hash: Some(block_hash),
        block_number: Some(block_number),
        block_timestamp: None,
        transaction_hash: Some(B256::with_last_byte((index + 1) as u8)),
        transaction_index: Some(index),
        log_index: Some(index),
        removed: false,
    }
}

#[derive(Default)]
pub(crate) struct RecordingHandler {
    invocations: Mutex<Vec<u64>>,
    fail: bool,
}

impl RecordingHandler {
    pub fn failing() -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn invocations(&self) -> Vec<u64> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, _ctx: &HandlerContext, event: &Event) -> anyhow::Result<()> {
        self.invocations.lock().unwrap().push(event.block_number());
        if self.fail {
            anyhow::bail!("handler failed");
        }
        Ok(())
    }
}

pub(crate) fn mock_context() -> HandlerContext {
    let db = sea_orm::MockDatabase::new(sea_orm::DatabaseBackend::Postgres).into_connection();
    HandlerContext::new(
        Arc::new(MockChainClient::new("mainnet")),
        Service::new(Arc::new(db)),
    )
}

pub(crate) fn make_handler_task(
    handler: Arc<RecordingHandler>,
    block_number: u64,
    shutdown: &CancellationToken,
) -> HandlerTask {
    let (block, block_hash) = make_block(block_number, 1_700_000_000);
    let event = Event {
        contract_name: "TokenA".to_string(),
        event_name: "Transfer".to_string(),
        network: "mainnet".to_string(),
        contract_address: WATCHED,
        args: Default::default(),
        transaction_hash: B256::with_last_byte(1),
        block_hash,
        block,
        transaction: None,
        cancellation: shutdown.child_token(),
    };
    HandlerTask {
        network: "mainnet".to_string(),
        block_number,
        handler,
        context: mock_context(),
        event,
    }
}
