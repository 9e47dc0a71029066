use std::{sync::Arc, time::Duration};

use alloy::{
    network::Ethereum,
    primitives::{Address, Bytes, B256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{Block, Filter, Log, Transaction, TransactionRequest},
};
use async_trait::async_trait;
use moka::future::Cache;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("rpc transport error: {0}")]
    Transport(String),
    #[error("block {0} not found")]
    BlockNotFound(B256),
}

/// Typed RPC view of a single network.
///
/// Transport failures are retryable from the engine's point of view: the
/// fetcher abandons the affected window and re-enters its loop after a
/// backoff.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    fn network(&self) -> &str;

    async fn latest_block_number(&self) -> Result<u64, ClientError>;

    /// Logs in `[from_block, to_block]` (inclusive, `from == to` allowed)
    /// emitted by any of `addresses`, in the order returned by the endpoint.
    async fn filter_logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &[Address],
    ) -> Result<Vec<Log>, ClientError>;

    /// Block header plus full transaction list.
    async fn block_by_hash(&self, hash: B256) -> Result<Arc<Block>, ClientError>;

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<Transaction>, ClientError>;

    /// Executes a read-only call at a historical block.
    async fn call_contract(
        &self,
        to: Address,
        call_data: Bytes,
        at_block: u64,
    ) -> Result<Bytes, ClientError>;
}

/// Production `ChainClient` over an HTTP JSON-RPC endpoint.
///
/// Block bodies are cached with a short TTL keyed by `network:hash`;
/// `try_get_with` collapses concurrent misses for the same key into one
/// origin call and never caches errors.
pub struct RpcClient {
    network: String,
    provider: DynProvider<Ethereum>,
    block_cache: Cache<String, Arc<Block>>,
}

impl RpcClient {
    pub fn new(network: &str, rpc_url: &str, block_cache_ttl: Duration) -> anyhow::Result<Self> {
        let url = rpc_url.parse()?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self::with_provider(network, provider, block_cache_ttl))
    }

    pub fn with_provider(
        network: &str,
        provider: DynProvider<Ethereum>,
        block_cache_ttl: Duration,
    ) -> Self {
        Self {
            network: network.to_string(),
            provider,
            block_cache: Cache::builder()
                .max_capacity(1024)
                .time_to_live(block_cache_ttl)
                .build(),
        }
    }

    fn cache_key(&self, hash: &B256) -> String {
        format!("{}:{:#x}", self.network, hash)
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    fn network(&self) -> &str {
        &self.network
    }

    async fn latest_block_number(&self) -> Result<u64, ClientError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn filter_logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &[Address],
    ) -> Result<Vec<Log>, ClientError> {
        let filter = Filter::new()
            .address(addresses.to_vec())
            .from_block(from_block)
            .to_block(to_block);
        self.provider
            .get_logs(&filter)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn block_by_hash(&self, hash: B256) -> Result<Arc<Block>, ClientError> {
        self.block_cache
            .try_get_with(self.cache_key(&hash), async {
                self.provider
                    .get_block_by_hash(hash)
                    .full()
                    .await
                    .map_err(|e| ClientError::Transport(e.to_string()))?
                    .map(Arc::new)
                    .ok_or(ClientError::BlockNotFound(hash))
            })
            .await
            .map_err(|e: Arc<ClientError>| (*e).clone())
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<Transaction>, ClientError> {
        self.provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn call_contract(
        &self,
        to: Address,
        call_data: Bytes,
        at_block: u64,
    ) -> Result<Bytes, ClientError> {
        let tx = TransactionRequest::default().to(to).input(call_data.into());
        self.provider
            .call(tx)
            .block(at_block.into())
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}
