use std::{collections::HashMap, sync::Arc, time::Duration};

use alloy::primitives::B256;
use futures::future::try_join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{
    client::{ChainClient, ClientError},
    config::FetchParams,
    types::EventsTask,
};

/// Walks one network from the configured minimum start block towards
/// `head - finality_lag` in fixed-size windows, producing one `EventsTask`
/// per window.
pub(crate) struct BlockFetcher {
    pub network: String,
    pub client: Arc<dyn ChainClient>,
    pub params: FetchParams,
    pub window_size: u64,
    pub tail_delay: Duration,
    pub error_backoff: Duration,
    pub events_tx: mpsc::Sender<EventsTask>,
    pub shutdown: CancellationToken,
}

impl BlockFetcher {
    pub async fn run(self) {
        let mut cursor = self.params.min_start_block;
        'outer: loop {
            if self.shutdown.is_cancelled() {
                return;
            }

            let head = match self.client.latest_block_number().await {
                Ok(head) => head,
                Err(err) => {
                    tracing::error!(
                        network = %self.network,
                        err = ?err,
                        "failed to fetch latest block number"
                    );
                    if !self.sleep(self.error_backoff).await {
                        return;
                    }
                    continue;
                }
            };
            let safe_head = head.saturating_sub(self.params.finality_lag);

            if safe_head < cursor {
                tracing::debug!(
                    network = %self.network,
                    cursor,
                    safe_head,
                    "waiting for new blocks"
                );
                if !self.sleep(self.tail_delay).await {
                    return;
                }
                continue;
            }

            while cursor <= safe_head {
                let end_block = (cursor + self.window_size).min(safe_head);
                match self.fetch_window(cursor, end_block).await {
                    Ok(task) => {
                        let logs = task.logs.len();
                        tokio::select! {
                            biased;
                            _ = self.shutdown.cancelled() => return,
                            sent = self.events_tx.send(task) => {
                                if sent.is_err() {
                                    return;
                                }
                            }
                        }
                        tracing::info!(
                            network = %self.network,
                            from_block = cursor,
                            to_block = end_block,
                            logs,
                            "fetched window"
                        );
                        cursor = end_block + 1;
                    }
                    Err(err) => {
                        // the cursor does not advance past a failed window
                        tracing::error!(
                            network = %self.network,
                            from_block = cursor,
                            to_block = end_block,
                            err = ?err,
                            "failed to fetch window, retrying"
                        );
                        if !self.sleep(self.error_backoff).await {
                            return;
                        }
                        continue 'outer;
                    }
                }
            }

            if !self.sleep(self.tail_delay).await {
                return;
            }
        }
    }

    /// Fetches the window's logs and resolves every distinct referenced
    /// block body concurrently; any body failure abandons the whole window.
    async fn fetch_window(&self, from_block: u64, to_block: u64) -> Result<EventsTask, ClientError> {
        let logs = self
            .client
            .filter_logs(from_block, to_block, &self.params.watched_addresses)
            .await?;

        let mut wanted: HashMap<u64, B256> = HashMap::new();
        for log in &logs {
            if let (Some(number), Some(hash)) = (log.block_number, log.block_hash) {
                wanted.entry(number).or_insert(hash);
            }
        }

        let fetches = wanted.into_iter().map(|(number, hash)| {
            let client = Arc::clone(&self.client);
            async move { client.block_by_hash(hash).await.map(|block| (number, block)) }
        });
        let blocks = try_join_all(fetches).await?.into_iter().collect();

        Ok(EventsTask {
            network: self.network.clone(),
            logs,
            blocks,
        })
    }

    /// Cancellable sleep; false once shutdown fired.
    async fn sleep(&self, period: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(period) => true,
        }
    }
}
