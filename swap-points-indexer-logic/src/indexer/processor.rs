use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{
    abi,
    config::EventConfigTable,
    types::{Event, EventsTask, HandlerTask},
};
use crate::handlers::HandlerContext;

/// Consumes `EventsTask`s, decodes and filters their logs, and produces one
/// `HandlerTask` per dispatchable log. Performs no I/O and never blocks on
/// the handler itself.
pub(crate) struct LogProcessor {
    pub network: String,
    pub table: Arc<EventConfigTable>,
    pub context: HandlerContext,
    pub events_rx: mpsc::Receiver<EventsTask>,
    pub handlers_tx: mpsc::Sender<HandlerTask>,
    pub shutdown: CancellationToken,
}

impl LogProcessor {
    pub async fn run(mut self) {
        loop {
            let task = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return,
                task = self.events_rx.recv() => match task {
                    Some(task) => task,
                    None => return,
                },
            };
            if !self.process(task).await {
                return;
            }
        }
    }

    async fn process(&mut self, task: EventsTask) -> bool {
        for log in &task.logs {
            let Some(topic0) = log.topic0() else {
                continue;
            };

            for config in self.table.lookup(&self.network, topic0) {
                let Some(handler) = config.handler.clone() else {
                    continue;
                };
                if log.address() != config.address {
                    continue;
                }
                let Some(block_number) = log.block_number else {
                    continue;
                };
                if block_number < config.start_block {
                    continue;
                }

                let args = match abi::decode_event(&config.event, log.data().topics(), &log.data().data)
                {
                    Ok(args) => args,
                    Err(err) => {
                        tracing::warn!(
                            network = %self.network,
                            event = %config.key(),
                            tx_hash = ?log.transaction_hash,
                            err = ?err,
                            "failed to decode log, skipping"
                        );
                        continue;
                    }
                };

                let Some(block) = task.blocks.get(&block_number).cloned() else {
                    tracing::error!(
                        network = %self.network,
                        block_number,
                        "block body missing for log, skipping"
                    );
                    continue;
                };

                let transaction_hash = log.transaction_hash.unwrap_or_default();
                let transaction = block
                    .transactions
                    .txns()
                    .find(|tx| *tx.inner.tx_hash() == transaction_hash)
                    .cloned();

                let event = Event {
                    contract_name: config.contract_name.clone(),
                    event_name: config.event_name.clone(),
                    network: self.network.clone(),
                    contract_address: config.address,
                    args,
                    transaction_hash,
                    block_hash: log.block_hash.unwrap_or_default(),
                    block,
                    transaction,
                    cancellation: self.shutdown.child_token(),
                };
                let handler_task = HandlerTask {
                    network: self.network.clone(),
                    block_number,
                    handler,
                    context: self.context.clone(),
                    event,
                };

                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => return false,
                    sent = self.handlers_tx.send(handler_task) => {
                        if sent.is_err() {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }
}
