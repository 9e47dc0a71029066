use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::types::HandlerTask;

/// Invokes handlers serially per network. Handler failures are logged with
/// the event's identifying fields and swallowed; the pipeline continues.
pub(crate) struct TaskWorker {
    pub network: String,
    pub handlers_rx: mpsc::Receiver<HandlerTask>,
    pub shutdown: CancellationToken,
}

impl TaskWorker {
    pub async fn run(mut self) {
        loop {
            let task = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return,
                task = self.handlers_rx.recv() => match task {
                    Some(task) => task,
                    None => return,
                },
            };

            let event = &task.event;
            if let Err(err) = task.handler.handle(&task.context, event).await {
                tracing::error!(
                    network = %self.network,
                    event = %event.key(),
                    tx_hash = ?event.transaction_hash,
                    block_hash = ?event.block_hash,
                    err = ?err,
                    "event handler failed, skipping"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::indexer::mock::{make_handler_task, RecordingHandler};

    #[tokio::test]
    async fn runs_handlers_serially_and_isolates_failures() {
        let (handlers_tx, handlers_rx) = mpsc::channel(10);
        let shutdown = CancellationToken::new();
        let worker = TaskWorker {
            network: "mainnet".to_string(),
            handlers_rx,
            shutdown: shutdown.clone(),
        };

        let failing = Arc::new(RecordingHandler::failing());
        let recording = Arc::new(RecordingHandler::default());
        handlers_tx
            .send(make_handler_task(failing.clone(), 1, &shutdown))
            .await
            .unwrap();
        handlers_tx
            .send(make_handler_task(recording.clone(), 2, &shutdown))
            .await
            .unwrap();
        drop(handlers_tx);

        worker.run().await;

        assert_eq!(failing.invocations(), vec![1]);
        assert_eq!(recording.invocations(), vec![2]);
    }

    #[tokio::test]
    async fn cancelled_worker_dequeues_nothing_further() {
        let (handlers_tx, handlers_rx) = mpsc::channel(10);
        let shutdown = CancellationToken::new();
        let worker = TaskWorker {
            network: "mainnet".to_string(),
            handlers_rx,
            shutdown: shutdown.clone(),
        };

        let recording = Arc::new(RecordingHandler::default());
        for block_number in 1..=5 {
            handlers_tx
                .send(make_handler_task(recording.clone(), block_number, &shutdown))
                .await
                .unwrap();
        }

        shutdown.cancel();
        let joined = tokio::time::timeout(Duration::from_secs(1), worker.run()).await;
        assert!(joined.is_ok());
        assert!(recording.invocations().is_empty());
    }
}
