use std::{future::Future, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::watch;

use super::ServiceError;

type Slot<T> = watch::Receiver<Option<Result<T, Arc<ServiceError>>>>;

/// Keyed in-flight registry: the first caller for a key runs the work,
/// every concurrent caller for the same key awaits and shares its result.
/// The entry is removed once the execution completes, so later calls run
/// fresh.
pub struct Group<T: Clone> {
    inflight: DashMap<String, Slot<T>>,
}

impl<T: Clone> Default for Group<T> {
    fn default() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }
}

impl<T: Clone> Group<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut work = Some(work);
        loop {
            // Either install a fresh slot (leader) or pick up the existing
            // one (follower). The shard lock must not be held across awaits.
            let role = match self.inflight.entry(key.to_string()) {
                Entry::Occupied(entry) => Err(entry.get().clone()),
                Entry::Vacant(entry) => {
                    let (tx, rx) = watch::channel(None);
                    entry.insert(rx);
                    Ok(tx)
                }
            };

            match role {
                Ok(tx) => {
                    let work = work.take().expect("leader role is taken at most once");
                    let result = work().await;
                    self.inflight.remove(key);
                    return match result {
                        Ok(value) => {
                            let _ = tx.send(Some(Ok(value.clone())));
                            Ok(value)
                        }
                        Err(err) => {
                            let err = Arc::new(err);
                            let _ = tx.send(Some(Err(err.clone())));
                            Err(ServiceError::Shared(err))
                        }
                    };
                }
                Err(mut rx) => {
                    loop {
                        if let Some(result) = rx.borrow().clone() {
                            return result.map_err(ServiceError::Shared);
                        }
                        if rx.changed().await.is_err() {
                            // the leader was dropped without publishing;
                            // clear the stale slot and start over
                            self.inflight.remove(key);
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::join_all;

    use super::*;

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let group = Arc::new(Group::<u64>::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let calls = (0..50).map(|_| {
            let group = group.clone();
            let executions = executions.clone();
            async move {
                group
                    .run("0xabc", || async {
                        executions.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                        Ok(42)
                    })
                    .await
            }
        });
        let results = join_all(calls).await;

        assert_eq!(executions.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), 42);
        }
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let group = Arc::new(Group::<u64>::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let calls = (0..10u64).map(|i| {
            let group = group.clone();
            let executions = executions.clone();
            async move {
                group
                    .run(&format!("0x{i}"), || async {
                        executions.fetch_add(1, Ordering::SeqCst);
                        Ok(i)
                    })
                    .await
                    .unwrap()
            }
        });
        let results = join_all(calls).await;

        assert_eq!(executions.load(Ordering::SeqCst), 10);
        assert_eq!(results, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn sequential_calls_run_fresh() {
        let group = Group::<u64>::new();
        let executions = AtomicUsize::new(0);

        for _ in 0..3 {
            group
                .run("0xabc", || async {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .await
                .unwrap();
        }
        assert_eq!(executions.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn errors_are_shared_with_followers() {
        let group = Arc::new(Group::<u64>::new());

        let calls = (0..4).map(|_| {
            let group = group.clone();
            async move {
                group
                    .run("0xabc", || async {
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Err(ServiceError::AccountNotFound)
                    })
                    .await
            }
        });
        for result in join_all(calls).await {
            assert!(matches!(result, Err(ServiceError::Shared(_))));
        }
    }
}
