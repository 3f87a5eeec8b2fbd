//! Per-key sharing of outstanding futures.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};

pub type SharedResult<V> = Shared<BoxFuture<'static, V>>;

/// Joins concurrent requests for the same key onto one future.
///
/// The entry is removed when the future completes, so the next request after
/// completion starts a fresh one. Every waiter observes the same output,
/// success or failure.
pub struct InFlight<K, V> {
    pending: Arc<Mutex<HashMap<K, SharedResult<V>>>>,
}

impl<K, V> Default for InFlight<K, V> {
    fn default() -> Self {
        Self {
            pending: Arc::default(),
        }
    }
}

impl<K, V> Clone for InFlight<K, V> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<K: Debug, V> Debug for InFlight<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let pending = self.pending.lock().expect("in-flight lock is not poisoned");
        f.debug_struct("InFlight")
            .field("keys", &pending.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the outstanding future for `key`, or starts one from `start`.
    ///
    /// `start` is only invoked when nothing is outstanding.
    pub fn join_or_start<F, Fut>(&self, key: K, start: F) -> SharedResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut pending = self.pending.lock().expect("in-flight lock is not poisoned");
        if let Some(existing) = pending.get(&key) {
            return existing.clone();
        }

        let registry = Arc::clone(&self.pending);
        let cleanup_key = key.clone();
        let work = start();
        let shared = async move {
            let output = work.await;
            registry
                .lock()
                .expect("in-flight lock is not poisoned")
                .remove(&cleanup_key);
            output
        }
        .boxed()
        .shared();

        pending.insert(key, shared.clone());
        shared
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending
            .lock()
            .expect("in-flight lock is not poisoned")
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().expect("in-flight lock is not poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let inflight: InFlight<&'static str, Result<u32, String>> = InFlight::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let start = |runs: Arc<AtomicUsize>| {
            move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<u32, String>(7)
            }
        };
        let first = inflight.join_or_start("snapshot", start(runs.clone()));
        let second = inflight.join_or_start("snapshot", start(runs.clone()));

        let (a, b) = tokio::join!(first, second);

        assert_eq!(a, Ok(7));
        assert_eq!(b, Ok(7));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn failure_is_shared_and_entry_cleared() {
        let inflight: InFlight<u8, Result<u32, String>> = InFlight::new();

        let first = inflight.join_or_start(1, || async { Err(String::from("down")) });
        let second = inflight.join_or_start(1, || async { Ok(1) });
        assert!(inflight.is_pending(&1));

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, Err(String::from("down")));
        assert_eq!(b, Err(String::from("down")));

        let third = inflight.join_or_start(1, || async { Ok(3) }).await;
        assert_eq!(third, Ok(3));
    }

    #[tokio::test]
    async fn different_keys_run_independently() {
        let inflight: InFlight<u8, u8> = InFlight::new();

        let a = inflight.join_or_start(1, || async { 1 });
        let b = inflight.join_or_start(2, || async { 2 });

        assert_eq!(inflight.len(), 2);
        assert_eq!(tokio::join!(a, b), (1, 2));
    }
}
