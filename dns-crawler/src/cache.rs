//! Call-coalescing caches. Grounded on `async_queue.py`'s `AsyncQueue` /
//! `AsyncQueueCall` (new/active/finished semantics) and `query_queue.py`'s
//! two nested `AsyncQueue`s (block-level then per-query). `OnceCell`
//! already provides the New/Active/Finished lifecycle as a primitive, so
//! each cache is a map from id to a shared cell rather than a hand-rolled
//! state machine with an `Event`, the way the Python source needed.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::resolver::{resolve_query, DnsResponse, QueryBlock, ResolverConfig};
use crate::ratelimit::RateLimiter;

/// A generic at-most-once-concurrently call-coalescing cache keyed by `K`.
pub struct AsyncCache<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for AsyncCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        AsyncCache {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> AsyncCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `producer` at most once per `id`. Concurrent and subsequent
    /// callers with the same `id` observe the same `V` without re-running
    /// `producer`.
    pub async fn queue_call<F, Fut>(&self, id: K, producer: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = {
            let mut cells = self.cells.lock().expect("async cache mutex poisoned");
            cells.entry(id).or_default().clone()
        };
        cell.get_or_init(producer).await.clone()
    }

    pub fn len(&self) -> usize {
        self.cells.lock().expect("async cache mutex poisoned").len()
    }
}

/// A two-level query cache: one coalescing layer over whole [`QueryBlock`]s,
/// one over individual [`Query`]s, so that identical blocks from different
/// resolutions and identical individual queries across different blocks both
/// collapse to a single wire round-trip.
pub struct QueryCache {
    blocks: AsyncCache<String, Arc<HashMap<String, DnsResponse>>>,
    queries: AsyncCache<String, Result<DnsResponse, String>>,
    config: ResolverConfig,
    limiter: RateLimiter,
}

impl QueryCache {
    pub fn new(config: ResolverConfig, limiter: RateLimiter) -> Self {
        QueryCache {
            blocks: AsyncCache::new(),
            queries: AsyncCache::new(),
            config,
            limiter,
        }
    }

    /// Dispatches every query in `block`, coalescing at both levels, and
    /// returns the per-query responses keyed by [`Query::id`]. Queries that
    /// hit a true transport error (not a timeout, which is folded into a
    /// synthetic response by [`resolve_query`]) are simply absent from the
    /// result rather than failing the whole block.
    pub async fn dispatch(&self, block: &QueryBlock) -> Arc<HashMap<String, DnsResponse>> {
        let block_id = block.id();
        let queries = block.to_query_list();

        self.blocks
            .queue_call(block_id, || async {
                let mut responses = HashMap::with_capacity(queries.len());
                for query in &queries {
                    let query_id = query.id();
                    let outcome = self
                        .queries
                        .queue_call(query_id.clone(), || async {
                            resolve_query(query, &self.config, &self.limiter)
                                .await
                                .map_err(|e| e.to_string())
                        })
                        .await;
                    if let Ok(response) = outcome {
                        responses.insert(query_id, response);
                    }
                }
                Arc::new(responses)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_calls_with_same_id_run_producer_once() {
        let cache: Arc<AsyncCache<&'static str, u32>> = Arc::new(AsyncCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .queue_call("id", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        42
                    })
                    .await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_ids_run_independently() {
        let cache: AsyncCache<u32, u32> = AsyncCache::new();
        let a = cache.queue_call(1, || async { 10 }).await;
        let b = cache.queue_call(2, || async { 20 }).await;
        assert_eq!((a, b), (10, 20));
    }
}
