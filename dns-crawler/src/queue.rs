//! The resolution scheduler. Grounded on `resolution_queue.py`'s
//! `ResolutionQueue`: the `_run` driver loop advancing every resolution
//! through its status buckets, `_queue_resolution`/`_in_resolution_tree` for
//! cycle detection, and the async-context-manager `__aenter__`/`__aexit__`
//! shutdown discipline (awaited here via [`ResolutionQueue::shutdown`]
//! instead of a `Drop` impl, since async teardown can't happen in `Drop`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use dns_types::name::Name;

use crate::cache::{AsyncCache, QueryCache};
use crate::resolution::types::{Key, ResKind, Resolution, ResolutionResponse, Status};
use crate::resolution::{auth_ns, ip};

pub struct ResolutionQueue {
    registry: Mutex<HashMap<Key, Arc<Resolution>>>,
    identity_cache: AsyncCache<Key, ResolutionResponse>,
    buckets: Mutex<HashMap<Status, Vec<Key>>>,
    query_cache: Arc<QueryCache>,
    active_permits: Arc<Semaphore>,
    running: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ResolutionQueue {
    pub fn new(query_cache: Arc<QueryCache>, max_active_resolutions: usize) -> Arc<Self> {
        let queue = Arc::new(ResolutionQueue {
            registry: Mutex::new(HashMap::new()),
            identity_cache: AsyncCache::new(),
            buckets: Mutex::new(HashMap::new()),
            query_cache,
            active_permits: Arc::new(Semaphore::new(max_active_resolutions.max(1))),
            running: Arc::new(AtomicBool::new(true)),
            tasks: Mutex::new(Vec::new()),
        });
        let driver = queue.clone();
        let handle = tokio::spawn(async move { driver.run().await });
        queue.tasks.lock().expect("queue mutex poisoned").push(handle);
        queue
    }

    fn move_bucket(&self, key: &Key, from: Option<Status>, to: Status) {
        let mut buckets = self.buckets.lock().expect("queue mutex poisoned");
        if let Some(from) = from {
            if let Some(v) = buckets.get_mut(&from) {
                v.retain(|k| k != key);
            }
        }
        buckets.entry(to).or_default().push(key.clone());
    }

    /// Adds a resolution (or returns the cached result of one already added
    /// with the same identity). `spawned_by` is the resolution requesting
    /// this one, or `None` for a top-level crawl target. Performs cycle
    /// detection before registering a new dependency edge.
    pub async fn add(
        self: &Arc<Self>,
        hostname: Name,
        kind: ResKind,
        spawned_by: Option<Arc<Resolution>>,
    ) -> ResolutionResponse {
        let key = (hostname.clone(), kind);

        if let Some(parent) = &spawned_by {
            if let Some(cycle_response) = self.check_cycle(&key, parent) {
                return cycle_response;
            }
        }

        let resolution = {
            let mut registry = self.registry.lock().expect("queue mutex poisoned");
            registry
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Resolution::new(hostname, kind, spawned_by.clone())))
                .clone()
        };

        if let Some(parent) = &spawned_by {
            parent.register_child(key.clone(), resolution.clone());
        }

        if resolution.status() == Status::Pending {
            self.move_bucket(&key, None, Status::Pending);
        }

        let queue = self.clone();
        let result = self
            .identity_cache
            .queue_call(key.clone(), move || {
                let resolution = resolution.clone();
                async move {
                    resolution.wait_done().await;
                    resolution.result().expect("done resolution has a result")
                }
            })
            .await;

        if let Some(parent) = &spawned_by {
            parent.dequeue_child(&key);
        }

        result
    }

    /// Ancestor-chain walk plus a forward search over still-`QUEUED` siblings
    /// of `parent`'s ancestors. Returns `Some(LOOP_DETECTED)` if either check
    /// finds `key`.
    fn check_cycle(&self, key: &Key, parent: &Arc<Resolution>) -> Option<ResolutionResponse> {
        let chain = parent.ancestor_chain();
        if chain.iter().any(|a| &a.key() == key) {
            debug!(hostname = %key.0, kind = %key.1, "cycle detected in ancestor chain");
            return Some(ResolutionResponse::loop_detected());
        }

        let path_keys: Vec<Key> = chain.iter().rev().map(Resolution::key).collect();
        let root = chain.last().expect("chain always has at least one entry").clone();
        if Self::forward_search(&path_keys, 0, &root, key) {
            debug!(hostname = %key.0, kind = %key.1, "cycle detected in forward search");
            return Some(ResolutionResponse::loop_detected());
        }
        None
    }

    /// Recursively searches `node`'s `QUEUED` children for `target`,
    /// skipping the branch that leads back down `path` (the caller's own
    /// ancestor backbone) so the search only explores sibling subtrees.
    fn forward_search(path: &[Key], idx: usize, node: &Arc<Resolution>, target: &Key) -> bool {
        let next_on_path = path.get(idx + 1);
        for (child_key, child) in node.queued_children() {
            if Some(&child_key) == next_on_path {
                if idx + 2 < path.len() {
                    if Self::forward_search(path, idx + 1, &child, target) {
                        return true;
                    }
                }
                continue;
            }
            if &child_key == target {
                return true;
            }
            if Self::unrestricted_search(&child, target) {
                return true;
            }
        }
        false
    }

    fn unrestricted_search(node: &Arc<Resolution>, target: &Key) -> bool {
        for (child_key, child) in node.queued_children() {
            if &child_key == target {
                return true;
            }
            if Self::unrestricted_search(&child, target) {
                return true;
            }
        }
        false
    }

    /// The driver loop: repeatedly snapshots each status bucket and advances
    /// every resolution found there. Mirrors `ResolutionQueue._run`.
    async fn run(self: Arc<Self>) {
        while self.running.load(Ordering::SeqCst) {
            self.advance_pending().await;
            self.advance_blocked();
            self.advance_active().await;
            self.advance_querying();
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    }

    async fn advance_pending(self: &Arc<Self>) {
        let keys = self.snapshot(Status::Pending);
        for key in keys {
            let Some(resolution) = self.lookup(&key) else { continue };
            resolution.set_status(Status::Blocked);
            self.move_bucket(&key, Some(Status::Pending), Status::Blocked);
            let queue = self.clone();
            let handle = tokio::spawn(async move {
                match resolution.kind {
                    ResKind::AuthNs | ResKind::ShallowAuthNs => {
                        auth_ns::load_query_target_auth_block(&queue, &resolution).await;
                    }
                    ResKind::Ip | ResKind::ShallowIp => {
                        ip::load_query_target_auth_block(&queue, &resolution).await;
                    }
                }
            });
            self.tasks.lock().expect("queue mutex poisoned").push(handle);
        }
    }

    fn advance_blocked(self: &Arc<Self>) {
        let keys = self.snapshot(Status::Blocked);
        for key in keys {
            let Some(resolution) = self.lookup(&key) else { continue };
            if resolution.status() == Status::Done {
                self.move_bucket(&key, Some(Status::Blocked), Status::Done);
            } else if resolution.is_ready_for_querying() {
                resolution.set_status(Status::Active);
                self.move_bucket(&key, Some(Status::Blocked), Status::Active);
            }
        }
    }

    async fn advance_active(self: &Arc<Self>) {
        let keys = self.snapshot(Status::Active);
        for key in keys {
            let Some(resolution) = self.lookup(&key) else { continue };
            if resolution.result().is_some() {
                self.move_bucket(&key, Some(Status::Active), Status::Done);
                continue;
            }
            resolution.reset_done_querying();
            resolution.set_status(Status::Querying);
            self.move_bucket(&key, Some(Status::Active), Status::Querying);
            let queue = self.clone();
            let handle = tokio::spawn(async move {
                match resolution.kind {
                    ResKind::AuthNs | ResKind::ShallowAuthNs => {
                        auth_ns::resolve(&queue, &resolution).await;
                    }
                    ResKind::Ip | ResKind::ShallowIp => {
                        ip::resolve(&queue, &resolution).await;
                    }
                }
            });
            self.tasks.lock().expect("queue mutex poisoned").push(handle);
        }
    }

    /// Dispatches `block` gated by `max_active_resolutions`. The permit is
    /// held only for the wire round-trip, not for the resolve task as a
    /// whole, so a resolution blocked on a sub-resolution's own `add` (e.g.
    /// cross-zone glue) never holds a permit the driver needs to advance
    /// that sub-resolution to `Querying`.
    pub(crate) async fn dispatch(
        &self,
        block: &crate::resolver::QueryBlock,
    ) -> Arc<HashMap<String, crate::resolver::DnsResponse>> {
        let _permit = self
            .active_permits
            .acquire()
            .await
            .expect("active_permits semaphore never closed");
        self.query_cache.dispatch(block).await
    }

    fn advance_querying(self: &Arc<Self>) {
        let keys = self.snapshot(Status::Querying);
        for key in keys {
            let Some(resolution) = self.lookup(&key) else { continue };
            if resolution.is_done_querying() {
                if resolution.result().is_some() {
                    resolution.set_status(Status::Done);
                    self.move_bucket(&key, Some(Status::Querying), Status::Done);
                } else {
                    resolution.set_status(Status::Active);
                    self.move_bucket(&key, Some(Status::Querying), Status::Active);
                }
            }
        }
    }

    fn snapshot(&self, status: Status) -> Vec<Key> {
        self.buckets
            .lock()
            .expect("queue mutex poisoned")
            .get(&status)
            .cloned()
            .unwrap_or_default()
    }

    fn lookup(&self, key: &Key) -> Option<Arc<Resolution>> {
        self.registry.lock().expect("queue mutex poisoned").get(key).cloned()
    }

    /// Stops the driver loop and awaits every in-flight transition task.
    /// No cancellation: every spawned task runs to completion first.
    pub async fn shutdown(self: &Arc<Self>) {
        self.running.store(false, Ordering::SeqCst);
        let handles: Vec<JoinHandle<()>> =
            std::mem::take(&mut *self.tasks.lock().expect("queue mutex poisoned"));
        for handle in handles {
            let _ = handle.await;
        }
        trace!("resolution queue shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::RateLimiter;
    use crate::resolver::ResolverConfig;

    fn new_queue() -> Arc<ResolutionQueue> {
        let qc = Arc::new(QueryCache::new(ResolverConfig::default(), RateLimiter::unlimited()));
        ResolutionQueue::new(qc, 10)
    }

    #[tokio::test]
    async fn root_auth_ns_short_circuits_to_hints() {
        let queue = new_queue();
        let response = queue.add(Name::root(), ResKind::AuthNs, None).await;
        assert!(matches!(
            response.code,
            crate::resolution::types::ResponseCode::Success
        ));
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn same_identity_added_twice_runs_once() {
        let queue = new_queue();
        let a = queue.clone();
        let b = queue.clone();
        let (r1, r2) = tokio::join!(
            a.add(Name::root(), ResKind::AuthNs, None),
            b.add(Name::root(), ResKind::AuthNs, None)
        );
        assert_eq!(queue.registry.lock().unwrap().len(), 1);
        assert!(matches!(
            r1.code,
            crate::resolution::types::ResponseCode::Success
        ));
        assert!(matches!(
            r2.code,
            crate::resolution::types::ResponseCode::Success
        ));
        queue.shutdown().await;
    }
}
