//! The resolution entity and its status lifecycle. Grounded on
//! `resolution_status.py` (the five-state enum), `resolution_response_code.py`
//! plus the `LOOP_DETECTED` variant required by the scheduler's control flow
//! (the Python enum itself omits it — treated here as a distillation gap,
//! not a contract to reproduce), and the base `Resolution` class in
//! `resolution_queue.py` (`_key`, `id`, `finish`, `_queue_resolution`,
//! `_in_resolution_tree`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

use dns_types::name::Name;
use dns_types::nsr::NsrBlock;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Status {
    Pending,
    Blocked,
    Active,
    Querying,
    Done,
}

/// Which algorithm a resolution runs. "Shallow" variants exist solely to
/// break cycles: they spawn further Shallow resolutions as their own
/// parent, and skip cross-zone NSR resolution once any queryable NSR is
/// already present.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ResKind {
    AuthNs,
    ShallowAuthNs,
    Ip,
    ShallowIp,
}

impl ResKind {
    pub fn is_shallow(self) -> bool {
        matches!(self, ResKind::ShallowAuthNs | ResKind::ShallowIp)
    }

    /// The kind to use when spawning this resolution's own parent lookup.
    pub fn shallow_variant(self) -> ResKind {
        match self {
            ResKind::AuthNs | ResKind::ShallowAuthNs => ResKind::ShallowAuthNs,
            ResKind::Ip | ResKind::ShallowIp => ResKind::ShallowIp,
        }
    }
}

impl std::fmt::Display for ResKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResKind::AuthNs => "auth-ns",
            ResKind::ShallowAuthNs => "shallow-auth-ns",
            ResKind::Ip => "ip",
            ResKind::ShallowIp => "shallow-ip",
        };
        write!(f, "{s}")
    }
}

pub type Key = (Name, ResKind);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ResponseCode {
    Success,
    Warning,
    Error,
    LoopDetected,
}

#[derive(Debug, Clone)]
pub enum ResponseData {
    NsrBlock(NsrBlock),
    Ips(Vec<String>),
    None,
}

#[derive(Debug, Clone)]
pub struct ResolutionResponse {
    pub code: ResponseCode,
    pub data: ResponseData,
}

impl ResolutionResponse {
    pub fn loop_detected() -> Self {
        ResolutionResponse {
            code: ResponseCode::LoopDetected,
            data: ResponseData::None,
        }
    }

    pub fn error() -> Self {
        ResolutionResponse {
            code: ResponseCode::Error,
            data: ResponseData::None,
        }
    }

    pub fn warning_nsr_block(block: NsrBlock) -> Self {
        ResolutionResponse {
            code: ResponseCode::Warning,
            data: ResponseData::NsrBlock(block),
        }
    }

    pub fn success_nsr_block(block: NsrBlock) -> Self {
        ResolutionResponse {
            code: ResponseCode::Success,
            data: ResponseData::NsrBlock(block),
        }
    }

    pub fn success_ips(ips: Vec<String>) -> Self {
        ResolutionResponse {
            code: ResponseCode::Success,
            data: ResponseData::Ips(ips),
        }
    }

    pub fn warning_ips(ips: Vec<String>) -> Self {
        ResolutionResponse {
            code: ResponseCode::Warning,
            data: ResponseData::Ips(ips),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ChildState {
    Queued,
    Dequeued,
}

/// One node in the dependency graph. `spawned_by` is set once at creation
/// and never changes, so the graph of `spawned_by` pointers is a tree (safe
/// to hold as `Arc` without a cycle, since the cycle detector in
/// [`crate::queue`] exists precisely to prevent `spawned_by` loops from ever
/// forming). `spawned_children` is a DAG: distinct parents may each record
/// an edge to the same shared child.
pub struct Resolution {
    pub hostname: Name,
    pub kind: ResKind,
    pub spawned_by: Option<std::sync::Arc<Resolution>>,

    status: Mutex<Status>,
    ready_for_querying: AtomicBool,
    done_querying: AtomicBool,
    query_target_auth_block: Mutex<Option<NsrBlock>>,
    result: Mutex<Option<ResolutionResponse>>,
    spawned_children: Mutex<HashMap<Key, (ChildState, std::sync::Arc<Resolution>)>>,
    done_notify: Notify,

    /// `AuthNs`/`ShallowAuthNs` only: the parent-side block captured on the
    /// first `resolve` pass, held until the second pass merges it with the
    /// child-side block. Unused by `Ip`/`ShallowIp` resolutions.
    auth_parent: Mutex<Option<NsrBlock>>,
    /// `AuthNs`/`ShallowAuthNs` only: false until the parent-side capture
    /// pass has completed, then true for the child-side capture pass.
    pass_two: AtomicBool,
}

impl Resolution {
    pub fn new(hostname: Name, kind: ResKind, spawned_by: Option<std::sync::Arc<Resolution>>) -> Self {
        Resolution {
            hostname,
            kind,
            spawned_by,
            status: Mutex::new(Status::Pending),
            ready_for_querying: AtomicBool::new(false),
            done_querying: AtomicBool::new(false),
            query_target_auth_block: Mutex::new(None),
            result: Mutex::new(None),
            spawned_children: Mutex::new(HashMap::new()),
            done_notify: Notify::new(),
            auth_parent: Mutex::new(None),
            pass_two: AtomicBool::new(false),
        }
    }

    pub fn take_auth_parent(&self) -> Option<NsrBlock> {
        self.auth_parent.lock().expect("resolution mutex poisoned").take()
    }

    pub fn set_auth_parent(&self, block: NsrBlock) {
        *self.auth_parent.lock().expect("resolution mutex poisoned") = Some(block);
    }

    pub fn is_pass_two(&self) -> bool {
        self.pass_two.load(Ordering::SeqCst)
    }

    pub fn advance_to_pass_two(&self) {
        self.pass_two.store(true, Ordering::SeqCst);
    }

    pub fn key(&self) -> Key {
        (self.hostname.clone(), self.kind)
    }

    pub fn status(&self) -> Status {
        *self.status.lock().expect("resolution mutex poisoned")
    }

    pub fn set_status(&self, status: Status) {
        *self.status.lock().expect("resolution mutex poisoned") = status;
    }

    pub fn set_target(&self, block: NsrBlock) {
        *self
            .query_target_auth_block
            .lock()
            .expect("resolution mutex poisoned") = Some(block);
    }

    pub fn target(&self) -> Option<NsrBlock> {
        self.query_target_auth_block
            .lock()
            .expect("resolution mutex poisoned")
            .clone()
    }

    pub fn mark_ready_for_querying(&self) {
        self.ready_for_querying.store(true, Ordering::SeqCst);
    }

    pub fn is_ready_for_querying(&self) -> bool {
        self.ready_for_querying.load(Ordering::SeqCst)
    }

    pub fn mark_done_querying(&self) {
        self.done_querying.store(true, Ordering::SeqCst);
    }

    pub fn is_done_querying(&self) -> bool {
        self.done_querying.load(Ordering::SeqCst)
    }

    /// Cleared each time a resolution re-enters `Querying`, since
    /// `AuthNs`/`ShallowAuthNs` resolutions pass through `resolve` twice
    /// (parent-side capture, then child-side capture) before `result` is
    /// finally set.
    pub fn reset_done_querying(&self) {
        self.done_querying.store(false, Ordering::SeqCst);
    }

    pub fn result(&self) -> Option<ResolutionResponse> {
        self.result.lock().expect("resolution mutex poisoned").clone()
    }

    /// Sets the terminal result, transitions to `Done`, and wakes every
    /// waiter blocked on [`Resolution::wait_done`]. A no-op if already
    /// finished, matching the "result set at most once" invariant.
    pub fn finish(&self, response: ResolutionResponse) {
        let mut guard = self.result.lock().expect("resolution mutex poisoned");
        if guard.is_some() {
            return;
        }
        *guard = Some(response);
        drop(guard);
        self.set_status(Status::Done);
        self.done_notify.notify_waiters();
    }

    pub async fn wait_done(&self) {
        loop {
            if self.status() == Status::Done {
                return;
            }
            let notified = self.done_notify.notified();
            if self.status() == Status::Done {
                return;
            }
            notified.await;
        }
    }

    pub fn register_child(&self, key: Key, child: std::sync::Arc<Resolution>) {
        self.spawned_children
            .lock()
            .expect("resolution mutex poisoned")
            .insert(key, (ChildState::Queued, child));
    }

    pub fn dequeue_child(&self, key: &Key) {
        if let Some(entry) = self
            .spawned_children
            .lock()
            .expect("resolution mutex poisoned")
            .get_mut(key)
        {
            entry.0 = ChildState::Dequeued;
        }
    }

    pub fn queued_children(&self) -> Vec<(Key, std::sync::Arc<Resolution>)> {
        self.spawned_children
            .lock()
            .expect("resolution mutex poisoned")
            .iter()
            .filter(|(_, (state, _))| *state == ChildState::Queued)
            .map(|(k, (_, child))| (k.clone(), child.clone()))
            .collect()
    }

    /// The chain `[self, parent, grandparent, ...]` up to the root.
    pub fn ancestor_chain(self: &std::sync::Arc<Self>) -> Vec<std::sync::Arc<Resolution>> {
        let mut chain = vec![self.clone()];
        let mut cur = self.clone();
        while let Some(parent) = cur.spawned_by.clone() {
            chain.push(parent.clone());
            cur = parent;
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn finish_is_idempotent_and_wakes_waiters() {
        let res = Arc::new(Resolution::new(
            Name::normalize("example.com."),
            ResKind::AuthNs,
            None,
        ));
        let waiter = {
            let res = res.clone();
            tokio::spawn(async move {
                res.wait_done().await;
                res.result().unwrap().code
            })
        };
        tokio::task::yield_now().await;
        res.finish(ResolutionResponse::success_ips(vec!["1.1.1.1".into()]));
        res.finish(ResolutionResponse::error());
        assert_eq!(res.status(), Status::Done);
        assert!(matches!(waiter.await.unwrap(), ResponseCode::Success));
    }

    #[test]
    fn ancestor_chain_includes_self_first() {
        let root = Arc::new(Resolution::new(Name::root(), ResKind::AuthNs, None));
        let child = Arc::new(Resolution::new(
            Name::normalize("com."),
            ResKind::AuthNs,
            Some(root.clone()),
        ));
        let chain = child.ancestor_chain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].hostname, Name::normalize("com."));
        assert_eq!(chain[1].hostname, Name::root());
    }
}
