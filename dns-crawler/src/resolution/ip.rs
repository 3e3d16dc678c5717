//! `Ip` / `ShallowIp`: resolves a hostname to its `A` records using the
//! comprehensive (or shallow) authoritative nameserver set. Grounded on
//! `IPResolution` in `resolution_queue.py`.
//!
//! The source's `resolve()` has a branch for "no `A` rtype in the response"
//! that returns a `ResolutionResponse(ERROR)` without ever setting
//! `self.result`/`self.done_querying` — a dead end that would hang a
//! faithful port. This implementation sets both, which is the only
//! sensible reading of that branch's evident intent.

use std::sync::Arc;

use tracing::{debug, warn};

use dns_types::nsr::NsrBlock;
use dns_types::protocol::types::{RecordType, RecordTypeWithData};

use crate::queue::ResolutionQueue;
use crate::resolution::types::{ResKind, ResolutionResponse, ResponseCode, ResponseData, Resolution};
use crate::resolver::QueryBlock;

pub async fn load_query_target_auth_block(queue: &Arc<ResolutionQueue>, resolution: &Arc<Resolution>) {
    let auth_kind = if resolution.kind.is_shallow() {
        ResKind::ShallowAuthNs
    } else {
        ResKind::AuthNs
    };

    let response = queue
        .add(resolution.hostname.clone(), auth_kind, Some(resolution.clone()))
        .await;

    let block = match response.code {
        ResponseCode::LoopDetected => {
            let retry = queue
                .add(resolution.hostname.clone(), ResKind::ShallowAuthNs, Some(resolution.clone()))
                .await;
            if matches!(retry.code, ResponseCode::Error | ResponseCode::LoopDetected) {
                resolution.finish(retry);
                return;
            }
            match retry.data {
                ResponseData::NsrBlock(b) => b,
                _ => NsrBlock::empty(resolution.hostname.clone()),
            }
        }
        ResponseCode::Error => {
            resolution.finish(response);
            return;
        }
        _ => match response.data {
            ResponseData::NsrBlock(b) => b,
            _ => NsrBlock::empty(resolution.hostname.clone()),
        },
    };

    resolution.set_target(block);
    resolution.mark_ready_for_querying();
}

pub async fn resolve(queue: &Arc<ResolutionQueue>, resolution: &Arc<Resolution>) {
    let target = resolution
        .target()
        .unwrap_or_else(|| NsrBlock::empty(resolution.hostname.clone()));

    if !target.has_queryable() {
        warn!(hostname = %resolution.hostname, "no queryable nameservers, giving up on A records");
        resolution.finish(ResolutionResponse::warning_ips(Vec::new()));
        resolution.mark_done_querying();
        return;
    }

    let nsr_ips: Vec<String> = target
        .queryable()
        .flat_map(|n| n.ips.iter().cloned())
        .collect();
    let block = QueryBlock {
        name: resolution.hostname.clone(),
        rtypes: vec![RecordType::A],
        nsr_ips,
    };

    let responses = queue.dispatch(&block).await;

    if responses.is_empty()
        || responses
            .values()
            .all(|r| matches!(r.status, crate::resolver::QueryStatus::Timeout))
    {
        warn!(hostname = %resolution.hostname, "all A queries timed out");
        resolution.finish(ResolutionResponse::warning_ips(Vec::new()));
        resolution.mark_done_querying();
        return;
    }

    debug!(hostname = %resolution.hostname, "resolving A records from {} nameserver responses", responses.len());

    let mut ips: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    let mut saw_any_a = false;
    for response in responses.values() {
        if response.status != crate::resolver::QueryStatus::Success {
            continue;
        }
        for rr in response.message.all_records() {
            if let RecordTypeWithData::A { address } = &rr.rtype_with_data {
                saw_any_a = true;
                if rr.name == resolution.hostname {
                    ips.insert(address.to_string());
                }
            }
        }
    }

    // "No A rtype in response" is the ERROR condition, per §4.5.2 — not
    // "no A record for this exact owner name", which can legitimately be
    // empty while the response still carries other owners' A records.
    if !saw_any_a {
        resolution.finish(ResolutionResponse::error());
        resolution.mark_done_querying();
        return;
    }

    resolution.finish(ResolutionResponse::success_ips(ips.into_iter().collect()));
    resolution.mark_done_querying();
}
