//! `AuthNs` / `ShallowAuthNs`: the comprehensive parent-side + child-side
//! authoritative nameserver resolution. Grounded on `AuthNSResolution` and
//! `ShallowAuthNSResolution` in `resolution_queue.py` —
//! `load_query_target_auth_block` (this module's `load_query_target_auth_block`),
//! `resolve` (this module's `resolve`), and `_resolve_cross_zone_nsrs`
//! (shared, in [`crate::resolution::resolve_cross_zone_nsrs`]).

use std::sync::Arc;

use tracing::{debug, warn};

use dns_types::nsr::NsrBlock;
use dns_types::protocol::types::RecordType;
use dns_types::relation::DnsRelationMap;
use dns_types::roots::root_hints;

use crate::queue::ResolutionQueue;
use crate::resolution::resolve_cross_zone_nsrs;
use crate::resolution::types::{ResKind, ResolutionResponse, ResponseCode, ResponseData, Resolution};
use crate::resolver::QueryBlock;

fn extract_block(response: ResolutionResponse, fallback_name: &dns_types::name::Name) -> NsrBlock {
    match response.data {
        ResponseData::NsrBlock(block) => block,
        _ => NsrBlock::empty(fallback_name.clone()),
    }
}

/// Resolves (or looks up) the nameserver set the first query pass should
/// target.
pub async fn load_query_target_auth_block(queue: &Arc<ResolutionQueue>, resolution: &Arc<Resolution>) {
    if resolution.hostname.is_root() {
        debug!("root zone requested, short-circuiting to root hints without any wire traffic");
        resolution.finish(ResolutionResponse::success_nsr_block(root_hints()));
        return;
    }

    let parent_name = resolution.hostname.parent();
    let parent_kind = if resolution.kind.is_shallow() {
        ResKind::ShallowAuthNs
    } else {
        ResKind::AuthNs
    };

    let response = queue
        .add(parent_name.clone(), parent_kind, Some(resolution.clone()))
        .await;

    let target = match response.code {
        ResponseCode::LoopDetected => {
            debug!(hostname = %resolution.hostname, "parent lookup looped, retrying shallow");
            let retry = queue
                .add(parent_name.clone(), ResKind::ShallowAuthNs, Some(resolution.clone()))
                .await;
            if matches!(retry.code, ResponseCode::Error | ResponseCode::LoopDetected) {
                resolution.finish(retry);
                return;
            }
            extract_block(retry, &parent_name)
        }
        ResponseCode::Error => {
            resolution.finish(response);
            return;
        }
        _ => extract_block(response, &parent_name),
    };

    resolution.set_target(target);
    resolution.mark_ready_for_querying();
}

/// Called twice per resolution (first for the parent-side capture, then
/// for the child-side capture, tracked by [`Resolution::is_pass_two`]); the
/// scheduler cycles a resolution back through `Active -> Querying -> Active`
/// until `result` is set.
pub async fn resolve(queue: &Arc<ResolutionQueue>, resolution: &Arc<Resolution>) {
    let target = resolution
        .target()
        .unwrap_or_else(|| NsrBlock::empty(resolution.hostname.clone()));

    if !target.has_queryable() {
        warn!(hostname = %resolution.hostname, "no queryable nameservers to target, giving up");
        resolution.finish(ResolutionResponse::warning_nsr_block(NsrBlock::empty(
            resolution.hostname.clone(),
        )));
        resolution.mark_done_querying();
        return;
    }

    let nsr_ips: Vec<String> = target
        .queryable()
        .flat_map(|n| n.ips.iter().cloned())
        .collect();
    let block = QueryBlock {
        name: resolution.hostname.clone(),
        rtypes: vec![RecordType::Ns, RecordType::A],
        nsr_ips,
    };

    let responses = queue.dispatch(&block).await;

    let ns_queries: Vec<_> = block
        .to_query_list()
        .into_iter()
        .filter(|q| q.rtype == RecordType::Ns)
        .collect();
    let ns_responses: Vec<_> = ns_queries
        .iter()
        .filter_map(|q| responses.get(&q.id()))
        .collect();

    if ns_responses.is_empty() || ns_responses.iter().all(|r| matches!(r.status, crate::resolver::QueryStatus::Timeout)) {
        warn!(hostname = %resolution.hostname, "all NS queries timed out");
        resolution.finish(ResolutionResponse::warning_nsr_block(NsrBlock::empty(
            resolution.hostname.clone(),
        )));
        resolution.mark_done_querying();
        return;
    }

    let has_error_rcode = ns_responses.iter().any(|r| {
        r.status == crate::resolver::QueryStatus::Success
            && r.message.header.rcode != dns_types::protocol::types::Rcode::NoError
    });
    if has_error_rcode {
        resolution.finish(ResolutionResponse::error());
        resolution.mark_done_querying();
        return;
    }

    let messages: Vec<_> = responses
        .values()
        .filter(|r| r.status == crate::resolver::QueryStatus::Success)
        .map(|r| &r.message)
        .collect();
    let relation_map = DnsRelationMap::from_messages(messages);

    let candidate_names: Vec<_> = relation_map.hosts_with_nameservers().cloned().collect();
    let captured = relation_map
        .get_nsr_block(&resolution.hostname)
        .or_else(|| {
            resolution
                .hostname
                .closest_superdomain(&candidate_names, true)
                .and_then(|n| relation_map.get_nsr_block(n))
        });

    let captured = match captured {
        Some(block) => block,
        None if relation_map.has_soa_for(&resolution.hostname) => target.clone(),
        None => NsrBlock::empty(resolution.hostname.clone()),
    };

    let merged = captured.merge(&target, dns_types::nsr::JoinKind::Left);
    let resolved = resolve_cross_zone_for_kind(queue, resolution, &merged).await;

    if !resolution.is_pass_two() {
        resolution.set_auth_parent(resolved.clone());
        resolution.advance_to_pass_two();
        resolution.set_target(resolved);
        resolution.mark_done_querying();
    } else {
        let auth_parent = resolution.take_auth_parent().unwrap_or_else(|| {
            NsrBlock::empty(resolution.hostname.clone())
        });
        let final_block = auth_parent.merge(&resolved, dns_types::nsr::JoinKind::Outer);
        resolution.finish(ResolutionResponse::success_nsr_block(final_block));
        resolution.mark_done_querying();
    }
}

async fn resolve_cross_zone_for_kind(
    queue: &Arc<ResolutionQueue>,
    resolution: &Arc<Resolution>,
    block: &NsrBlock,
) -> NsrBlock {
    if resolution.kind.is_shallow() && block.has_queryable() {
        return block.clone();
    }
    resolve_cross_zone_nsrs(queue, resolution, block).await
}
