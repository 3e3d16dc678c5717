//! Per-hostname resolution algorithms. Grounded on the `Resolution` class
//! hierarchy in `resolution_queue.py`.

pub mod auth_ns;
pub mod ip;
pub mod types;

use std::sync::Arc;

use dns_types::name::Name;
use dns_types::nsr::{Nsr, NsrBlock};

use crate::queue::ResolutionQueue;
use crate::resolution::types::{ResKind, ResolutionResponse, ResponseCode, ResponseData, Resolution};

/// Resolves every non-queryable NSR in `block` via a `ShallowIp` sub-resolution,
/// replacing it in place when that sub-resolution succeeds with a non-empty
/// IP list. Mirrors `_resolve_cross_zone_nsrs`. `Shallow` callers skip this
/// entirely once the block already has at least one queryable NSR (checked
/// by the caller, not here, since that's a decision specific to each kind).
pub(crate) async fn resolve_cross_zone_nsrs(
    queue: &Arc<ResolutionQueue>,
    spawner: &Arc<Resolution>,
    block: &NsrBlock,
) -> NsrBlock {
    let queryable_hostnames: std::collections::HashSet<&Name> =
        block.queryable().map(|n| &n.hostname).collect();
    let missing: Vec<Name> = block
        .iter()
        .filter(|n| !n.is_queryable() && !queryable_hostnames.contains(&n.hostname))
        .map(|n| n.hostname.clone())
        .collect();

    let mut resolved = block.clone();
    let mut handles = Vec::with_capacity(missing.len());
    for hostname in missing {
        let queue = queue.clone();
        let spawner = spawner.clone();
        handles.push(tokio::spawn(async move {
            let response = queue
                .add(hostname.clone(), ResKind::ShallowIp, Some(spawner))
                .await;
            (hostname, response)
        }));
    }

    for handle in handles {
        if let Ok((hostname, response)) = handle.await {
            if let ResolutionResponse {
                code: ResponseCode::Success,
                data: ResponseData::Ips(ips),
            } = response
            {
                if !ips.is_empty() {
                    resolved.replace_by_hostname(&hostname, Nsr::new(hostname.clone(), ips));
                }
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryCache;
    use crate::ratelimit::RateLimiter;
    use crate::resolver::ResolverConfig;

    fn new_queue() -> Arc<ResolutionQueue> {
        let qc = Arc::new(QueryCache::new(ResolverConfig::default(), RateLimiter::unlimited()));
        ResolutionQueue::new(qc, 10)
    }

    /// A hostname that already has a queryable NSR entry under one identity
    /// must not be re-resolved just because another entry for the same
    /// hostname (a different IP set, e.g. unresolved glue) is also present.
    #[tokio::test]
    async fn shadowed_hostname_is_not_treated_as_missing() {
        let queue = new_queue();
        let spawner = Arc::new(Resolution::new(
            Name::normalize("example.com."),
            ResKind::AuthNs,
            None,
        ));

        let mut block = NsrBlock::empty(Name::normalize("example.com."));
        block.add(Nsr::new(
            Name::normalize("ns1.example.com."),
            vec!["1.1.1.1".to_string()],
        ));
        block.add(Nsr::unresolved(Name::normalize("ns1.example.com.")));

        let resolved = resolve_cross_zone_nsrs(&queue, &spawner, &block).await;

        // The unresolved duplicate is left untouched (no ShallowIp spawned
        // for it), so the block is unchanged save for identity: still one
        // queryable entry and one unresolved entry for the same hostname.
        assert_eq!(resolved.len(), 2);
        assert_eq!(
            resolved.queryable().count(),
            1,
            "shadowed duplicate must not trigger a redundant cross-zone lookup"
        );

        queue.shutdown().await;
    }
}
