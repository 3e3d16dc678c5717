//! The wire resolver: turns a [`Query`] into a [`DnsResponse`] over UDP,
//! with bounded retry. Grounded on `resolver.py`'s retry loop (3 attempts,
//! `sleep(2 * retry_cnt)` backoff) and on the reference resolver's
//! `util/nameserver.rs` for the "build socket, send, await reply with a
//! timeout" shape — reduced to UDP-only, matching this crawler's Non-goals.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use dns_types::name::Name;
use dns_types::protocol::types::{Message, Question, RecordType};
use dns_types::protocol::wire::{parse_message, serialise_query, WireError};

use crate::error::WireIoError;
use crate::ratelimit::RateLimiter;

/// A single outbound question against one nameserver IP. Identity mirrors
/// `query.py`'s `Query.id`: `"q/{rtype}/{nsr_ip}"` plus the name, since
/// unlike the source (which resolves one name per `QueryQueue` instance)
/// this crate's cache is shared across every in-flight resolution.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Query {
    pub name: Name,
    pub rtype: RecordType,
    pub nsr_ip: String,
}

impl Query {
    pub fn id(&self) -> String {
        format!("q/{}/{}/{}", self.name, self.rtype, self.nsr_ip)
    }
}

/// A group of queries issued together against one nameserver set, as built
/// by a resolution's load/resolve phase. Mirrors `query.py`'s `QueryBlock`.
#[derive(Debug, Clone)]
pub struct QueryBlock {
    pub name: Name,
    pub rtypes: Vec<RecordType>,
    pub nsr_ips: Vec<String>,
}

impl QueryBlock {
    pub fn id(&self) -> String {
        let mut ips = self.nsr_ips.clone();
        ips.sort();
        let mut types: Vec<String> = self.rtypes.iter().map(ToString::to_string).collect();
        types.sort();
        format!("qb/{}/{}/{}", self.name, types.join(","), ips.join(","))
    }

    pub fn to_query_list(&self) -> Vec<Query> {
        let mut queries = Vec::with_capacity(self.rtypes.len() * self.nsr_ips.len());
        for rtype in &self.rtypes {
            for ip in &self.nsr_ips {
                queries.push(Query {
                    name: self.name.clone(),
                    rtype: *rtype,
                    nsr_ip: ip.clone(),
                });
            }
        }
        queries
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum QueryStatus {
    Success,
    Timeout,
}

#[derive(Debug, Clone)]
pub struct DnsResponse {
    pub status: QueryStatus,
    pub message: Message,
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            timeout: Duration::from_secs(5),
            retries: 3,
        }
    }
}

/// Sends `query` to its target nameserver, retrying up to `config.retries`
/// times with linear backoff (`2 * attempt` seconds) on timeout. Returns a
/// synthetic empty `TIMEOUT` response once retries are exhausted rather than
/// an error, so a single unreachable nameserver degrades a resolution to
/// `WARNING` instead of aborting the process — a deliberate divergence from
/// the source, which lets transport exceptions propagate and kill the run.
pub async fn resolve_query(
    query: &Query,
    config: &ResolverConfig,
    limiter: &RateLimiter,
) -> Result<DnsResponse, WireIoError> {
    let addr: SocketAddr = format!("{}:53", query.nsr_ip)
        .parse()
        .unwrap_or_else(|_| "0.0.0.0:53".parse().unwrap());

    let question = Question {
        name: query.name.clone(),
        qtype: query.rtype,
    };

    for attempt in 0..config.retries {
        limiter.acquire().await;
        let id = rand::random::<u16>();
        let message = Message::query(id, question.clone());
        let bytes = serialise_query(&message);

        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| WireIoError::Bind(addr, e))?;
        socket
            .send_to(&bytes, addr)
            .await
            .map_err(|e| WireIoError::Send(addr, e))?;

        let mut buf = [0u8; 4096];
        match tokio::time::timeout(config.timeout, socket.recv(&mut buf)).await {
            Ok(Ok(n)) => match parse_message(&buf[..n]) {
                Ok(message) => {
                    debug!(query = %query.id(), attempt, "received response");
                    return Ok(DnsResponse {
                        status: QueryStatus::Success,
                        message,
                    });
                }
                Err(WireError::TooShort) | Err(_) => {
                    warn!(query = %query.id(), attempt, "malformed response, retrying");
                    continue;
                }
            },
            Ok(Err(e)) => return Err(WireIoError::Recv(e)),
            Err(_elapsed) => {
                warn!(query = %query.id(), attempt, "query timed out");
                if attempt + 1 < config.retries {
                    tokio::time::sleep(Duration::from_secs(2 * u64::from(attempt + 1))).await;
                }
            }
        }
    }

    Ok(DnsResponse {
        status: QueryStatus::Timeout,
        message: Message::synthetic_timeout(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_id_includes_name_rtype_and_ip() {
        let q = Query {
            name: Name::normalize("example.com."),
            rtype: RecordType::Ns,
            nsr_ip: "198.41.0.4".to_string(),
        };
        assert_eq!(q.id(), "q/example.com./NS/198.41.0.4");
    }

    #[test]
    fn query_block_id_is_order_independent() {
        let a = QueryBlock {
            name: Name::normalize("example.com."),
            rtypes: vec![RecordType::Ns, RecordType::A],
            nsr_ips: vec!["1.1.1.1".into(), "2.2.2.2".into()],
        };
        let b = QueryBlock {
            name: Name::normalize("example.com."),
            rtypes: vec![RecordType::A, RecordType::Ns],
            nsr_ips: vec!["2.2.2.2".into(), "1.1.1.1".into()],
        };
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn query_block_expands_to_cross_product() {
        let block = QueryBlock {
            name: Name::normalize("example.com."),
            rtypes: vec![RecordType::Ns, RecordType::A],
            nsr_ips: vec!["1.1.1.1".into(), "2.2.2.2".into()],
        };
        assert_eq!(block.to_query_list().len(), 4);
    }
}
