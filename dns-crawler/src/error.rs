//! Crate-local error types. Follows the reference resolver's manual
//! `Display`/`Error` style in `util/types.rs` rather than pulling in
//! `thiserror`.

use std::net::SocketAddr;

#[derive(Debug)]
pub enum WireIoError {
    Bind(SocketAddr, std::io::Error),
    Send(SocketAddr, std::io::Error),
    Recv(std::io::Error),
    Decode(dns_types::protocol::wire::WireError),
}

impl std::fmt::Display for WireIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireIoError::Bind(addr, e) => write!(f, "failed to bind UDP socket for {addr}: {e}"),
            WireIoError::Send(addr, e) => write!(f, "failed to send query to {addr}: {e}"),
            WireIoError::Recv(e) => write!(f, "failed to receive response: {e}"),
            WireIoError::Decode(e) => write!(f, "failed to decode response: {e}"),
        }
    }
}

impl std::error::Error for WireIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WireIoError::Bind(_, e) | WireIoError::Send(_, e) => Some(e),
            WireIoError::Recv(e) => Some(e),
            WireIoError::Decode(e) => Some(e),
        }
    }
}

#[derive(Debug)]
pub enum CrawlError {
    DomainListRead {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for CrawlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlError::DomainListRead { path, source } => {
                write!(f, "failed to read domain list '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for CrawlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CrawlError::DomainListRead { source, .. } => Some(source),
        }
    }
}
