//! A minimal DNS wire-format codec, restricted to what the crawler sends and
//! receives: non-recursive `A`/`NS` queries over UDP, and referral/answer
//! responses carrying `A`, `NS`, and `SOA` records. Grounded on the protocol
//! module of the reference resolver's `dns-types` crate, reduced to the
//! record types and transport this crawler's Non-goals leave in scope (no
//! EDNS, no TCP framing, no DNSSEC record types).

pub mod types;
pub mod wire;

pub use types::*;
