//! In-memory representation of a DNS message. Field names and the
//! `RecordTypeWithData` split follow the reference resolver's
//! `dns_types::protocol::types`, trimmed to the record types this crawler
//! issues or consumes.

use std::net::Ipv4Addr;

use crate::name::Name;

/// The handful of record types this crawler understands on the wire.
/// Anything else round-trips as `Unknown` so that unexpected record types in
/// a response don't cause the whole message to fail to parse.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordType {
    A,
    Ns,
    Soa,
    Unknown(u16),
}

impl RecordType {
    pub fn to_u16(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Ns => 2,
            RecordType::Soa => 6,
            RecordType::Unknown(v) => v,
        }
    }

    pub fn from_u16(v: u16) -> Self {
        match v {
            1 => RecordType::A,
            2 => RecordType::Ns,
            6 => RecordType::Soa,
            other => RecordType::Unknown(other),
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::Ns => write!(f, "NS"),
            RecordType::Soa => write!(f, "SOA"),
            RecordType::Unknown(v) => write!(f, "TYPE{v}"),
        }
    }
}

/// The question section of a query: this crawler only ever asks `IN`
/// questions, so class is not represented.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Question {
    pub name: Name,
    pub qtype: RecordType,
}

/// Record data, split out by type so callers can pattern-match without
/// re-parsing rdata bytes.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RecordTypeWithData {
    A {
        address: Ipv4Addr,
    },
    Ns {
        nsdname: Name,
    },
    Soa {
        mname: Name,
        rname: Name,
    },
    Unknown {
        rtype: u16,
        octets: Vec<u8>,
    },
}

impl RecordTypeWithData {
    pub fn rtype(&self) -> RecordType {
        match self {
            RecordTypeWithData::A { .. } => RecordType::A,
            RecordTypeWithData::Ns { .. } => RecordType::Ns,
            RecordTypeWithData::Soa { .. } => RecordType::Soa,
            RecordTypeWithData::Unknown { rtype, .. } => RecordType::Unknown(*rtype),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResourceRecord {
    pub name: Name,
    pub ttl: u32,
    pub rtype_with_data: RecordTypeWithData,
}

/// Response codes this crawler cares about distinguishing; anything else is
/// folded into `Other` since the resolution logic only branches on
/// NOERROR vs NXDOMAIN vs "anything else is an error".
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Rcode {
    NoError,
    NxDomain,
    Other(u8),
}

impl Rcode {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Rcode::NoError,
            3 => Rcode::NxDomain,
            other => Rcode::Other(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Rcode::NoError => 0,
            Rcode::NxDomain => 3,
            Rcode::Other(v) => v,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Header {
    pub id: u16,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub truncated: bool,
    pub rcode: Rcode,
    pub is_response: bool,
}

/// A full DNS message: one question, three record sections. This crawler
/// never sends more than one question and never needs the additional
/// section on outbound queries, but keeps it symmetric for parsing
/// responses, which do use it (for glue).
#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub question: Option<Question>,
    pub answer: Vec<ResourceRecord>,
    pub authority: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

impl Message {
    /// Builds a non-recursive query message for `question`, per the
    /// crawler's wire-protocol contract: RD cleared.
    pub fn query(id: u16, question: Question) -> Self {
        Message {
            header: Header {
                id,
                recursion_desired: false,
                recursion_available: false,
                truncated: false,
                rcode: Rcode::NoError,
                is_response: false,
            },
            question: Some(question),
            answer: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// A synthetic empty response used to represent a timed-out query after
    /// retries are exhausted, so the rest of the pipeline can treat timeout
    /// uniformly with a real (if useless) response.
    pub fn synthetic_timeout(id: u16) -> Self {
        Message {
            header: Header {
                id,
                recursion_desired: false,
                recursion_available: false,
                truncated: false,
                rcode: Rcode::Other(255),
                is_response: true,
            },
            question: None,
            answer: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    pub fn all_records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.answer
            .iter()
            .chain(self.authority.iter())
            .chain(self.additional.iter())
    }
}

#[cfg(test)]
pub mod test_util {
    use super::*;

    pub fn a_record(name: &str, address: Ipv4Addr) -> ResourceRecord {
        ResourceRecord {
            name: Name::normalize(name),
            ttl: 300,
            rtype_with_data: RecordTypeWithData::A { address },
        }
    }

    pub fn ns_record(name: &str, nsdname: &str) -> ResourceRecord {
        ResourceRecord {
            name: Name::normalize(name),
            ttl: 300,
            rtype_with_data: RecordTypeWithData::Ns {
                nsdname: Name::normalize(nsdname),
            },
        }
    }

    pub fn soa_record(name: &str) -> ResourceRecord {
        ResourceRecord {
            name: Name::normalize(name),
            ttl: 300,
            rtype_with_data: RecordTypeWithData::Soa {
                mname: Name::normalize(&format!("ns.{name}")),
                rname: Name::normalize(&format!("hostmaster.{name}")),
            },
        }
    }
}
