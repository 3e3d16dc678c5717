//! Folds the record sections of one DNS response into lookup tables keyed by
//! owner name. Grounded on `dns_parser.py`'s `DNSRelationMap`
//! (`storeNS`/`storeA`/`hosts_with_nameservers`/`getNSRBlock`); the broken
//! `parse_dns_response_A` path in the same file is not ported — A-record
//! extraction for an `IPResolution` target goes directly through
//! [`Message::all_records`] instead.

use std::collections::{BTreeSet, HashMap};

use crate::name::Name;
use crate::nsr::{Nsr, NsrBlock};
use crate::protocol::types::{Message, RecordTypeWithData};

#[derive(Debug, Clone, Default)]
pub struct DnsRelationMap {
    ns_targets: HashMap<Name, BTreeSet<Name>>,
    a_records: HashMap<Name, BTreeSet<String>>,
    has_soa: HashMap<Name, bool>,
}

impl DnsRelationMap {
    /// Folds several responses (e.g. one per queried nameserver IP) into a
    /// single relation map, since a `QueryBlock` fans out to every
    /// queryable NSR and the resolution logic operates on their union.
    pub fn from_messages<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Self {
        let mut map = DnsRelationMap::default();
        for message in messages {
            map.fold_in(message);
        }
        map
    }

    pub fn from_message(message: &Message) -> Self {
        let mut map = DnsRelationMap::default();
        map.fold_in(message);
        map
    }

    fn fold_in(&mut self, message: &Message) {
        let map = self;
        for rr in message.all_records() {
            match &rr.rtype_with_data {
                RecordTypeWithData::Ns { nsdname } => {
                    map.ns_targets
                        .entry(rr.name.clone())
                        .or_default()
                        .insert(nsdname.clone());
                }
                RecordTypeWithData::A { address } => {
                    map.a_records
                        .entry(rr.name.clone())
                        .or_default()
                        .insert(address.to_string());
                }
                RecordTypeWithData::Soa { .. } => {
                    map.has_soa.insert(rr.name.clone(), true);
                }
                RecordTypeWithData::Unknown { .. } => {}
            }
        }
    }

    pub fn hosts_with_nameservers(&self) -> impl Iterator<Item = &Name> {
        self.ns_targets.keys()
    }

    pub fn has_soa_for(&self, name: &Name) -> bool {
        self.has_soa.get(name).copied().unwrap_or(false)
    }

    pub fn a_records_for(&self, name: &Name) -> BTreeSet<String> {
        self.a_records.get(name).cloned().unwrap_or_default()
    }

    /// Assembles an [`NsrBlock`] for `name` from its NS targets, attaching
    /// any A-record glue already present in this same response. Targets
    /// with no glue get an unresolved [`Nsr`] (empty IP set) that later
    /// cross-zone resolution will fill in. Returns `None` if `name` has no
    /// NS records in this map at all.
    pub fn get_nsr_block(&self, name: &Name) -> Option<NsrBlock> {
        let targets = self.ns_targets.get(name)?;
        let mut block = NsrBlock::empty(name.clone());
        for target in targets {
            let ips = self.a_records_for(target);
            block.add(if ips.is_empty() {
                Nsr::unresolved(target.clone())
            } else {
                Nsr::new(target.clone(), ips)
            });
        }
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::test_util::*;
    use crate::protocol::types::{Header, Message, Rcode};

    fn message_with(rrs: Vec<crate::protocol::types::ResourceRecord>) -> Message {
        Message {
            header: Header {
                id: 1,
                recursion_desired: false,
                recursion_available: false,
                truncated: false,
                rcode: Rcode::NoError,
                is_response: true,
            },
            question: None,
            answer: rrs,
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    #[test]
    fn empty_response_yields_empty_map() {
        let map = DnsRelationMap::from_message(&message_with(vec![]));
        assert_eq!(map.hosts_with_nameservers().count(), 0);
        assert_eq!(
            map.get_nsr_block(&Name::normalize("example.com.")),
            None
        );
    }

    #[test]
    fn nsr_block_attaches_glue_when_present() {
        let rrs = vec![
            ns_record("example.com.", "ns1.example.com."),
            a_record("ns1.example.com.", "1.1.1.1".parse().unwrap()),
        ];
        let map = DnsRelationMap::from_message(&message_with(rrs));
        let block = map.get_nsr_block(&Name::normalize("example.com.")).unwrap();
        assert_eq!(block.len(), 1);
        let nsr = block.iter().next().unwrap();
        assert!(nsr.is_queryable());
        assert!(nsr.ips.contains("1.1.1.1"));
    }

    #[test]
    fn nsr_block_leaves_unresolved_without_glue() {
        let rrs = vec![ns_record("example.com.", "ns1.example.com.")];
        let map = DnsRelationMap::from_message(&message_with(rrs));
        let block = map.get_nsr_block(&Name::normalize("example.com.")).unwrap();
        assert!(!block.iter().next().unwrap().is_queryable());
    }

    #[test]
    fn soa_without_ns_signals_empty_non_terminal() {
        let rrs = vec![soa_record("example.com.")];
        let map = DnsRelationMap::from_message(&message_with(rrs));
        assert!(map.has_soa_for(&Name::normalize("example.com.")));
        assert_eq!(map.get_nsr_block(&Name::normalize("example.com.")), None);
    }
}
