//! Nameserver records and blocks thereof. Grounded on `nsr.py`'s `NSR` and
//! `NSRBlock` classes: identity keyed on `(lowercased hostname, sorted IP
//! set)`, and the four-way `merge` join.

use std::collections::BTreeSet;

use crate::name::Name;

/// A single nameserver: a hostname plus whatever A-record IPs are known for
/// it. An empty `ips` means the hostname is known but not yet resolved
/// (a "missing" NSR in the cross-zone-resolution sense).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Nsr {
    pub hostname: Name,
    pub ips: BTreeSet<String>,
}

impl Nsr {
    pub fn new(hostname: Name, ips: impl IntoIterator<Item = String>) -> Self {
        Nsr {
            hostname,
            ips: ips.into_iter().collect(),
        }
    }

    pub fn unresolved(hostname: Name) -> Self {
        Nsr {
            hostname,
            ips: BTreeSet::new(),
        }
    }

    pub fn is_queryable(&self) -> bool {
        !self.ips.is_empty()
    }

    /// The `_key()` identity from the source: lowercased hostname is already
    /// guaranteed by `Name`'s canonical form, so identity is just the pair
    /// itself, compared structurally.
    fn identity(&self) -> (&Name, &BTreeSet<String>) {
        (&self.hostname, &self.ips)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum JoinKind {
    Outer,
    Left,
    Right,
    Inner,
}

/// A set of [`Nsr`]s advertised for one domain name, deduplicated by NSR
/// identity.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NsrBlock {
    pub name: Name,
    nsrs: Vec<Nsr>,
}

impl NsrBlock {
    pub fn empty(name: Name) -> Self {
        NsrBlock {
            name,
            nsrs: Vec::new(),
        }
    }

    pub fn new(name: Name, nsrs: impl IntoIterator<Item = Nsr>) -> Self {
        let mut block = NsrBlock::empty(name);
        for nsr in nsrs {
            block.add(nsr);
        }
        block
    }

    /// Inserts `nsr`, replacing any existing entry with the same identity.
    pub fn add(&mut self, nsr: Nsr) {
        if let Some(existing) = self
            .nsrs
            .iter()
            .position(|n| n.identity() == nsr.identity())
        {
            self.nsrs[existing] = nsr;
        } else {
            self.nsrs.push(nsr);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Nsr> {
        self.nsrs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.nsrs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nsrs.len()
    }

    pub fn hostnames(&self) -> impl Iterator<Item = &Name> {
        self.nsrs.iter().map(|n| &n.hostname)
    }

    pub fn queryable(&self) -> impl Iterator<Item = &Nsr> {
        self.nsrs.iter().filter(|n| n.is_queryable())
    }

    pub fn has_queryable(&self) -> bool {
        self.nsrs.iter().any(Nsr::is_queryable)
    }

    /// Replaces the entry for `hostname` (matching by hostname only, not
    /// full identity) with `replacement`, used after cross-zone IP
    /// resolution fills in a previously-unresolved NSR.
    pub fn replace_by_hostname(&mut self, hostname: &Name, replacement: Nsr) {
        if let Some(idx) = self.nsrs.iter().position(|n| &n.hostname == hostname) {
            self.nsrs[idx] = replacement;
        } else {
            self.nsrs.push(replacement);
        }
    }

    /// `NSRBlock.merge` from the source: four join kinds over NSR identity,
    /// keyed by hostname for membership tests (outer/left/right operate on
    /// "does this hostname appear on the other side", matching the
    /// `_resolve_cross_zone_nsrs` callers' expectations that a hostname with
    /// freshly-resolved IPs still counts as "present" on both sides).
    pub fn merge(&self, other: &NsrBlock, join_on: JoinKind) -> NsrBlock {
        let self_hostnames: BTreeSet<&Name> = self.hostnames().collect();
        let other_hostnames: BTreeSet<&Name> = other.hostnames().collect();

        let mut result = NsrBlock::empty(self.name.clone());
        match join_on {
            JoinKind::Outer => {
                for nsr in &self.nsrs {
                    result.add(nsr.clone());
                }
                for nsr in &other.nsrs {
                    result.add(nsr.clone());
                }
            }
            JoinKind::Left => {
                for nsr in &self.nsrs {
                    result.add(nsr.clone());
                }
                for nsr in &other.nsrs {
                    if self_hostnames.contains(&nsr.hostname) {
                        result.add(nsr.clone());
                    }
                }
            }
            JoinKind::Right => {
                for nsr in &other.nsrs {
                    result.add(nsr.clone());
                }
                for nsr in &self.nsrs {
                    if other_hostnames.contains(&nsr.hostname) {
                        result.add(nsr.clone());
                    }
                }
            }
            JoinKind::Inner => {
                for nsr in &self.nsrs {
                    if other_hostnames.contains(&nsr.hostname) {
                        result.add(nsr.clone());
                    }
                }
                for nsr in &other.nsrs {
                    if self_hostnames.contains(&nsr.hostname) {
                        result.add(nsr.clone());
                    }
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;

    fn nsr(host: &str, ips: &[&str]) -> Nsr {
        Nsr::new(
            Name::normalize(host),
            ips.iter().map(|s| s.to_string()),
        )
    }

    #[test]
    fn add_dedups_by_identity() {
        let mut block = NsrBlock::empty(Name::normalize("example.com."));
        block.add(nsr("ns1.example.com.", &["1.1.1.1"]));
        block.add(nsr("ns1.example.com.", &["1.1.1.1"]));
        assert_eq!(block.len(), 1);
    }

    #[test]
    fn outer_merge_is_union() {
        let a = NsrBlock::new(
            Name::root(),
            vec![nsr("ns1.example.com.", &["1.1.1.1"])],
        );
        let b = NsrBlock::new(
            Name::root(),
            vec![nsr("ns2.example.com.", &["2.2.2.2"])],
        );
        let merged = a.merge(&b, JoinKind::Outer);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn left_merge_keeps_self_and_matching_hostnames_from_other() {
        let a = NsrBlock::new(
            Name::root(),
            vec![
                nsr("ns1.example.com.", &[]),
                nsr("ns2.example.com.", &["2.2.2.2"]),
            ],
        );
        let b = NsrBlock::new(
            Name::root(),
            vec![
                nsr("ns1.example.com.", &["1.1.1.1"]),
                nsr("ns3.example.com.", &["3.3.3.3"]),
            ],
        );
        let merged = a.merge(&b, JoinKind::Left);
        // Identity is (hostname, ips), so the unresolved `ns1` from `a` and
        // the resolved `ns1` from `b` are distinct entries and both survive.
        assert_eq!(merged.len(), 3);
        assert!(merged
            .iter()
            .any(|n| n.hostname == Name::normalize("ns1.example.com.") && n.is_queryable()));
        assert!(merged
            .iter()
            .any(|n| n.hostname == Name::normalize("ns1.example.com.") && !n.is_queryable()));
        assert!(!merged
            .hostnames()
            .any(|h| h == &Name::normalize("ns3.example.com.")));
    }

    #[test]
    fn inner_merge_keeps_only_shared_hostnames() {
        let a = NsrBlock::new(Name::root(), vec![nsr("ns1.example.com.", &[])]);
        let b = NsrBlock::new(Name::root(), vec![nsr("ns2.example.com.", &[])]);
        let merged = a.merge(&b, JoinKind::Inner);
        assert!(merged.is_empty());
    }
}
