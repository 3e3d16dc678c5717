//! Domain name normalization and the superdomain relation.
//!
//! Grounded on `dns_utils.py` (`normalize_domain`, `get_parent_domain`,
//! `is_superdomain`, `closest_superdomain`) from the original crawler, and on
//! the `DomainName` wire type in the reference resolver's protocol types for
//! the label-based representation.

use std::fmt;

/// A fully-qualified domain name in canonical form: lowercase, trailing dot,
/// no empty labels except the root itself.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Name {
    /// Labels from most-specific to least-specific, e.g. `www.example.com.`
    /// is `["www", "example", "com"]`. The root is the empty vec.
    labels: Vec<String>,
}

impl Name {
    /// The root name `.`.
    pub fn root() -> Self {
        Name { labels: Vec::new() }
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Normalizes a raw string into canonical form. Mirrors
    /// `normalize_domain`: lowercase, strip any trailing dot before
    /// re-splitting, drop empty intermediate labels (so "example..com"
    /// collapses), and treat the empty string as the root.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim().trim_end_matches('.');
        if trimmed.is_empty() {
            return Name::root();
        }
        let labels = trimmed
            .split('.')
            .filter(|l| !l.is_empty())
            .map(str::to_lowercase)
            .collect();
        Name { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The immediate parent domain. The parent of the root is the root.
    pub fn parent(&self) -> Name {
        if self.labels.is_empty() {
            Name::root()
        } else {
            Name {
                labels: self.labels[1..].to_vec(),
            }
        }
    }

    /// True if `self` is equal to, or a subdomain of, `other`.
    pub fn is_subdomain_of(&self, other: &Name) -> bool {
        other.is_superdomain_of(self)
    }

    /// True if `self` is equal to, or a superdomain of, `other` — i.e.
    /// `other`'s labels end with `self`'s labels.
    pub fn is_superdomain_of(&self, other: &Name) -> bool {
        if self.labels.len() > other.labels.len() {
            return false;
        }
        let offset = other.labels.len() - self.labels.len();
        self.labels[..] == other.labels[offset..]
    }

    /// Among `candidates`, the one with the most labels that is still a
    /// superdomain of (or equal to, when `inclusive`) `self`. Mirrors
    /// `closest_superdomain`.
    pub fn closest_superdomain<'a, I>(&self, candidates: I, inclusive: bool) -> Option<&'a Name>
    where
        I: IntoIterator<Item = &'a Name>,
    {
        candidates
            .into_iter()
            .filter(|c| (inclusive || *c != self) && c.is_superdomain_of(self))
            .max_by_key(|c| c.labels.len())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            write!(f, ".")
        } else {
            for label in &self.labels {
                write!(f, "{label}.")?;
            }
            Ok(())
        }
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::normalize(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["Example.COM", "example.com.", "  example.com  ", "", "."] {
            let once = Name::normalize(raw);
            let twice = Name::normalize(&once.to_string());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn normalize_blank_is_root() {
        assert_eq!(Name::normalize(""), Name::root());
        assert_eq!(Name::normalize("."), Name::root());
    }

    #[test]
    fn parent_of_root_is_root() {
        assert_eq!(Name::root().parent(), Name::root());
    }

    #[test]
    fn parent_walks_up_one_label() {
        let n = Name::normalize("www.example.com.");
        assert_eq!(n.parent(), Name::normalize("example.com."));
        assert_eq!(n.parent().parent(), Name::normalize("com."));
        assert_eq!(n.parent().parent().parent(), Name::root());
    }

    #[test]
    fn is_superdomain_of_respects_label_boundaries() {
        let ample = Name::normalize("ample.com.");
        let example = Name::normalize("example.com.");
        assert!(!ample.is_superdomain_of(&example));
    }

    #[test]
    fn closest_superdomain_picks_longest_match() {
        let target = Name::normalize("www.a.b.example.com.");
        let com = Name::normalize("com.");
        let example_com = Name::normalize("example.com.");
        let b_example_com = Name::normalize("b.example.com.");
        let candidates = vec![com.clone(), example_com.clone(), b_example_com.clone()];
        let closest = target.closest_superdomain(&candidates, true);
        assert_eq!(closest, Some(&b_example_com));
    }

    #[test]
    fn closest_superdomain_none_when_no_match() {
        let target = Name::normalize("example.net.");
        let candidates = vec![Name::normalize("example.com.")];
        assert_eq!(target.closest_superdomain(&candidates, true), None);
    }
}
