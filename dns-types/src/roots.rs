//! The seed nameserver block for the root zone. Grounded on
//! `dns_utils.py`'s `get_root_nsr_block`.

use crate::name::Name;
use crate::nsr::{Nsr, NsrBlock};

pub fn root_hints() -> NsrBlock {
    NsrBlock::new(
        Name::root(),
        vec![Nsr::new(
            Name::normalize("a.root-servers.net."),
            vec!["198.41.0.4".to_string()],
        )],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_hints_has_one_queryable_nsr() {
        let hints = root_hints();
        assert_eq!(hints.len(), 1);
        assert!(hints.has_queryable());
    }
}
