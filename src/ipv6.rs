use std::net::Ipv6Addr;

use crate::key::AnonKey;
use crate::pfx::{Phase, PrefixTree};
use crate::prf::Prf;

/// Prefix-preserving IPv6 address anonymizer.
///
/// Identical to [`AnonIpv4`] apart from the 128-bit address width; see there
/// for the mode and marking rules.
///
/// [`AnonIpv4`]: crate::AnonIpv4
pub struct AnonIpv6 {
    prf: Prf,
    tree: PrefixTree,
    phase: Phase,
}

impl AnonIpv6 {
    /// Address width in bits.
    pub const WIDTH: usize = 128;

    pub fn new(key: &AnonKey) -> Self {
        AnonIpv6 {
            prf: Prf::new(key),
            tree: PrefixTree::new(Self::WIDTH, *key.pad()),
            phase: Phase::Init,
        }
    }

    pub fn set_used(&mut self, addr: Ipv6Addr, prefix_len: usize) {
        self.phase.require_init("set_used");
        self.tree.set_used(&addr.octets(), prefix_len);
    }

    pub fn map_pref(&mut self, addr: Ipv6Addr) -> Ipv6Addr {
        self.phase.to_non_lex();
        Ipv6Addr::from(self.tree.map(&self.prf, &addr.octets()))
    }

    pub fn map_pref_lex(&mut self, addr: Ipv6Addr) -> Ipv6Addr {
        if self.phase.to_lex() {
            self.tree.freeze(&self.prf);
        }
        Ipv6Addr::from(self.tree.map_lex(&self.prf, &addr.octets()))
    }

    pub fn nodes_count(&self) -> usize {
        self.tree.nodes_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Ipv6Addr {
        s.parse().unwrap()
    }

    #[test]
    fn same_key_same_mapping() {
        let key = AnonKey::from_passphrase("test");
        let mut a = AnonIpv6::new(&key);
        let mut b = AnonIpv6::new(&key);
        for s in ["2001:db8::1", "fe80::1", "::1"] {
            assert_eq!(a.map_pref(addr(s)), b.map_pref(addr(s)));
        }
    }

    #[test]
    fn prefixes_are_preserved() {
        let key = AnonKey::from_passphrase("test");
        let mut engine = AnonIpv6::new(&key);
        let a = u128::from(engine.map_pref(addr("2001:db8::1")));
        let b = u128::from(engine.map_pref(addr("2001:db8::2")));
        let c = u128::from(engine.map_pref(addr("2001:db9::1")));
        // 2001:db8::1 and ::2 share 126 bits
        assert_eq!(a >> 2, b >> 2);
        assert_ne!(a, b);
        // 2001:db8::/32 and 2001:db9::/32 share 31 bits
        assert_eq!(a >> 97, c >> 97);
        assert_ne!(a >> 96, c >> 96);
    }

    #[test]
    fn lex_mode_preserves_order() {
        let key = AnonKey::from_passphrase("test");
        let mut engine = AnonIpv6::new(&key);
        let inputs = ["2001:db8::1", "2001:db8::2", "fe80::1"];
        for s in inputs {
            engine.set_used(addr(s), AnonIpv6::WIDTH);
        }
        let outputs: Vec<u128> = inputs
            .iter()
            .map(|s| u128::from(engine.map_pref_lex(addr(s))))
            .collect();
        assert!(outputs[0] < outputs[1]);
        assert!(outputs[1] < outputs[2]);
    }

    #[test]
    fn nodes_count_is_lazy() {
        let key = AnonKey::from_passphrase("test");
        let mut engine = AnonIpv6::new(&key);
        engine.map_pref(addr("2001:db8::1"));
        assert!(engine.nodes_count() <= AnonIpv6::WIDTH + 1);
    }
}
