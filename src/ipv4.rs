use std::net::Ipv4Addr;

use crate::key::AnonKey;
use crate::pfx::{Phase, PrefixTree};
use crate::prf::Prf;

/// Prefix-preserving IPv4 address anonymizer.
///
/// Two inputs sharing a k-bit prefix are mapped to outputs sharing a k-bit
/// prefix. The engine starts out accepting [`set_used`] marks; the first
/// [`map_pref`] call commits it to plain prefix-preserving mode, while the
/// first [`map_pref_lex`] call commits it to the mode that additionally
/// preserves lexicographic order across the marked set. The two modes cannot
/// be mixed on one engine instance.
///
/// [`set_used`]: AnonIpv4::set_used
/// [`map_pref`]: AnonIpv4::map_pref
/// [`map_pref_lex`]: AnonIpv4::map_pref_lex
pub struct AnonIpv4 {
    prf: Prf,
    tree: PrefixTree,
    phase: Phase,
}

impl AnonIpv4 {
    /// Address width in bits.
    pub const WIDTH: usize = 32;

    /// Creates an engine bound to the given key. Engines constructed from
    /// the same key produce identical mappings.
    pub fn new(key: &AnonKey) -> Self {
        AnonIpv4 {
            prf: Prf::new(key),
            tree: PrefixTree::new(Self::WIDTH, *key.pad()),
            phase: Phase::Init,
        }
    }

    fn block(addr: Ipv4Addr) -> [u8; 16] {
        let mut block = [0u8; 16];
        block[..4].copy_from_slice(&addr.octets());
        block
    }

    fn addr(block: &[u8; 16]) -> Ipv4Addr {
        Ipv4Addr::new(block[0], block[1], block[2], block[3])
    }

    /// Marks the leading `prefix_len` bits of `addr` for a later
    /// order-preserving mapping. Only permitted before the first mapping
    /// call; a plain [`map_pref`] session ignores the marks.
    ///
    /// # Panics
    ///
    /// Panics if `prefix_len > 32` or if a mapping call was already made.
    ///
    /// [`map_pref`]: AnonIpv4::map_pref
    pub fn set_used(&mut self, addr: Ipv4Addr, prefix_len: usize) {
        self.phase.require_init("set_used");
        self.tree.set_used(&Self::block(addr), prefix_len);
    }

    /// Maps an address, preserving prefix relationships.
    pub fn map_pref(&mut self, addr: Ipv4Addr) -> Ipv4Addr {
        self.phase.to_non_lex();
        let out = self.tree.map(&self.prf, &Self::block(addr));
        Self::addr(&out)
    }

    /// Maps an address, preserving prefix relationships and lexicographic
    /// order across the marked set. The first call computes the complete
    /// order-consistent assignment; later calls are lookups.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not covered by any marked prefix, or if the
    /// engine already performed plain mappings.
    pub fn map_pref_lex(&mut self, addr: Ipv4Addr) -> Ipv4Addr {
        if self.phase.to_lex() {
            self.tree.freeze(&self.prf);
        }
        let out = self.tree.map_lex(&self.prf, &Self::block(addr));
        Self::addr(&out)
    }

    /// Number of trie nodes allocated so far.
    pub fn nodes_count(&self) -> usize {
        self.tree.nodes_count()
    }
}
