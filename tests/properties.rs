//! Property tests for the anonymization invariants.

use std::collections::BTreeSet;
use std::net::{Ipv4Addr, Ipv6Addr};

use proptest::prelude::*;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use traceanon::{AnonIpv4, AnonIpv6, AnonKey, AnonMac, AnonOcts, AnonU64, MacAddr};

fn shared_prefix_len_32(a: u32, b: u32) -> u32 {
    (a ^ b).leading_zeros()
}

fn shared_prefix_len_128(a: u128, b: u128) -> u32 {
    (a ^ b).leading_zeros()
}

proptest! {
    #[test]
    fn ipv4_prefix_preservation(addrs in prop::collection::vec(any::<u32>(), 2..20)) {
        let key = AnonKey::from_passphrase("prop");
        let mut engine = AnonIpv4::new(&key);
        let outputs: Vec<u32> = addrs
            .iter()
            .map(|&addr| u32::from(engine.map_pref(Ipv4Addr::from(addr))))
            .collect();
        for i in 0..addrs.len() {
            for j in (i + 1)..addrs.len() {
                let shared = shared_prefix_len_32(addrs[i], addrs[j]);
                prop_assert!(shared_prefix_len_32(outputs[i], outputs[j]) >= shared);
                if addrs[i] != addrs[j] {
                    // inputs differing right after the shared prefix keep
                    // exactly that prefix in common
                    prop_assert_eq!(shared_prefix_len_32(outputs[i], outputs[j]), shared);
                }
            }
        }
    }

    #[test]
    fn ipv4_mapping_is_injective_and_deterministic(addrs in prop::collection::vec(any::<u32>(), 1..30)) {
        let key = AnonKey::from_passphrase("prop");
        let mut a = AnonIpv4::new(&key);
        let mut b = AnonIpv4::new(&key);
        let mut seen = BTreeSet::new();
        for &addr in &addrs {
            let out = a.map_pref(Ipv4Addr::from(addr));
            prop_assert_eq!(out, b.map_pref(Ipv4Addr::from(addr)));
            seen.insert(u32::from(out));
        }
        let distinct: BTreeSet<u32> = addrs.iter().copied().collect();
        prop_assert_eq!(seen.len(), distinct.len());
    }

    #[test]
    fn ipv4_lex_mode_is_monotone_and_prefix_preserving(addrs in prop::collection::btree_set(any::<u32>(), 2..20)) {
        let key = AnonKey::from_passphrase("prop");
        let mut engine = AnonIpv4::new(&key);
        for &addr in &addrs {
            engine.set_used(Ipv4Addr::from(addr), AnonIpv4::WIDTH);
        }
        let inputs: Vec<u32> = addrs.into_iter().collect();
        let outputs: Vec<u32> = inputs
            .iter()
            .map(|&addr| u32::from(engine.map_pref_lex(Ipv4Addr::from(addr))))
            .collect();
        for pair in outputs.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
        for i in 0..inputs.len() {
            for j in (i + 1)..inputs.len() {
                let shared = shared_prefix_len_32(inputs[i], inputs[j]);
                prop_assert_eq!(shared_prefix_len_32(outputs[i], outputs[j]), shared);
            }
        }
    }

    #[test]
    fn ipv6_prefix_preservation(addrs in prop::collection::vec(any::<u128>(), 2..10)) {
        let key = AnonKey::from_passphrase("prop");
        let mut engine = AnonIpv6::new(&key);
        let outputs: Vec<u128> = addrs
            .iter()
            .map(|&addr| u128::from(engine.map_pref(Ipv6Addr::from(addr))))
            .collect();
        for i in 0..addrs.len() {
            for j in (i + 1)..addrs.len() {
                if addrs[i] != addrs[j] {
                    let shared = shared_prefix_len_128(addrs[i], addrs[j]);
                    prop_assert_eq!(shared_prefix_len_128(outputs[i], outputs[j]), shared);
                }
            }
        }
    }

    #[test]
    fn ipv6_lex_mode_is_monotone(addrs in prop::collection::btree_set(any::<u128>(), 2..12)) {
        let key = AnonKey::from_passphrase("prop");
        let mut engine = AnonIpv6::new(&key);
        for &addr in &addrs {
            engine.set_used(Ipv6Addr::from(addr), AnonIpv6::WIDTH);
        }
        let outputs: Vec<u128> = addrs
            .iter()
            .map(|&addr| u128::from(engine.map_pref_lex(Ipv6Addr::from(addr))))
            .collect();
        for pair in outputs.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn mac_flag_bits_are_preserved(octets in any::<[u8; 6]>()) {
        let key = AnonKey::from_passphrase("prop");
        let mut engine = AnonMac::new(&key);
        let input = MacAddr::new(octets);
        let output = engine.map(input);
        prop_assert_eq!(input.is_group(), output.is_group());
        prop_assert_eq!(input.is_local(), output.is_local());
    }

    #[test]
    fn mac_lex_mode_is_monotone_per_scope(
        tails in prop::collection::btree_set(any::<[u8; 5]>(), 2..12),
        first in any::<u8>(),
    ) {
        let key = AnonKey::from_passphrase("prop");
        let mut engine = AnonMac::new(&key);
        // a fixed first octet keeps every address in one flag scope
        let inputs: Vec<MacAddr> = tails
            .iter()
            .map(|tail| {
                let mut octets = [first, 0, 0, 0, 0, 0];
                octets[1..].copy_from_slice(tail);
                MacAddr::new(octets)
            })
            .collect();
        for &input in &inputs {
            engine.set_used(input);
        }
        let outputs: Vec<MacAddr> = inputs.iter().map(|&input| engine.map_lex(input)).collect();
        for pair in outputs.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn uint64_outputs_stay_inside_the_range(
        bounds in any::<(u64, u64)>(),
        nums in prop::collection::vec(any::<u64>(), 1..20),
    ) {
        let (a, b) = bounds;
        let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
        prop_assume!(u128::from(upper - lower) + 1 >= 20);
        let mut engine = AnonU64::with_rng(lower, upper, ChaCha20Rng::seed_from_u64(7));
        for &num in &nums {
            let anum = engine.map(num);
            prop_assert!((lower..=upper).contains(&anum));
            prop_assert_eq!(engine.map(num), anum);
        }
    }

    #[test]
    fn uint64_lex_mode_is_monotone(nums in prop::collection::btree_set(any::<u64>(), 2..40)) {
        let mut engine = AnonU64::with_rng(0, u64::MAX, ChaCha20Rng::seed_from_u64(7));
        for &num in &nums {
            engine.set_used(num);
        }
        let outputs: Vec<u64> = nums.iter().map(|&num| engine.map_lex(num)).collect();
        for pair in outputs.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn octs_classes_and_length_are_preserved(input in "[ -~]{0,24}") {
        let mut engine = AnonOcts::with_rng(ChaCha20Rng::seed_from_u64(7));
        let output = engine.map(input.as_bytes());
        prop_assert_eq!(output.len(), input.len());
        for (i, o) in input.bytes().zip(&output) {
            prop_assert_eq!(i.is_ascii_lowercase(), o.is_ascii_lowercase());
            prop_assert_eq!(i.is_ascii_uppercase(), o.is_ascii_uppercase());
            prop_assert_eq!(i.is_ascii_digit(), o.is_ascii_digit());
            if !i.is_ascii_alphanumeric() {
                prop_assert_eq!(i, *o);
            }
        }
    }

    #[test]
    fn octs_lex_mode_is_monotone(inputs in prop::collection::btree_set("[a-zA-Z0-9._-]{0,12}", 2..16)) {
        let mut engine = AnonOcts::with_rng(ChaCha20Rng::seed_from_u64(7));
        for input in &inputs {
            engine.set_used(input.as_bytes());
        }
        let outputs: Vec<Vec<u8>> = inputs
            .iter()
            .map(|input| engine.map_lex(input.as_bytes()))
            .collect();
        for pair in outputs.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn octs_mapping_is_injective(inputs in prop::collection::btree_set("[a-z0-9]{1,8}", 1..20)) {
        let mut engine = AnonOcts::with_rng(ChaCha20Rng::seed_from_u64(7));
        let outputs: BTreeSet<Vec<u8>> = inputs
            .iter()
            .map(|input| engine.map(input.as_bytes()))
            .collect();
        prop_assert_eq!(outputs.len(), inputs.len());
    }
}
