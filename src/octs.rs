use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::mem;
use std::ops::RangeInclusive;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::key::AnonKey;

/// Character classes preserved per position. Bytes outside every class pass
/// through unchanged.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum Class {
    Lower,
    Upper,
    Digit,
}

impl Class {
    fn of(byte: u8) -> Option<Class> {
        match byte {
            b'a'..=b'z' => Some(Class::Lower),
            b'A'..=b'Z' => Some(Class::Upper),
            b'0'..=b'9' => Some(Class::Digit),
            _ => None,
        }
    }

    fn alphabet(self) -> RangeInclusive<u8> {
        match self {
            Class::Lower => b'a'..=b'z',
            Class::Upper => b'A'..=b'Z',
            Class::Digit => b'0'..=b'9',
        }
    }
}

/// Pseudonymizer for octet strings.
///
/// The output has the same length as the input and, per position, the same
/// character class (lowercase, uppercase, digit); all other bytes are
/// copied through. Each position maps its class members through a random
/// injection that is consistent across all inputs of the session. In
/// lexicographic mode the per-position injections are chosen
/// order-preserving, which makes the whole mapping monotone under byte-wise
/// lexicographic comparison: class members stay inside their class's byte
/// range and unclassified bytes are fixed points, so the first differing
/// position keeps its ordering.
pub struct AnonOcts {
    rng: Box<dyn RngCore>,
    phase: OctsPhase,
}

enum OctsPhase {
    Init {
        marked: BTreeSet<Vec<u8>>,
    },
    NonLex {
        tables: HashMap<(usize, Class), Subst>,
    },
    Lex {
        tables: HashMap<(usize, Class), BTreeMap<u8, u8>>,
    },
}

/// A growing random injection for one (position, class) pair.
#[derive(Default)]
struct Subst {
    fwd: HashMap<u8, u8>,
    taken: HashSet<u8>,
}

impl Default for AnonOcts {
    fn default() -> Self {
        Self::new()
    }
}

impl AnonOcts {
    pub fn new() -> Self {
        Self::with_rng(ChaCha20Rng::from_entropy())
    }

    /// Creates an engine drawing from the supplied randomness source.
    pub fn with_rng<R: RngCore + 'static>(rng: R) -> Self {
        AnonOcts {
            rng: Box::new(rng),
            phase: OctsPhase::Init {
                marked: BTreeSet::new(),
            },
        }
    }

    /// Reseeds the randomness source from the key, making the mapping
    /// reproducible under that key. Only permitted before the first mapping
    /// call.
    pub fn set_key(&mut self, key: &AnonKey) {
        assert!(
            matches!(self.phase, OctsPhase::Init { .. }),
            "set_key is only permitted before the first mapping call"
        );
        self.rng = Box::new(ChaCha20Rng::from_seed(key.derive_seed(b"octs")));
    }

    /// Marks a string for a later order-preserving mapping. Idempotent.
    pub fn set_used(&mut self, input: &[u8]) {
        let OctsPhase::Init { marked } = &mut self.phase else {
            panic!("set_used is only permitted before the first mapping call");
        };
        marked.insert(input.to_vec());
    }

    /// Maps a string to its same-length, same-class pseudonym.
    pub fn map(&mut self, input: &[u8]) -> Vec<u8> {
        match &self.phase {
            OctsPhase::Init { .. } => {
                self.phase = OctsPhase::NonLex {
                    tables: HashMap::new(),
                }
            }
            OctsPhase::NonLex { .. } => {}
            OctsPhase::Lex { .. } => {
                panic!("engine is in lexicographic mode; plain mapping is no longer permitted")
            }
        }
        let OctsPhase::NonLex { tables } = &mut self.phase else {
            unreachable!()
        };
        let mut out = Vec::with_capacity(input.len());
        for (pos, &byte) in input.iter().enumerate() {
            let Some(class) = Class::of(byte) else {
                out.push(byte);
                continue;
            };
            let subst = tables.entry((pos, class)).or_default();
            let mapped = match subst.fwd.get(&byte) {
                Some(&mapped) => mapped,
                None => loop {
                    let candidate = self.rng.gen_range(class.alphabet());
                    if subst.taken.insert(candidate) {
                        subst.fwd.insert(byte, candidate);
                        break candidate;
                    }
                },
            };
            out.push(mapped);
        }
        out
    }

    /// Maps a previously marked string, preserving byte-wise lexicographic
    /// order across the marked set. The first call computes the complete
    /// assignment; later calls are lookups.
    ///
    /// # Panics
    ///
    /// Panics if `input` contains a class byte that never occurred at that
    /// position in the marked set (in particular for unmarked strings), or
    /// if the engine already performed plain mappings.
    pub fn map_lex(&mut self, input: &[u8]) -> Vec<u8> {
        if matches!(self.phase, OctsPhase::Init { .. }) {
            self.assign_lex();
        }
        let OctsPhase::Lex { tables } = &self.phase else {
            panic!("engine already performed plain mappings; lexicographic mapping is no longer permitted")
        };
        let mut out = Vec::with_capacity(input.len());
        for (pos, &byte) in input.iter().enumerate() {
            let Some(class) = Class::of(byte) else {
                out.push(byte);
                continue;
            };
            let mapped = tables
                .get(&(pos, class))
                .and_then(|table| table.get(&byte))
                .unwrap_or_else(|| {
                    panic!("octet string was not marked before lexicographic mapping")
                });
            out.push(*mapped);
        }
        out
    }

    /// Builds, for every (position, class) pair seen in the marked set, an
    /// order-preserving injection by pairing the sorted marked bytes with an
    /// equally sized sorted random draw from the class alphabet.
    fn assign_lex(&mut self) {
        let placeholder = OctsPhase::Lex {
            tables: HashMap::new(),
        };
        let OctsPhase::Init { marked } = mem::replace(&mut self.phase, placeholder) else {
            unreachable!()
        };
        let mut seen: HashMap<(usize, Class), BTreeSet<u8>> = HashMap::new();
        for string in &marked {
            for (pos, &byte) in string.iter().enumerate() {
                if let Some(class) = Class::of(byte) {
                    seen.entry((pos, class)).or_default().insert(byte);
                }
            }
        }
        let mut tables = HashMap::with_capacity(seen.len());
        for ((pos, class), bytes) in seen {
            let mut draws = BTreeSet::new();
            while draws.len() < bytes.len() {
                draws.insert(self.rng.gen_range(class.alphabet()));
            }
            tables.insert((pos, class), bytes.into_iter().zip(draws).collect());
        }
        self.phase = OctsPhase::Lex { tables };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_pattern(bytes: &[u8]) -> Vec<Option<Class>> {
        bytes.iter().map(|&byte| Class::of(byte)).collect()
    }

    #[test]
    fn length_and_classes_are_preserved() {
        let mut engine = AnonOcts::new();
        for input in ["user42", "HOST-a.example", "", "123", "\t ~"] {
            let out = engine.map(input.as_bytes());
            assert_eq!(out.len(), input.len());
            assert_eq!(class_pattern(&out), class_pattern(input.as_bytes()));
        }
    }

    #[test]
    fn unclassified_bytes_pass_through() {
        let mut engine = AnonOcts::new();
        let out = engine.map(b"a-b_c.d");
        assert_eq!(out[1], b'-');
        assert_eq!(out[3], b'_');
        assert_eq!(out[5], b'.');
    }

    #[test]
    fn mapping_is_consistent_across_inputs() {
        let mut engine = AnonOcts::new();
        let abc = engine.map(b"abc");
        let abd = engine.map(b"abd");
        // shared positions map identically
        assert_eq!(abc[..2], abd[..2]);
        assert_ne!(abc[2], abd[2]);
        assert_eq!(engine.map(b"abc"), abc);
    }

    #[test]
    fn lex_mode_preserves_order() {
        let mut engine = AnonOcts::new();
        let inputs: [&[u8]; 4] = [b"aaa", b"aab", b"abz", b"zzz"];
        for input in inputs {
            engine.set_used(input);
        }
        let outputs: Vec<Vec<u8>> = inputs.iter().map(|input| engine.map_lex(input)).collect();
        for pair in outputs.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        for (input, output) in inputs.iter().zip(&outputs) {
            assert_eq!(class_pattern(output), class_pattern(input));
        }
    }

    #[test]
    fn lex_mode_handles_mixed_lengths_and_classes() {
        let mut engine = AnonOcts::new();
        let inputs: [&[u8]; 5] = [b"Abc", b"a1", b"a1x", b"b-2", b"b:2"];
        let mut sorted = inputs.to_vec();
        sorted.sort_unstable();
        for input in inputs {
            engine.set_used(input);
        }
        let outputs: Vec<Vec<u8>> = sorted.iter().map(|input| engine.map_lex(input)).collect();
        for pair in outputs.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn keyed_engines_are_reproducible() {
        let key = AnonKey::from_passphrase("test");
        let mut a = AnonOcts::new();
        let mut b = AnonOcts::new();
        a.set_key(&key);
        b.set_key(&key);
        for input in ["alpha", "beta", "gamma42"] {
            assert_eq!(a.map(input.as_bytes()), b.map(input.as_bytes()));
        }
    }

    #[test]
    #[should_panic(expected = "was not marked")]
    fn unmarked_string_in_lex_mode_panics() {
        let mut engine = AnonOcts::new();
        engine.set_used(b"aaa");
        engine.map_lex(b"bbb");
    }

    #[test]
    #[should_panic(expected = "plain mapping is no longer permitted")]
    fn map_after_map_lex_panics() {
        let mut engine = AnonOcts::new();
        engine.set_used(b"aaa");
        engine.map_lex(b"aaa");
        engine.map(b"aaa");
    }
}
