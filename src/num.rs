use std::collections::{BTreeSet, HashMap, HashSet};
use std::mem;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::key::AnonKey;

/// Pseudonymizer for unsigned 64-bit numbers.
///
/// Numbers are mapped into the inclusive range `[lower, upper]`, each input
/// receiving a pseudonym drawn without replacement, so the number of
/// distinct inputs must not exceed `upper - lower + 1`.
///
/// By default the engine draws from a ChaCha20 stream seeded from OS
/// entropy. [`set_key`] reseeds the stream deterministically from a key, and
/// [`with_rng`] injects an arbitrary randomness source.
///
/// [`set_key`]: AnonU64::set_key
/// [`with_rng`]: AnonU64::with_rng
pub struct AnonU64 {
    lower: u64,
    upper: u64,
    range: u128,
    rng: Box<dyn RngCore>,
    phase: NumPhase,
}

enum NumPhase {
    Init {
        marked: BTreeSet<u64>,
    },
    NonLex {
        table: HashMap<u64, u64>,
        assigned: HashSet<u64>,
    },
    Lex {
        table: HashMap<u64, u64>,
    },
}

impl AnonU64 {
    /// Creates an engine for pseudonyms in `[lower, upper]`.
    ///
    /// # Panics
    ///
    /// Panics if `lower > upper`.
    pub fn new(lower: u64, upper: u64) -> Self {
        Self::with_rng(lower, upper, ChaCha20Rng::from_entropy())
    }

    /// Creates an engine drawing from the supplied randomness source.
    pub fn with_rng<R: RngCore + 'static>(lower: u64, upper: u64, rng: R) -> Self {
        assert!(lower <= upper, "lower bound {lower} exceeds upper bound {upper}");
        AnonU64 {
            lower,
            upper,
            range: u128::from(upper - lower) + 1,
            rng: Box::new(rng),
            phase: NumPhase::Init {
                marked: BTreeSet::new(),
            },
        }
    }

    /// Reseeds the randomness source from the key, making the mapping
    /// reproducible under that key. Only permitted before the first mapping
    /// call.
    pub fn set_key(&mut self, key: &AnonKey) {
        assert!(
            matches!(self.phase, NumPhase::Init { .. }),
            "set_key is only permitted before the first mapping call"
        );
        self.rng = Box::new(ChaCha20Rng::from_seed(key.derive_seed(b"uint64")));
    }

    /// Marks a number for a later order-preserving mapping. Idempotent.
    pub fn set_used(&mut self, num: u64) {
        let NumPhase::Init { marked } = &mut self.phase else {
            panic!("set_used is only permitted before the first mapping call");
        };
        marked.insert(num);
    }

    /// Maps a number to its pseudonym, assigning a fresh one on first sight.
    ///
    /// # Panics
    ///
    /// Panics if the number of distinct inputs exceeds the range, or if the
    /// engine is in lexicographic mode.
    pub fn map(&mut self, num: u64) -> u64 {
        match &self.phase {
            NumPhase::Init { .. } => {
                self.phase = NumPhase::NonLex {
                    table: HashMap::new(),
                    assigned: HashSet::new(),
                }
            }
            NumPhase::NonLex { .. } => {}
            NumPhase::Lex { .. } => {
                panic!("engine is in lexicographic mode; plain mapping is no longer permitted")
            }
        }
        let (lower, upper, range) = (self.lower, self.upper, self.range);
        let NumPhase::NonLex { table, assigned } = &mut self.phase else {
            unreachable!()
        };
        if let Some(&anum) = table.get(&num) {
            return anum;
        }
        assert!(
            (table.len() as u128) < range,
            "more numbers to anonymize than fit in the range {lower}..={upper}"
        );
        loop {
            let anum = self.rng.gen_range(lower..=upper);
            if assigned.insert(anum) {
                table.insert(num, anum);
                return anum;
            }
        }
    }

    /// Maps a previously marked number, preserving numeric order across the
    /// marked set. The first call computes the complete assignment; later
    /// calls are lookups.
    ///
    /// # Panics
    ///
    /// Panics if `num` was not marked, if the marked set exceeds the range,
    /// or if the engine already performed plain mappings.
    pub fn map_lex(&mut self, num: u64) -> u64 {
        if matches!(self.phase, NumPhase::Init { .. }) {
            self.assign_lex();
        }
        match &self.phase {
            NumPhase::Lex { table } => match table.get(&num) {
                Some(&anum) => anum,
                None => panic!("{num} was not marked before lexicographic mapping"),
            },
            NumPhase::NonLex { .. } => {
                panic!("engine already performed plain mappings; lexicographic mapping is no longer permitted")
            }
            NumPhase::Init { .. } => unreachable!(),
        }
    }

    /// Draws one distinct pseudonym per marked number and pairs the sorted
    /// draws with the ascending marked set.
    fn assign_lex(&mut self) {
        let placeholder = NumPhase::Lex {
            table: HashMap::new(),
        };
        let NumPhase::Init { marked } = mem::replace(&mut self.phase, placeholder) else {
            unreachable!()
        };
        assert!(
            (marked.len() as u128) <= self.range,
            "more numbers to anonymize than fit in the range {}..={}",
            self.lower,
            self.upper
        );
        let mut draws = BTreeSet::new();
        while draws.len() < marked.len() {
            draws.insert(self.rng.gen_range(self.lower..=self.upper));
        }
        let table = marked.into_iter().zip(draws).collect();
        self.phase = NumPhase::Lex { table };
    }
}

const SIGN_BIAS: u64 = 1 << 63;

/// Pseudonymizer for signed 64-bit numbers.
///
/// Shares the unsigned implementation through the order-preserving bias
/// `n XOR 2^63`, so range containment and order preservation hold under
/// numeric (signed) comparison.
pub struct AnonI64 {
    inner: AnonU64,
}

fn biased(num: i64) -> u64 {
    (num as u64) ^ SIGN_BIAS
}

fn unbiased(num: u64) -> i64 {
    (num ^ SIGN_BIAS) as i64
}

impl AnonI64 {
    /// Creates an engine for pseudonyms in `[lower, upper]`.
    ///
    /// # Panics
    ///
    /// Panics if `lower > upper`.
    pub fn new(lower: i64, upper: i64) -> Self {
        assert!(lower <= upper, "lower bound {lower} exceeds upper bound {upper}");
        AnonI64 {
            inner: AnonU64::with_rng(biased(lower), biased(upper), ChaCha20Rng::from_entropy()),
        }
    }

    pub fn with_rng<R: RngCore + 'static>(lower: i64, upper: i64, rng: R) -> Self {
        assert!(lower <= upper, "lower bound {lower} exceeds upper bound {upper}");
        AnonI64 {
            inner: AnonU64::with_rng(biased(lower), biased(upper), rng),
        }
    }

    pub fn set_key(&mut self, key: &AnonKey) {
        self.inner.set_key(key);
    }

    pub fn set_used(&mut self, num: i64) {
        self.inner.set_used(biased(num));
    }

    pub fn map(&mut self, num: i64) -> i64 {
        unbiased(self.inner.map(biased(num)))
    }

    pub fn map_lex(&mut self, num: i64) -> i64 {
        unbiased(self.inner.map_lex(biased(num)))
    }
}
