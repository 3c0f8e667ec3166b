use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Block};

use crate::key::AnonKey;

/// Keyed pseudorandom function over 16-byte blocks.
///
/// The 32-byte key secret is split into two AES-128 keys; the PRF output is
/// the XOR of the block encrypted under both. The prefix-preserving engines
/// only consume the high bit of the output.
pub(crate) struct Prf {
    cipher1: Aes128,
    cipher2: Aes128,
}

impl Prf {
    /// Creates a PRF instance from a key.
    ///
    /// # Panics
    ///
    /// Panics if the two halves of the key secret are identical, as the two
    /// encryptions would then cancel out.
    pub fn new(key: &AnonKey) -> Self {
        let (k1, k2) = key.key().split_at(16);
        assert_ne!(k1, k2, "the two halves of the key must be different");
        let cipher1 = Aes128::new_from_slice(k1).expect("key length is guaranteed to be correct");
        let cipher2 = Aes128::new_from_slice(k2).expect("key length is guaranteed to be correct");
        Prf { cipher1, cipher2 }
    }

    pub fn block(&self, input: &[u8; 16]) -> [u8; 16] {
        let mut block1 = Block::from(*input);
        let mut block2 = Block::from(*input);
        self.cipher1.encrypt_block(&mut block1);
        self.cipher2.encrypt_block(&mut block2);
        let e1: [u8; 16] = block1.into();
        let e2: [u8; 16] = block2.into();
        std::array::from_fn(|i| e1[i] ^ e2[i])
    }

    /// The single anonymization bit derived from a padded prefix block.
    pub fn high_bit(&self, input: &[u8; 16]) -> u8 {
        self.block(input)[0] >> 7
    }
}
