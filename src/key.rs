use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Key material shared by the anonymization engines.
///
/// A key consists of a 32-byte secret driving the pseudorandom function and a
/// 16-byte padding block that fills the unused tail of each PRF input. Keys
/// are immutable once constructed and may be shared by any number of engines;
/// the backing buffers are wiped when the key is dropped.
pub struct AnonKey {
    key: [u8; 32],
    pad: [u8; 16],
}

impl AnonKey {
    /// The number of bytes in the secret part of the key.
    pub const KEY_BYTES: usize = 32;
    /// The number of bytes in the padding block.
    pub const PAD_BYTES: usize = 16;

    /// Creates a new key from OS entropy.
    pub fn random() -> Self {
        loop {
            let mut key = [0u8; Self::KEY_BYTES];
            let mut pad = [0u8; Self::PAD_BYTES];
            OsRng.fill_bytes(&mut key);
            OsRng.fill_bytes(&mut pad);
            if key[..16] != key[16..] {
                return AnonKey { key, pad };
            }
        }
    }

    /// Derives a key from a passphrase. Deterministic: the same passphrase
    /// always yields the same key material.
    ///
    /// The digest stream is SHA-256 based: block 0 is `SHA256(p)`, block n+1
    /// is `SHA256(SHA256(p) || n)`. The secret is bytes 0..32 of the stream,
    /// the padding block is bytes 32..48.
    pub fn from_passphrase(passphrase: impl AsRef<[u8]>) -> Self {
        let first = Sha256::digest(passphrase.as_ref());
        let mut stream = first.to_vec();
        let mut counter = 0u8;
        while stream.len() < Self::KEY_BYTES + Self::PAD_BYTES {
            let mut hasher = Sha256::new();
            hasher.update(first);
            hasher.update([counter]);
            stream.extend_from_slice(&hasher.finalize());
            counter += 1;
        }
        let mut key = [0u8; Self::KEY_BYTES];
        let mut pad = [0u8; Self::PAD_BYTES];
        key.copy_from_slice(&stream[..Self::KEY_BYTES]);
        pad.copy_from_slice(&stream[Self::KEY_BYTES..Self::KEY_BYTES + Self::PAD_BYTES]);
        stream.zeroize();
        AnonKey { key, pad }
    }

    /// Returns the 32-byte secret.
    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    /// Returns the 16-byte padding block.
    pub fn pad(&self) -> &[u8; 16] {
        &self.pad
    }

    /// Derives a per-engine seed so that engines drawing from a keyed stream
    /// do not share their randomness.
    pub(crate) fn derive_seed(&self, tag: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.key);
        hasher.update(tag);
        hasher.finalize().into()
    }

    #[cfg(test)]
    pub(crate) fn from_parts(key: [u8; 32], pad: [u8; 16]) -> Self {
        AnonKey { key, pad }
    }
}

impl fmt::Debug for AnonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnonKey").finish_non_exhaustive()
    }
}

impl Drop for AnonKey {
    fn drop(&mut self) {
        self.key.zeroize();
        self.pad.zeroize();
    }
}
