//! Deterministic, key-derived pseudonymization of identifiers found in
//! network traces.
//!
//! This crate maps IPv4 and IPv6 addresses, IEEE 802 MAC addresses, signed
//! and unsigned 64-bit integers, and arbitrary octet strings onto
//! pseudonyms. The mapping is one-way for everyone but the key holder, who
//! can reproduce it by re-running the library with the same key.
//!
//! Two families of mapping are available per data type:
//!
//! - *structure-preserving*: address pseudonyms keep the original's prefix
//!   relationships (two inputs sharing an n-bit prefix share an n-bit output
//!   prefix), following the cryptographic prefix-preserving construction of
//!   Xu, Fan, Ammar and Moon over a keyed AES pseudorandom function.
//! - *pure pseudonymization*: integer and string pseudonyms are drawn
//!   uniformly without replacement, with no structural relationship to the
//!   input.
//!
//! Each family has an order-preserving variant that additionally keeps the
//! lexicographic order of the inputs actually observed. Order preservation
//! needs two passes: mark every input with `set_used` first, then map with
//! the `*_lex` operation.
//!
//! # Examples
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use traceanon::{AnonIpv4, AnonKey};
//!
//! let key = AnonKey::from_passphrase("test");
//! let mut engine = AnonIpv4::new(&key);
//!
//! let a = engine.map_pref(Ipv4Addr::new(10, 0, 0, 1));
//! let b = engine.map_pref(Ipv4Addr::new(10, 0, 0, 2));
//!
//! // the inputs share a 30-bit prefix, so the pseudonyms do too
//! assert_eq!(u32::from(a) >> 2, u32::from(b) >> 2);
//! ```
//!
//! Order-preserving mapping over an observed set:
//!
//! ```rust
//! use traceanon::AnonU64;
//!
//! let mut engine = AnonU64::new(100, 199);
//! engine.set_used(5);
//! engine.set_used(42);
//!
//! let a = engine.map_lex(5);
//! let b = engine.map_lex(42);
//! assert!(a < b);
//! assert!((100..=199).contains(&a));
//! ```
//!
//! # Security considerations
//!
//! - Pseudonyms reveal that *some* value was anonymized; presence is not
//!   hidden.
//! - The construction is not designed to resist known-plaintext attacks
//!   where the adversary controls which addresses are inserted.
//! - Order-preserving modes leak the relative order of the observed inputs
//!   by design.

pub(crate) mod ipv4;
pub(crate) mod ipv6;
pub(crate) mod key;
pub(crate) mod mac;
pub(crate) mod num;
pub(crate) mod octs;
pub(crate) mod pfx;
pub(crate) mod prf;

pub use ipv4::AnonIpv4;
pub use ipv6::AnonIpv6;
pub use key::AnonKey;
pub use mac::{AnonMac, MacAddr, ParseMacError};
pub use num::{AnonI64, AnonU64};
pub use octs::AnonOcts;

pub mod reexports {
    pub use rand;
    pub use rand_chacha;
}
