//! Synchronize a Merkle-Patricia trie from an untrusted source into content-addressed storage.
//!
//! The [sync::Scheduler] tracks which nodes of a target trie (and of the sub-tries and code its
//! leaves reference) are missing from a [store::Store], verifies every result against the digest
//! it was requested with, and only writes a node once its entire subtree is available.
//!
//! # Status
//!
//! `commonware-trie` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

pub mod builder;
pub mod decoder;
pub mod nibbles;
pub mod node;
pub mod path;
pub mod recreate;
pub mod state;
pub mod store;
pub mod sync;
pub mod walker;

use commonware_cryptography::Hasher;

/// Hash a single message.
pub fn hash<H: Hasher>(message: &[u8]) -> H::Digest {
    let mut hasher = H::new();
    hasher.update(message);
    hasher.finalize()
}
