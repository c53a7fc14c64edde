//! Content-addressed storage for trie nodes and code.
//!
//! Nodes are addressed by their [Owner], their path within that owner's trie, and their digest.
//! Implementations are free to ignore the owner and path (keying by digest alone) or to use all
//! three. Code is addressed by digest alone. [Memory] supports both keyings.
//!
//! Writes are staged in a [Batch] and only become visible once [Batch::write] succeeds.

use crate::{nibbles::Nibbles, path::Owner};
use bytes::Bytes;
use commonware_cryptography::Digest;

mod memory;
pub use memory::{Error as MemoryError, Memory, MemoryBatch};

/// Read access to persisted nodes and code.
pub trait Store<D: Digest> {
    /// Returns true if the node is persisted.
    fn has_node(&self, owner: Owner<D>, path: &Nibbles, digest: &D) -> bool;

    /// Get a persisted node.
    fn get_node(&self, owner: Owner<D>, path: &Nibbles, digest: &D) -> Option<Bytes>;

    /// Returns true if the code is persisted.
    fn has_code(&self, digest: &D) -> bool;

    /// Get persisted code.
    fn get_code(&self, digest: &D) -> Option<Bytes>;
}

/// A set of writes applied atomically by [Batch::write].
pub trait Batch<D: Digest> {
    /// Error returned when a write fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stage a node.
    fn put_node(&mut self, owner: Owner<D>, path: &Nibbles, digest: D, node: Bytes);

    /// Stage code.
    fn put_code(&mut self, digest: D, code: Bytes);

    /// Number of staged writes.
    fn len(&self) -> usize;

    /// Returns true if nothing is staged.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply all staged writes.
    ///
    /// If this returns an error, none of the staged writes were applied.
    fn write(&mut self) -> Result<(), Self::Error>;
}
