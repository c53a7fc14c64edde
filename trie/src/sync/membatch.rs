//! Completed nodes and verified code awaiting [super::Scheduler::commit].

use crate::{path::Path, store::Batch};
use bytes::Bytes;
use commonware_cryptography::Digest;
use std::collections::{BTreeMap, HashMap};

/// Nodes whose subtrees are fully available, and verified code, not yet persisted.
pub(super) struct Membatch<D: Digest> {
    nodes: BTreeMap<Path<D>, (D, Bytes)>,
    /// Staged encoding of every digest in `nodes`.
    by_digest: HashMap<D, Bytes>,
    codes: BTreeMap<D, Bytes>,
}

impl<D: Digest> Default for Membatch<D> {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            by_digest: HashMap::new(),
            codes: BTreeMap::new(),
        }
    }
}

impl<D: Digest> Membatch<D> {
    /// Stage a completed node at `path`.
    pub fn put_node(&mut self, path: Path<D>, digest: D, data: Bytes) {
        self.by_digest.insert(digest, data.clone());
        self.nodes.insert(path, (digest, data));
    }

    /// The staged encoding of `digest`, if any path holds it.
    pub fn get_node(&self, digest: &D) -> Option<&Bytes> {
        self.by_digest.get(digest)
    }

    /// The digest staged at `path`, if any.
    pub fn get_at(&self, path: &Path<D>) -> Option<D> {
        self.nodes.get(path).map(|(digest, _)| *digest)
    }

    /// Stage verified code.
    pub fn put_code(&mut self, digest: D, code: Bytes) {
        self.codes.insert(digest, code);
    }

    pub fn has_code(&self, digest: &D) -> bool {
        self.codes.contains_key(digest)
    }

    /// Copy every staged entry into `batch`.
    pub fn flush<B: Batch<D>>(&self, batch: &mut B) {
        for (path, (digest, data)) in &self.nodes {
            let (owner, inner) = path.resolve();
            batch.put_node(owner, inner, *digest, data.clone());
        }
        for (digest, code) in &self.codes {
            batch.put_code(*digest, code.clone());
        }
    }

    /// Drop every staged entry, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.len();
        self.nodes.clear();
        self.by_digest.clear();
        self.codes.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
