//! An in-memory [Store], keyed by digest or by owner, path, and digest.

use super::{Batch, Store};
use crate::{
    nibbles::Nibbles,
    path::{Owner, Path},
};
use bytes::Bytes;
use commonware_cryptography::Digest;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
};
use thiserror::Error;

/// Errors that can occur when writing to [Memory].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("write rejected")]
    WriteRejected,
}

type Key<D> = (Owner<D>, Nibbles, D);

struct Inner<D: Digest> {
    nodes: HashMap<Key<D>, Bytes>,
    codes: HashMap<D, Bytes>,
}

/// An in-memory store.
///
/// A store created with [Memory::new] ignores the owner and path of a node. A store created with
/// [Memory::by_path] holds a node only at the owner and path it was written at.
///
/// Cloning returns a handle to the same underlying store.
#[derive(Clone)]
pub struct Memory<D: Digest> {
    inner: Arc<RwLock<Inner<D>>>,
    reject_writes: Arc<AtomicBool>,
    by_path: bool,
}

impl<D: Digest> Default for Memory<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Digest> Memory<D> {
    /// Create an empty store keyed by digest.
    pub fn new() -> Self {
        Self::with_keying(false)
    }

    /// Create an empty store keyed by owner, path, and digest.
    pub fn by_path() -> Self {
        Self::with_keying(true)
    }

    fn with_keying(by_path: bool) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                nodes: HashMap::new(),
                codes: HashMap::new(),
            })),
            reject_writes: Arc::new(AtomicBool::new(false)),
            by_path,
        }
    }

    fn key(&self, owner: Owner<D>, path: &Nibbles, digest: D) -> Key<D> {
        if self.by_path {
            (owner, path.clone(), digest)
        } else {
            (Owner::Root, Nibbles::new(), digest)
        }
    }

    /// Create a batch that writes to this store.
    pub fn batch(&self) -> MemoryBatch<D> {
        MemoryBatch {
            store: self.clone(),
            nodes: Vec::new(),
            codes: Vec::new(),
        }
    }

    /// Cause every subsequent [Batch::write] to fail (or succeed again).
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::Relaxed);
    }

    /// Remove every copy of a node, returning it if it was present.
    pub fn remove_node(&self, digest: &D) -> Option<Bytes> {
        let mut inner = self.inner.write().unwrap();
        let mut removed = None;
        inner.nodes.retain(|(_, _, stored), node| {
            if stored != digest {
                return true;
            }
            removed = Some(node.clone());
            false
        });
        removed
    }

    /// Insert a node directly (bypassing any batch).
    pub fn insert_node(&self, path: &Path<D>, digest: D, node: Bytes) {
        let (owner, inner) = path.resolve();
        let key = self.key(owner, inner, digest);
        self.inner.write().unwrap().nodes.insert(key, node);
    }

    /// Every persisted node, with the path it is held at.
    ///
    /// A store keyed by digest reports every node at [Path::root].
    pub fn node_keys(&self) -> Vec<(Path<D>, D)> {
        self.inner
            .read()
            .unwrap()
            .nodes
            .keys()
            .map(|(owner, path, digest)| (Path::new(*owner, path.clone()), *digest))
            .collect()
    }

    /// Digests of all persisted nodes.
    pub fn node_digests(&self) -> Vec<D> {
        self.node_keys()
            .into_iter()
            .map(|(_, digest)| digest)
            .collect()
    }

    /// Number of persisted nodes.
    pub fn nodes(&self) -> usize {
        self.inner.read().unwrap().nodes.len()
    }

    /// Number of persisted code blobs.
    pub fn codes(&self) -> usize {
        self.inner.read().unwrap().codes.len()
    }
}

impl<D: Digest> Store<D> for Memory<D> {
    fn has_node(&self, owner: Owner<D>, path: &Nibbles, digest: &D) -> bool {
        let key = self.key(owner, path, *digest);
        self.inner.read().unwrap().nodes.contains_key(&key)
    }

    fn get_node(&self, owner: Owner<D>, path: &Nibbles, digest: &D) -> Option<Bytes> {
        let key = self.key(owner, path, *digest);
        self.inner.read().unwrap().nodes.get(&key).cloned()
    }

    fn has_code(&self, digest: &D) -> bool {
        self.inner.read().unwrap().codes.contains_key(digest)
    }

    fn get_code(&self, digest: &D) -> Option<Bytes> {
        self.inner.read().unwrap().codes.get(digest).cloned()
    }
}

/// Writes staged for a [Memory] store.
pub struct MemoryBatch<D: Digest> {
    store: Memory<D>,
    nodes: Vec<(Key<D>, Bytes)>,
    codes: Vec<(D, Bytes)>,
}

impl<D: Digest> Batch<D> for MemoryBatch<D> {
    type Error = Error;

    fn put_node(&mut self, owner: Owner<D>, path: &Nibbles, digest: D, node: Bytes) {
        let key = self.store.key(owner, path, digest);
        self.nodes.push((key, node));
    }

    fn put_code(&mut self, digest: D, code: Bytes) {
        self.codes.push((digest, code));
    }

    fn len(&self) -> usize {
        self.nodes.len() + self.codes.len()
    }

    fn write(&mut self) -> Result<(), Error> {
        if self.store.reject_writes.load(Ordering::Relaxed) {
            return Err(Error::WriteRejected);
        }
        let mut inner = self.store.inner.write().unwrap();
        inner.nodes.extend(self.nodes.drain(..));
        inner.codes.extend(self.codes.drain(..));
        Ok(())
    }
}
