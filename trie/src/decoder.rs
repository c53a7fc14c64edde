//! Extract the references held by a fetched node.
//!
//! The scheduler never interprets node bytes itself. Instead, a [Decoder] reports which nodes
//! (by path and digest) and which code blobs (by digest) a node references, and the scheduler
//! fetches whatever is not already stored.

use crate::{node::Node, path::Path};
use commonware_codec::{DecodeExt, Error as CodecError};
use commonware_cryptography::Digest;
use thiserror::Error;

/// Errors that can occur when extracting references from a node.
#[derive(Debug, Error)]
pub enum Error<D: Digest> {
    #[error("invalid node: {0}")]
    Node(#[from] CodecError),
    #[error("invalid leaf at {path}: {source}")]
    Leaf { path: Path<D>, source: CodecError },
    #[error("leaf key at {0} is not a full key")]
    PartialKey(Path<D>),
}

/// The nodes and code referenced by a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct References<D: Digest> {
    /// Referenced nodes and their paths.
    pub children: Vec<(Path<D>, D)>,
    /// Referenced code.
    pub codes: Vec<D>,
}

impl<D: Digest> Default for References<D> {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            codes: Vec::new(),
        }
    }
}

/// Interface for extracting references from a node's encoding.
pub trait Decoder<D: Digest> {
    /// Decode the node found at `path` and return everything it references.
    fn decode(&self, path: &Path<D>, node: &[u8]) -> Result<References<D>, Error<D>>;
}

/// Decoder for a trie whose leaves reference nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct Plain;

impl<D: Digest> Decoder<D> for Plain {
    fn decode(&self, path: &Path<D>, node: &[u8]) -> Result<References<D>, Error<D>> {
        let node = Node::<D>::decode(node)?;
        Ok(References {
            children: children(path, &node),
            codes: Vec::new(),
        })
    }
}

/// The children of `node` (found at `path`) paired with their paths.
pub(crate) fn children<D: Digest>(path: &Path<D>, node: &Node<D>) -> Vec<(Path<D>, D)> {
    node.children()
        .into_iter()
        .map(|(suffix, digest)| (path.join(&suffix), digest))
        .collect()
}
