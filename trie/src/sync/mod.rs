//! Synchronize a trie from an untrusted source, one node at a time.
//!
//! # Overview
//!
//! A [Scheduler] is created for a target root and a destination [crate::store::Store]. It tracks
//! which nodes (and which code blobs referenced by those nodes) are still missing from the
//! store. The caller drives the sync:
//!
//! 1. [Scheduler::missing] returns the nodes (by [Path] and digest) and code (by digest) to fetch
//!    next. Returned requests are in flight and are not returned again.
//! 2. Results are handed back with [Scheduler::process_node] and [Scheduler::process_code], in any
//!    order. Each result is checked against the digest it was requested with and rejected (leaving
//!    the scheduler unchanged) if it does not match.
//! 3. [Scheduler::commit] writes every node whose subtree is now fully available.
//!
//! The sync is complete once [Scheduler::missing] returns nothing and everything has been
//! committed ([Scheduler::is_done]).
//!
//! # Consistency
//!
//! A node is only committed once all of its descendants (and all code they reference) are
//! committed or already stored, so the store never holds a node with a missing descendant. A
//! process that stops at any point can restart with a new [Scheduler] against the same store:
//! anything already stored is never requested again. The same mechanism handles a moving target,
//! where only nodes not reachable from the previous root are fetched.
//!
//! # Deduplication
//!
//! A digest referenced from several paths is requested once. Every other path it is referenced
//! from gets its own copy of the node once the data arrives, and that copy's references are
//! scheduled (and staged) beneath its own path. A store keyed by digest therefore sees each digest
//! requested at most once per sync. A store keyed by path sees a digest requested again if it is
//! referenced at a new path after every earlier copy has been committed.
//!
//! # Ordering
//!
//! Deeper requests are returned before shallower ones, and requests of equal depth are returned
//! in ascending [Path] order. When each batch is processed before the next is requested, the
//! sequence of returned paths is non-decreasing.

use crate::{decoder, path::Path};
use commonware_cryptography::Digest;
use thiserror::Error;

mod codes;
mod membatch;
mod requests;
mod scheduler;
pub use scheduler::Scheduler;

/// Errors that can occur when processing a result.
#[derive(Debug, Error)]
pub enum Error<D: Digest> {
    #[error("no request in flight for node at {0}")]
    NotRequested(Path<D>),
    #[error("no request in flight for code {0}")]
    CodeNotRequested(D),
    #[error("node at {path} hashes to {actual}, expected {expected}")]
    NodeMismatch {
        path: Path<D>,
        expected: D,
        actual: D,
    },
    #[error("code hashes to {actual}, expected {expected}")]
    CodeMismatch { expected: D, actual: D },
    #[error("undecodable node at {path}: {source}")]
    Decode {
        path: Path<D>,
        source: decoder::Error<D>,
    },
    #[error("a different node is already scheduled at {0}")]
    PathConflict(Path<D>),
}

/// Configuration for a [Scheduler].
#[derive(Clone, Debug)]
pub struct Config<D: Digest, C> {
    /// Root of the trie to synchronize.
    pub root: D,

    /// Extracts the references held by each fetched node.
    pub decoder: C,
}

/// Work returned by [Scheduler::missing].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Missing<D: Digest> {
    /// Nodes to fetch.
    pub nodes: Vec<(Path<D>, D)>,
    /// Code to fetch.
    pub codes: Vec<D>,
}

impl<D: Digest> Missing<D> {
    pub fn len(&self) -> usize {
        self.nodes.len() + self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
