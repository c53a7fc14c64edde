//! Addressing of trie nodes across the root trie and the sub-tries owned by its leaves.
//!
//! A node in the root trie is addressed by the nibbles leading to it from the root
//! ([Path::Root]). A node in a sub-trie (for example, the storage trie of an account) is
//! addressed by the key of the root-trie leaf that owns the sub-trie plus the nibbles leading to
//! it from the sub-trie's root ([Path::Owned]). Root-trie keys are digests, so a full key is
//! `2 * D::SIZE` nibbles long.
//!
//! Paths are ordered by their outer component first and then by their inner component, where a
//! shorter prefix always sorts before its extensions. [crate::sync::Scheduler] emits requests of
//! equal depth in this order.

use crate::nibbles::Nibbles;
use commonware_cryptography::Digest;
use std::{cmp::Ordering, fmt};

/// The trie a node belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Owner<D: Digest> {
    /// The root trie.
    Root,
    /// The sub-trie owned by the root-trie leaf with this key.
    Account(D),
}

/// Position of a node.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Path<D: Digest> {
    /// A node of the root trie.
    Root(Nibbles),
    /// A node of the sub-trie owned by the root-trie leaf at `owner`.
    Owned { owner: D, inner: Nibbles },
}

/// Number of nibbles in a root-trie key.
pub const fn key_nibbles<D: Digest>() -> usize {
    D::SIZE * 2
}

impl<D: Digest> Path<D> {
    /// The path of the root node of the root trie.
    pub const fn root() -> Self {
        Self::Root(Nibbles::new())
    }

    /// The path of the root node of the sub-trie owned by the root-trie leaf at `owner`.
    pub const fn sub_trie(owner: D) -> Self {
        Self::Owned {
            owner,
            inner: Nibbles::new(),
        }
    }

    /// The path `inner` within the trie of `owner`.
    pub fn new(owner: Owner<D>, inner: Nibbles) -> Self {
        match owner {
            Owner::Root => Self::Root(inner),
            Owner::Account(owner) => Self::Owned { owner, inner },
        }
    }

    /// Return the owner of this path and the path relative to that owner's trie.
    pub fn resolve(&self) -> (Owner<D>, &Nibbles) {
        match self {
            Self::Root(nibbles) => (Owner::Root, nibbles),
            Self::Owned { owner, inner } => (Owner::Account(*owner), inner),
        }
    }

    /// Return the path reached by descending `suffix` nibbles from `self` within the same trie.
    ///
    /// Crossing into a sub-trie is never implicit: a leaf's sub-trie is addressed with
    /// [Path::sub_trie].
    pub fn join(&self, suffix: &Nibbles) -> Self {
        match self {
            Self::Root(nibbles) => Self::Root(nibbles.join(suffix)),
            Self::Owned { owner, inner } => Self::Owned {
                owner: *owner,
                inner: inner.join(suffix),
            },
        }
    }

    /// The combined number of nibbles from the root of the root trie.
    pub fn depth(&self) -> usize {
        match self {
            Self::Root(nibbles) => nibbles.len(),
            Self::Owned { inner, .. } => key_nibbles::<D>() + inner.len(),
        }
    }

    /// The outer component as nibbles.
    pub fn outer(&self) -> Nibbles {
        match self {
            Self::Root(nibbles) => nibbles.clone(),
            Self::Owned { owner, .. } => Nibbles::unpack(owner),
        }
    }

    /// The inner component, which is empty for root-trie paths.
    pub fn inner(&self) -> &[u8] {
        match self {
            Self::Root(_) => &[],
            Self::Owned { inner, .. } => &inner[..],
        }
    }

    /// Returns true if this path addresses a node of the root trie.
    pub const fn is_root_trie(&self) -> bool {
        matches!(self, Self::Root(_))
    }
}

/// Compare the nibbles of `outer` against the nibbles of an `owner` key.
fn cmp_outer<D: Digest>(outer: &[u8], owner: &D) -> Ordering {
    let owner = owner.iter().flat_map(|byte| [byte >> 4, byte & 0x0f]);
    outer.iter().copied().cmp(owner)
}

impl<D: Digest> Ord for Path<D> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Root(a), Self::Root(b)) => a.cmp(b),
            (
                Self::Owned {
                    owner: a,
                    inner: a_inner,
                },
                Self::Owned {
                    owner: b,
                    inner: b_inner,
                },
            ) => a.cmp(b).then_with(|| a_inner.cmp(b_inner)),
            // A root-trie path equal to an owner key addresses the leaf that owns the sub-trie, so
            // it sorts before every node of that sub-trie.
            (Self::Root(a), Self::Owned { owner, .. }) => {
                cmp_outer(a, owner).then(Ordering::Less)
            }
            (Self::Owned { owner, .. }, Self::Root(b)) => {
                cmp_outer(b, owner).reverse().then(Ordering::Greater)
            }
        }
    }
}

impl<D: Digest> PartialOrd for Path<D> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<D: Digest> fmt::Debug for Path<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root(nibbles) => write!(f, "[{nibbles:?}]"),
            Self::Owned { owner, inner } => write!(f, "[{owner}, {inner:?}]"),
        }
    }
}

impl<D: Digest> fmt::Display for Path<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
