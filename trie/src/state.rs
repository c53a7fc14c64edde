//! Accounts stored in the leaves of a root trie.
//!
//! Each account commits to a storage trie (synchronized as a sub-trie owned by the account's key)
//! and to a code blob (synchronized by digest).

use crate::{
    decoder::{self, children, Decoder, References},
    node::{empty_root, Node},
    path::{key_nibbles, Path},
};
use bytes::{Buf, BufMut};
use commonware_codec::{DecodeExt, Error as CodecError, FixedSize, Read, ReadExt as _, Write};
use commonware_cryptography::{Digest, Hasher};

/// An account stored in a root-trie leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Account<D: Digest> {
    pub nonce: u64,
    pub balance: u64,
    /// Root of the account's storage trie.
    pub storage_root: D,
    /// Digest of the account's code.
    pub code_hash: D,
}

impl<D: Digest> Account<D> {
    /// An account with no storage and no code.
    pub fn empty<H: Hasher<Digest = D>>(nonce: u64, balance: u64) -> Self {
        Self {
            nonce,
            balance,
            storage_root: empty_root::<H>(),
            code_hash: H::empty(),
        }
    }
}

impl<D: Digest> Write for Account<D> {
    fn write(&self, buf: &mut impl BufMut) {
        self.nonce.write(buf);
        self.balance.write(buf);
        self.storage_root.write(buf);
        self.code_hash.write(buf);
    }
}

impl<D: Digest> FixedSize for Account<D> {
    const SIZE: usize = u64::SIZE + u64::SIZE + D::SIZE + D::SIZE;
}

impl<D: Digest> Read for Account<D> {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        Ok(Self {
            nonce: u64::read(buf)?,
            balance: u64::read(buf)?,
            storage_root: D::read(buf)?,
            code_hash: D::read(buf)?,
        })
    }
}

/// Decoder for a root trie of [Account]s.
///
/// Nodes of the root trie reference their children as usual and, for every account they hold,
/// the account's storage trie and code (unless empty). Nodes of storage tries only reference
/// their children.
#[derive(Clone, Copy, Debug)]
pub struct Accounts<D: Digest> {
    empty_root: D,
    empty_code: D,
}

impl<D: Digest> Accounts<D> {
    /// Create a decoder for tries hashed with `H`.
    pub fn new<H: Hasher<Digest = D>>() -> Self {
        Self {
            empty_root: empty_root::<H>(),
            empty_code: H::empty(),
        }
    }
}

impl<D: Digest> Decoder<D> for Accounts<D> {
    fn decode(&self, path: &Path<D>, node: &[u8]) -> Result<References<D>, decoder::Error<D>> {
        let node = Node::<D>::decode(node)?;
        let mut refs = References {
            children: children(path, &node),
            codes: Vec::new(),
        };
        let Path::Root(prefix) = path else {
            return Ok(refs);
        };
        for (suffix, value) in node.values() {
            let key = prefix.join(&suffix);
            if key.len() != key_nibbles::<D>() {
                return Err(decoder::Error::PartialKey(Path::Root(key)));
            }
            let account =
                Account::<D>::decode(value.clone()).map_err(|source| decoder::Error::Leaf {
                    path: Path::Root(key.clone()),
                    source,
                })?;
            if account.storage_root != self.empty_root {
                let owner = D::decode(key.pack().as_slice()).map_err(|source| {
                    decoder::Error::Leaf {
                        path: Path::Root(key.clone()),
                        source,
                    }
                })?;
                refs.children
                    .push((Path::sub_trie(owner), account.storage_root));
            }
            if account.code_hash != self.empty_code {
                refs.codes.push(account.code_hash);
            }
        }
        Ok(refs)
    }
}
