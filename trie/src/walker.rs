//! Read a synchronized trie back out of a [Store].
//!
//! [verify] walks every node reachable from a root (following sub-tries and code through a
//! [Decoder]) and checks that each is present and hashes to the digest its parent references.
//! [get] looks up a single key.

use crate::{
    decoder::{self, Decoder},
    nibbles::Nibbles,
    node::{empty_root, Node},
    path::{Owner, Path},
    store::Store,
};
use bytes::Bytes;
use commonware_codec::DecodeExt;
use commonware_cryptography::{Digest, Hasher};
use thiserror::Error;

/// Errors that can occur when reading a trie from a [Store].
#[derive(Debug, Error)]
pub enum Error<D: Digest> {
    #[error("missing node {digest} at {path}")]
    MissingNode { path: Path<D>, digest: D },
    #[error("corrupt node {digest} at {path}")]
    Corrupt { path: Path<D>, digest: D },
    #[error("undecodable node at {path}: {source}")]
    Decode {
        path: Path<D>,
        source: decoder::Error<D>,
    },
    #[error("missing code {0}")]
    MissingCode(D),
    #[error("corrupt code {0}")]
    CorruptCode(D),
}

/// Verify the trie rooted at `root`, returning the number of nodes visited.
pub fn verify<H: Hasher, S: Store<H::Digest>, C: Decoder<H::Digest>>(
    store: &S,
    decoder: &C,
    root: H::Digest,
) -> Result<usize, Error<H::Digest>> {
    verify_at::<H, S, C>(store, decoder, Path::root(), root)
}

/// Verify the subtree rooted at `digest`, found at `path`, returning the number of nodes
/// visited.
pub fn verify_at<H: Hasher, S: Store<H::Digest>, C: Decoder<H::Digest>>(
    store: &S,
    decoder: &C,
    path: Path<H::Digest>,
    digest: H::Digest,
) -> Result<usize, Error<H::Digest>> {
    let empty = empty_root::<H>();
    let mut hasher = H::new();
    let mut visited = 0;
    let mut stack = vec![(path, digest)];
    while let Some((path, digest)) = stack.pop() {
        if digest == empty {
            continue;
        }
        let data = load(store, &mut hasher, &path, &digest)?;
        let refs = decoder
            .decode(&path, &data)
            .map_err(|source| Error::Decode {
                path: path.clone(),
                source,
            })?;
        for code in refs.codes {
            let Some(blob) = store.get_code(&code) else {
                return Err(Error::MissingCode(code));
            };
            hasher.update(&blob);
            if hasher.finalize() != code {
                return Err(Error::CorruptCode(code));
            }
        }
        stack.extend(refs.children);
        visited += 1;
    }
    Ok(visited)
}

/// Get the value stored under `key` in the trie of `owner` rooted at `root`.
pub fn get<H: Hasher, S: Store<H::Digest>>(
    store: &S,
    owner: Owner<H::Digest>,
    root: H::Digest,
    key: &H::Digest,
) -> Result<Option<Bytes>, Error<H::Digest>> {
    let empty = empty_root::<H>();
    let key = Nibbles::unpack(key);
    let mut hasher = H::new();
    let mut prefix = Nibbles::new();
    let mut digest = root;
    loop {
        if digest == empty {
            return Ok(None);
        }
        let path = Path::new(owner, prefix.clone());
        let data = load(store, &mut hasher, &path, &digest)?;
        let node = Node::<H::Digest>::decode(&data[..]).map_err(|err| Error::Decode {
            path,
            source: err.into(),
        })?;
        let rest = &key[prefix.len()..];
        match node {
            Node::Empty => return Ok(None),
            Node::Leaf { key: suffix, value } => {
                return Ok((&suffix[..] == rest).then_some(value));
            }
            Node::Extension { key: suffix, child } => {
                if !rest.starts_with(&suffix[..]) {
                    return Ok(None);
                }
                prefix.extend(&suffix);
                digest = child;
            }
            Node::Branch { children, value } => {
                let Some(&nibble) = rest.first() else {
                    return Ok(value);
                };
                let Some(child) = children[nibble as usize] else {
                    return Ok(None);
                };
                prefix.push(nibble);
                digest = child;
            }
        }
    }
}

/// Load a node and check it hashes to `digest`.
fn load<H: Hasher, S: Store<H::Digest>>(
    store: &S,
    hasher: &mut H,
    path: &Path<H::Digest>,
    digest: &H::Digest,
) -> Result<Bytes, Error<H::Digest>> {
    let (owner, inner) = path.resolve();
    let Some(data) = store.get_node(owner, inner, digest) else {
        return Err(Error::MissingNode {
            path: path.clone(),
            digest: *digest,
        });
    };
    hasher.update(&data);
    if hasher.finalize() != *digest {
        return Err(Error::Corrupt {
            path: path.clone(),
            digest: *digest,
        });
    }
    Ok(data)
}
