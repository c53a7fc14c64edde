//! Construct a trie from a sorted set of entries.
//!
//! The builder hashes every node bottom-up and hands each one (with its position relative to the
//! trie root) to a caller-provided sink, returning the root. A trie without entries has the root
//! [crate::node::empty_root] and produces no nodes.

use crate::{
    nibbles::Nibbles,
    node::{empty_root, Node, BRANCH_WIDTH},
    path::Owner,
    store::Batch,
};
use bytes::Bytes;
use commonware_codec::Encode;
use commonware_cryptography::Hasher;
use std::collections::BTreeMap;

/// Build the trie holding `entries` and return its root.
///
/// `sink` is called once per node with the node's path (relative to the trie root), digest, and
/// encoding. Children are always emitted before their parents.
pub fn build<H: Hasher, F>(entries: &BTreeMap<H::Digest, Bytes>, mut sink: F) -> H::Digest
where
    F: FnMut(Nibbles, H::Digest, Bytes),
{
    if entries.is_empty() {
        return empty_root::<H>();
    }
    let keys: Vec<(Nibbles, &Bytes)> = entries
        .iter()
        .map(|(key, value)| (Nibbles::unpack(key), value))
        .collect();
    let mut hasher = H::new();
    build_node(&mut hasher, &keys, Nibbles::new(), &mut sink)
}

/// Build the trie holding `entries` into `batch`, tagging every node with `owner`.
pub fn build_into<H: Hasher, B: Batch<H::Digest>>(
    owner: Owner<H::Digest>,
    entries: &BTreeMap<H::Digest, Bytes>,
    batch: &mut B,
) -> H::Digest {
    build::<H, _>(entries, |path, digest, encoded| {
        batch.put_node(owner, &path, digest, encoded)
    })
}

fn build_node<H: Hasher, F>(
    hasher: &mut H,
    entries: &[(Nibbles, &Bytes)],
    path: Nibbles,
    sink: &mut F,
) -> H::Digest
where
    F: FnMut(Nibbles, H::Digest, Bytes),
{
    let depth = path.len();
    let node = match entries {
        [(key, value)] => Node::Leaf {
            key: key.slice(depth, key.len()),
            value: (*value).clone(),
        },
        _ => {
            // Entries are sorted, so the first and last key bound the shared prefix.
            let first = &entries[0].0;
            let last = &entries[entries.len() - 1].0;
            let shared = first.slice(depth, first.len()).common_prefix(&last[depth..]);
            if shared > 0 {
                let key = first.slice(depth, depth + shared);
                let child = build_node(hasher, entries, path.join(&key), sink);
                Node::Extension { key, child }
            } else {
                let mut children = [None; BRANCH_WIDTH];
                let mut start = 0;
                while start < entries.len() {
                    let nibble = entries[start].0[depth];
                    let end = start
                        + entries[start..]
                            .iter()
                            .take_while(|(key, _)| key[depth] == nibble)
                            .count();
                    let mut child_path = path.clone();
                    child_path.push(nibble);
                    children[nibble as usize] =
                        Some(build_node(hasher, &entries[start..end], child_path, sink));
                    start = end;
                }
                Node::Branch {
                    children,
                    value: None,
                }
            }
        }
    };
    let encoded = Bytes::from(node.encode());
    hasher.update(&encoded);
    let digest = hasher.finalize();
    sink(path, digest, encoded);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::DecodeExt;
    use commonware_cryptography::{
        sha256::{self, Digest},
        Sha256,
    };

    fn key(prefix: &[u8]) -> Digest {
        let mut key = [0u8; 32];
        key[32 - prefix.len()..].copy_from_slice(prefix);
        Digest::from(key)
    }

    fn collect(
        entries: &BTreeMap<Digest, Bytes>,
    ) -> (Digest, BTreeMap<Nibbles, (Digest, Bytes)>) {
        let mut nodes = BTreeMap::new();
        let root = build::<Sha256, _>(entries, |path, digest, encoded| {
            nodes.insert(path, (digest, encoded));
        });
        (root, nodes)
    }

    #[test]
    fn test_empty() {
        let (root, nodes) = collect(&BTreeMap::new());
        assert_eq!(root, empty_root::<Sha256>());
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_single_leaf() {
        let entries = BTreeMap::from([(key(&[1]), Bytes::from_static(b"one"))]);
        let (root, nodes) = collect(&entries);
        assert_eq!(nodes.len(), 1);
        let (digest, encoded) = &nodes[&Nibbles::new()];
        assert_eq!(*digest, root);
        match Node::<Digest>::decode(encoded.clone()).unwrap() {
            Node::Leaf { key: leaf_key, value } => {
                assert_eq!(leaf_key, Nibbles::unpack(key(&[1])));
                assert_eq!(&value[..], b"one");
            }
            node => panic!("unexpected node: {node:?}"),
        }
    }

    #[test]
    fn test_shared_prefix_uses_extension() {
        let entries = BTreeMap::from([
            (key(&[1, 0x10]), Bytes::from_static(b"a")),
            (key(&[1, 0x20]), Bytes::from_static(b"b")),
        ]);
        let (root, nodes) = collect(&entries);

        // Extension at the root, a branch after the shared 62 nibbles, and two leaves
        assert_eq!(nodes.len(), 4);
        let root_node = Node::<Digest>::decode(nodes[&Nibbles::new()].1.clone()).unwrap();
        assert_eq!(nodes[&Nibbles::new()].0, root);
        let Node::Extension { key: shared, child } = root_node else {
            panic!("expected extension");
        };
        assert_eq!(shared.len(), 62);
        assert_eq!(nodes[&shared].0, child);
        let branch = Node::<Digest>::decode(nodes[&shared].1.clone()).unwrap();
        assert_eq!(branch.children().len(), 2);
    }

    #[test]
    fn test_identical_subtries_share_digests() {
        let mut entries = BTreeMap::new();
        for i in 0..16u8 {
            entries.insert(key(&[1, i]), Bytes::from(vec![i]));
            entries.insert(key(&[2, i]), Bytes::from(vec![i]));
        }
        let (_, nodes) = collect(&entries);
        let digests: Vec<_> = nodes.values().map(|(digest, _)| *digest).collect();
        let unique: std::collections::BTreeSet<_> = digests.iter().collect();
        assert!(unique.len() < digests.len());
    }

    #[test]
    fn test_root_is_deterministic() {
        let entries: BTreeMap<_, _> = (0..50u8)
            .map(|i| (sha256::hash(&[i]), Bytes::from(vec![i; 3])))
            .collect();
        let (a, _) = collect(&entries);
        let (b, _) = collect(&entries);
        assert_eq!(a, b);

        let mut changed = entries.clone();
        changed.insert(sha256::hash(&[0]), Bytes::from_static(b"changed"));
        assert_ne!(collect(&changed).0, a);
    }
}
