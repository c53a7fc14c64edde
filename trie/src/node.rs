//! Encoding of trie nodes.
//!
//! # Format
//!
//! Every node starts with a one-byte tag:
//!
//! ```text
//! Empty:     0x00
//! Leaf:      0x01 | key | value
//! Extension: 0x02 | key | child digest
//! Branch:    0x03 | child bitmap (u16, big-endian) | present child digests | optional value
//! ```
//!
//! Keys are encoded as [Nibbles] and values as varint-prefixed bytes. Children are always
//! referenced by digest, never embedded, so every node of a trie is individually addressable.

use crate::nibbles::Nibbles;
use bytes::{Buf, BufMut, Bytes};
use commonware_codec::{Encode, EncodeSize, Error as CodecError, Read, ReadExt as _, Write};
use commonware_cryptography::{Digest, Hasher};
use commonware_utils::hex;
use std::fmt;

const EMPTY: u8 = 0;
const LEAF: u8 = 1;
const EXTENSION: u8 = 2;
const BRANCH: u8 = 3;

/// Number of children of a branch.
pub const BRANCH_WIDTH: usize = 16;

/// A decoded trie node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node<D: Digest> {
    /// The node of a trie without any entries.
    Empty,
    /// A terminal node holding the remainder of a key and its value.
    Leaf { key: Nibbles, value: Bytes },
    /// A node compressing a run of nibbles shared by every key below it.
    Extension { key: Nibbles, child: D },
    /// A node with up to [BRANCH_WIDTH] children and an optional value.
    Branch {
        children: [Option<D>; BRANCH_WIDTH],
        value: Option<Bytes>,
    },
}

impl<D: Digest> Node<D> {
    /// Digest of the node's encoding.
    pub fn digest<H: Hasher<Digest = D>>(&self) -> D {
        crate::hash::<H>(&self.encode())
    }

    /// The digests referenced by this node, paired with the nibbles leading to each of them.
    pub fn children(&self) -> Vec<(Nibbles, D)> {
        match self {
            Self::Empty | Self::Leaf { .. } => Vec::new(),
            Self::Extension { key, child } => vec![(key.clone(), *child)],
            Self::Branch { children, .. } => children
                .iter()
                .enumerate()
                .filter_map(|(i, child)| {
                    let child = (*child)?;
                    let mut suffix = Nibbles::new();
                    suffix.push(i as u8);
                    Some((suffix, child))
                })
                .collect(),
        }
    }

    /// The values stored directly in this node, paired with the nibbles leading to each of them.
    pub fn values(&self) -> Vec<(Nibbles, &Bytes)> {
        match self {
            Self::Empty | Self::Extension { .. } => Vec::new(),
            Self::Leaf { key, value } => vec![(key.clone(), value)],
            Self::Branch { value, .. } => value
                .as_ref()
                .map(|value| vec![(Nibbles::new(), value)])
                .unwrap_or_default(),
        }
    }

    fn bitmap(children: &[Option<D>; BRANCH_WIDTH]) -> u16 {
        children
            .iter()
            .enumerate()
            .filter(|(_, child)| child.is_some())
            .fold(0u16, |bitmap, (i, _)| bitmap | (1 << i))
    }
}

/// Digest of a trie without any entries.
pub fn empty_root<H: Hasher>() -> H::Digest {
    Node::<H::Digest>::Empty.digest::<H>()
}

impl<D: Digest> Write for Node<D> {
    fn write(&self, buf: &mut impl BufMut) {
        match self {
            Self::Empty => EMPTY.write(buf),
            Self::Leaf { key, value } => {
                LEAF.write(buf);
                key.write(buf);
                value.write(buf);
            }
            Self::Extension { key, child } => {
                EXTENSION.write(buf);
                key.write(buf);
                child.write(buf);
            }
            Self::Branch { children, value } => {
                BRANCH.write(buf);
                Self::bitmap(children).write(buf);
                for child in children.iter().flatten() {
                    child.write(buf);
                }
                value.write(buf);
            }
        }
    }
}

impl<D: Digest> EncodeSize for Node<D> {
    fn encode_size(&self) -> usize {
        1 + match self {
            Self::Empty => 0,
            Self::Leaf { key, value } => key.encode_size() + value.encode_size(),
            Self::Extension { key, .. } => key.encode_size() + D::SIZE,
            Self::Branch { children, value } => {
                2 + children.iter().flatten().count() * D::SIZE + value.encode_size()
            }
        }
    }
}

impl<D: Digest> Read for Node<D> {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        match u8::read(buf)? {
            EMPTY => Ok(Self::Empty),
            LEAF => {
                let key = Nibbles::read(buf)?;
                let value = Bytes::read_cfg(buf, &(..).into())?;
                Ok(Self::Leaf { key, value })
            }
            EXTENSION => {
                let key = Nibbles::read(buf)?;
                if key.is_empty() {
                    return Err(CodecError::Invalid("trie::Node", "empty extension key"));
                }
                let child = D::read(buf)?;
                Ok(Self::Extension { key, child })
            }
            BRANCH => {
                let bitmap = u16::read(buf)?;
                let mut children = [None; BRANCH_WIDTH];
                for (i, child) in children.iter_mut().enumerate() {
                    if bitmap & (1 << i) != 0 {
                        *child = Some(D::read(buf)?);
                    }
                }
                let value = Option::<Bytes>::read_cfg(buf, &(..).into())?;
                Ok(Self::Branch { children, value })
            }
            tag => Err(CodecError::InvalidEnum(tag)),
        }
    }
}

impl<D: Digest> fmt::Display for Node<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "[empty]"),
            Self::Leaf { key, value } => write!(f, "[leaf key:{key} value:{}]", hex(value)),
            Self::Extension { key, child } => write!(f, "[extension key:{key} child:{child}]"),
            Self::Branch { children, value } => {
                write!(f, "[branch children:{:016b}", Self::bitmap(children))?;
                if let Some(value) = value {
                    write!(f, " value:{}", hex(value))?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::DecodeExt;
    use commonware_cryptography::{
        sha256::{self, Digest as Sha256Digest},
        Blake3, Sha256,
    };

    fn key(values: &[u8]) -> Nibbles {
        Nibbles::from_nibbles(values.to_vec()).unwrap()
    }

    #[test]
    fn test_branch_references() {
        let a = sha256::hash(b"a");
        let b = sha256::hash(b"b");
        let mut children = [None; BRANCH_WIDTH];
        children[3] = Some(a);
        children[15] = Some(b);
        let node = Node::Branch {
            children,
            value: Some(Bytes::from_static(b"value")),
        };

        let encoded = node.encode();
        assert_eq!(encoded.len(), node.encode_size());
        let decoded = Node::<Sha256Digest>::decode(encoded).unwrap();
        assert_eq!(decoded, node);
        assert_eq!(decoded.children(), vec![(key(&[3]), a), (key(&[15]), b)]);
        assert_eq!(decoded.values().len(), 1);
        assert!(decoded.values()[0].0.is_empty());
        assert!(decoded.to_string().starts_with("[branch children:1000000000001000"));
    }

    #[test]
    fn test_odd_keys() {
        let leaf = Node::<Sha256Digest>::Leaf {
            key: key(&[1, 2, 3]),
            value: Bytes::from_static(&[9]),
        };
        let encoded = leaf.encode();
        assert_eq!(Node::decode(encoded.clone()).unwrap(), leaf);
        assert_eq!(leaf.to_string(), "[leaf key:0x123 value:09]");

        // Non-zero padding nibble is not canonical
        let mut corrupt = encoded.to_vec();
        corrupt[3] |= 0x01;
        assert!(matches!(
            Node::<Sha256Digest>::decode(corrupt.as_slice()),
            Err(CodecError::Invalid(_, _))
        ));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        type N = Node<Sha256Digest>;
        assert!(matches!(N::decode(&[][..]), Err(CodecError::EndOfBuffer)));
        assert!(matches!(
            N::decode(&[9][..]),
            Err(CodecError::InvalidEnum(9))
        ));
        assert!(matches!(
            N::decode(&[EMPTY, 0][..]),
            Err(CodecError::ExtraData(1))
        ));

        let extension = N::Extension {
            key: key(&[1]),
            child: sha256::hash(b"child"),
        };
        let encoded = extension.encode();
        assert!(matches!(
            N::decode(&encoded[..encoded.len() - 1]),
            Err(CodecError::EndOfBuffer)
        ));
        assert!(matches!(
            N::decode(&[EXTENSION, 0][..]),
            Err(CodecError::Invalid(_, _))
        ));

        let mut branch = vec![BRANCH, 0, 0, 2];
        assert!(matches!(
            N::decode(branch.as_slice()),
            Err(CodecError::InvalidBool)
        ));
        branch[3] = 0;
        assert_eq!(
            N::decode(branch.as_slice()).unwrap().to_string(),
            "[branch children:0000000000000000]"
        );
    }

    #[test]
    fn test_empty_root_depends_on_hasher() {
        assert_eq!(empty_root::<Sha256>(), sha256::hash(&[EMPTY]));
        assert_ne!(empty_root::<Sha256>().as_ref(), empty_root::<Blake3>().as_ref());
    }
}
