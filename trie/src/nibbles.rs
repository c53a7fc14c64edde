//! An owned sequence of 4-bit values used to address positions in a trie.
//!
//! Nibbles are encoded as a one-byte count followed by the packed nibbles, where an odd count is
//! padded with a zero nibble.

use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error as CodecError, Read, ReadExt as _, Write};
use std::{fmt, ops::Deref};

/// A sequence of nibbles (each element is in `0..16`).
///
/// Nibbles are ordered lexicographically, so a prefix always sorts before any of its extensions.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nibbles(Vec<u8>);

impl Nibbles {
    /// Create an empty sequence.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Unpack `bytes` into nibbles, high nibble first.
    pub fn unpack(bytes: impl AsRef<[u8]>) -> Self {
        let bytes = bytes.as_ref();
        let mut nibbles = Vec::with_capacity(bytes.len() * 2);
        for byte in bytes {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0f);
        }
        Self(nibbles)
    }

    /// Create a sequence from raw nibble values, returning `None` if any value exceeds `0x0f`.
    pub fn from_nibbles(nibbles: impl Into<Vec<u8>>) -> Option<Self> {
        let nibbles = nibbles.into();
        if nibbles.iter().any(|n| *n > 0x0f) {
            return None;
        }
        Some(Self(nibbles))
    }

    /// Pack the nibbles back into bytes. An odd trailing nibble is padded with zero.
    pub fn pack(&self) -> Vec<u8> {
        self.0
            .chunks(2)
            .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
            .collect()
    }

    /// Append a single nibble.
    ///
    /// # Panics
    ///
    /// Panics if `nibble` is not in `0..16`.
    pub fn push(&mut self, nibble: u8) {
        assert!(nibble < 16, "invalid nibble: {nibble}");
        self.0.push(nibble);
    }

    /// Append all nibbles of `other`.
    pub fn extend(&mut self, other: &Nibbles) {
        self.0.extend_from_slice(&other.0);
    }

    /// Return a new sequence consisting of `self` followed by `other`.
    pub fn join(&self, other: &Nibbles) -> Self {
        let mut joined = Vec::with_capacity(self.0.len() + other.0.len());
        joined.extend_from_slice(&self.0);
        joined.extend_from_slice(&other.0);
        Self(joined)
    }

    /// Return the nibbles in `[start, end)` as a new sequence.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        Self(self.0[start..end].to_vec())
    }

    /// Length of the longest common prefix of `self` and `other`.
    pub fn common_prefix(&self, other: &[u8]) -> usize {
        self.0
            .iter()
            .zip(other.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Returns true if `self` starts with `prefix`.
    pub fn starts_with(&self, prefix: &Nibbles) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl Write for Nibbles {
    fn write(&self, buf: &mut impl BufMut) {
        let len = u8::try_from(self.0.len()).expect("nibbles length exceeds u8");
        len.write(buf);
        buf.put_slice(&self.pack());
    }
}

impl EncodeSize for Nibbles {
    fn encode_size(&self) -> usize {
        1 + self.0.len().div_ceil(2)
    }
}

impl Read for Nibbles {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let len = u8::read(buf)? as usize;
        let mut nibbles = Vec::with_capacity(len + 1);
        for _ in 0..len.div_ceil(2) {
            let byte = u8::read(buf)?;
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0f);
        }
        if len % 2 == 1 && nibbles.pop() != Some(0) {
            return Err(CodecError::Invalid("trie::Nibbles", "non-zero padding"));
        }
        Ok(Self(nibbles))
    }
}

impl Deref for Nibbles {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for nibble in &self.0 {
            write!(f, "{nibble:x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{DecodeExt, Encode};

    #[test]
    fn test_unpack_pack() {
        let nibbles = Nibbles::unpack([0x12, 0xab]);
        assert_eq!(&nibbles[..], &[1, 2, 0xa, 0xb]);
        assert_eq!(nibbles.pack(), vec![0x12, 0xab]);

        // Odd lengths are zero padded
        let odd = nibbles.slice(0, 3);
        assert_eq!(odd.pack(), vec![0x12, 0xa0]);
    }

    #[test]
    fn test_codec() {
        for len in [0, 1, 2, 5, 64] {
            let values: Vec<u8> = (0..len).map(|i| (i % 16) as u8).collect();
            let nibbles = Nibbles::from_nibbles(values).unwrap();
            let encoded = nibbles.encode();
            assert_eq!(encoded.len(), nibbles.encode_size());
            assert_eq!(Nibbles::decode(encoded).unwrap(), nibbles);
        }

        // Non-zero padding nibble is not canonical
        assert!(matches!(
            Nibbles::decode(&[3, 0x12, 0x31][..]),
            Err(CodecError::Invalid(_, _))
        ));
        assert!(matches!(
            Nibbles::decode(&[4, 0x12][..]),
            Err(CodecError::EndOfBuffer)
        ));
        assert!(matches!(
            Nibbles::decode(&[1, 0x10, 0][..]),
            Err(CodecError::ExtraData(1))
        ));
    }

    #[test]
    fn test_from_nibbles_rejects_bytes() {
        assert!(Nibbles::from_nibbles(vec![0, 15]).is_some());
        assert!(Nibbles::from_nibbles(vec![0, 16]).is_none());
    }

    #[test]
    fn test_ordering() {
        let empty = Nibbles::new();
        let a = Nibbles::from_nibbles(vec![1]).unwrap();
        let ab = Nibbles::from_nibbles(vec![1, 0]).unwrap();
        let b = Nibbles::from_nibbles(vec![2]).unwrap();
        assert!(empty < a);
        assert!(a < ab);
        assert!(ab < b);
    }

    #[test]
    fn test_common_prefix() {
        let a = Nibbles::from_nibbles(vec![1, 2, 3]).unwrap();
        let b = Nibbles::from_nibbles(vec![1, 2, 4, 5]).unwrap();
        assert_eq!(a.common_prefix(&b), 2);
        assert_eq!(a.common_prefix(&a), 3);
        assert!(b.starts_with(&a.slice(0, 2)));
        assert_eq!(format!("{:?}", a.join(&b)), "0x1231245");
    }
}
