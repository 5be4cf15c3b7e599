//! The [`Serializable`] trait and its implementations for the TL primitives.
//!
//! Encoding follows the [MTProto Binary Serialization] rules: integers and
//! doubles are little-endian, byte strings are length-prefixed and padded to a
//! multiple of four, boxed vectors carry the `0x1cb5c415` header.
//!
//! [MTProto Binary Serialization]: https://core.telegram.org/mtproto/serialize

use crate::{Blob, RawVec, VECTOR_ID};

/// Serialize `self` into TL binary format.
pub trait Serializable {
    /// Appends the serialized form of `self` to `buf`.
    fn serialize(&self, buf: &mut impl Extend<u8>);

    /// Allocate a fresh `Vec<u8>` and serialize into it.
    fn to_bytes(&self) -> Vec<u8> {
        let mut v = Vec::new();
        self.serialize(&mut v);
        v
    }
}

// ─── bool ────────────────────────────────────────────────────────────────────

/// `true`  → `boolTrue#997275b5`
/// `false` → `boolFalse#bc799737`
impl Serializable for bool {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        let id = if *self { crate::BOOL_TRUE_ID } else { crate::BOOL_FALSE_ID };
        id.serialize(buf);
    }
}

// ─── fixed width ─────────────────────────────────────────────────────────────

macro_rules! le_serializable {
    ( $( $t:ty ),+ ) => {
        $(
            impl Serializable for $t {
                fn serialize(&self, buf: &mut impl Extend<u8>) {
                    buf.extend(self.to_le_bytes());
                }
            }
        )+
    };
}

le_serializable!(i32, u32, i64, u64, f64);

/// `int128`
impl Serializable for [u8; 16] {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        buf.extend(self.iter().copied());
    }
}

/// `int256`
impl Serializable for [u8; 32] {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        buf.extend(self.iter().copied());
    }
}

// ─── strings / bytes ─────────────────────────────────────────────────────────

/// Number of bytes `len` payload bytes occupy once encoded as TL `bytes`.
pub fn bytes_len(len: usize) -> usize {
    let header = if len <= 253 { 1 } else { 4 };
    (header + len).div_ceil(4) * 4
}

/// TL string encoding: a length-prefixed, 4-byte aligned byte string.
///
/// * If `len ≤ 253`: `[len as u8][data][0-padding to align to 4 bytes]`
/// * Otherwise:     `[0xfe][len as 3 LE bytes][data][0-padding]`
impl Serializable for &[u8] {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        let len = self.len();
        let header_len = if len <= 253 {
            buf.extend([len as u8]);
            1
        } else {
            buf.extend([
                0xfe,
                (len & 0xff) as u8,
                ((len >> 8) & 0xff) as u8,
                ((len >> 16) & 0xff) as u8,
            ]);
            4
        };

        let padding = (4 - ((header_len + len) % 4)) % 4;
        buf.extend(self.iter().copied());
        buf.extend(std::iter::repeat_n(0u8, padding));
    }
}

impl Serializable for Vec<u8> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.as_slice().serialize(buf);
    }
}

impl Serializable for &str {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.as_bytes().serialize(buf);
    }
}

impl Serializable for String {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.as_bytes().serialize(buf);
    }
}

// ─── vectors ─────────────────────────────────────────────────────────────────

/// Boxed `Vector<T>`, prefixed with constructor ID `0x1cb5c415`.
impl<T: Serializable> Serializable for Vec<T> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        VECTOR_ID.serialize(buf);
        (self.len() as i32).serialize(buf);
        for item in self { item.serialize(buf); }
    }
}

/// Bare `vector<T>`: just a count followed by items.
impl<T: Serializable> Serializable for RawVec<T> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        (self.0.len() as i32).serialize(buf);
        for item in &self.0 { item.serialize(buf); }
    }
}

// ─── pass-through ────────────────────────────────────────────────────────────

/// A blob is already-encoded TL and is written verbatim.
impl Serializable for Blob {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        buf.extend(self.0.iter().copied());
    }
}

// ─── Option ──────────────────────────────────────────────────────────────────

/// Flag-guarded parameters: the flags word already encodes absence, so `None`
/// writes nothing.
impl<T: Serializable> Serializable for Option<T> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        if let Some(v) = self { v.serialize(buf); }
    }
}

impl<T: Serializable> Serializable for Box<T> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        (**self).serialize(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_bytes_are_padded_to_four() {
        assert_eq!(b"abc".as_slice().to_bytes(), vec![3, b'a', b'b', b'c']);
        assert_eq!(b"abcd".as_slice().to_bytes(), vec![4, b'a', b'b', b'c', b'd', 0, 0, 0]);
        assert_eq!(b"".as_slice().to_bytes(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn long_bytes_use_fe_header() {
        let data = vec![7u8; 254];
        let out = data.to_bytes();
        assert_eq!(&out[..4], &[0xfe, 254, 0, 0]);
        assert_eq!(out.len(), 260);
    }

    #[test]
    fn encoded_length_matches_formula() {
        for n in [0usize, 1, 3, 4, 100, 252, 253, 254, 255, 256, 1000, 70_000] {
            let data = vec![1u8; n];
            let expected = if n <= 253 { (1 + n).div_ceil(4) * 4 } else { (4 + n).div_ceil(4) * 4 };
            assert_eq!(data.to_bytes().len(), expected, "len {n}");
            assert_eq!(bytes_len(n), expected);
        }
    }

    #[test]
    fn vector_header_bytes() {
        let out = vec![1i32, 2].to_bytes();
        assert_eq!(&out[..4], &[0x15, 0xc4, 0xb5, 0x1c]);
        assert_eq!(&out[4..8], &2i32.to_le_bytes());
    }
}
