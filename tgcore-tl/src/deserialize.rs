//! The [`Deserializable`] trait, the [`Cursor`] buffer, and primitive impls.

use std::fmt;

use crate::{Blob, RawVec, VECTOR_ID};

// ─── Error ───────────────────────────────────────────────────────────────────

/// Errors that can occur while decoding TL.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Ran out of bytes before the value was fully read.
    Truncated,
    /// Read a constructor ID that no known variant answers to.
    UnknownConstructor { id: u32 },
    /// A `Bool` slot held something other than `boolTrue` / `boolFalse`.
    InvalidBool { id: u32 },
    /// A TL `string` was not valid UTF-8.
    InvalidUtf8,
    /// A vector count was negative or larger than the remaining input.
    LengthOutOfRange { len: i64 },
    /// A `gzip_packed` payload failed to inflate.
    Decompression(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated input"),
            Self::UnknownConstructor { id } => write!(f, "unknown constructor id: {id:#010x}"),
            Self::InvalidBool { id } => write!(f, "invalid bool constructor: {id:#010x}"),
            Self::InvalidUtf8 => write!(f, "string is not valid utf-8"),
            Self::LengthOutOfRange { len } => write!(f, "length out of range: {len}"),
            Self::Decompression(e) => write!(f, "gzip_packed inflate failed: {e}"),
        }
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for deserialization.
pub type Result<T> = std::result::Result<T, Error>;

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// A zero-copy cursor over an in-memory byte slice.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Create a cursor positioned at the start of `buf`.
    pub fn from_slice(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current byte offset.
    pub fn pos(&self) -> usize { self.pos }

    /// Remaining bytes.
    pub fn remaining(&self) -> usize { self.buf.len() - self.pos }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        match self.buf.get(self.pos).copied() {
            Some(b) => { self.pos += 1; Ok(b) }
            None    => Err(Error::Truncated),
        }
    }

    /// Read exactly `out.len()` bytes.
    pub fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        let src = self.read_slice(out.len())?;
        out.copy_from_slice(src);
        Ok(())
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(Error::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(Error::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    /// Look at the next constructor id without consuming it.
    pub fn peek_u32(&self) -> Result<u32> {
        let b = self.buf.get(self.pos..self.pos + 4).ok_or(Error::Truncated)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Consume all remaining bytes into `out`.
    pub fn read_to_end(&mut self, out: &mut Vec<u8>) -> usize {
        let slice = &self.buf[self.pos..];
        out.extend_from_slice(slice);
        self.pos = self.buf.len();
        slice.len()
    }
}

/// Alias used by the vocabulary modules: `crate::deserialize::Buffer<'_, '_>`.
pub type Buffer<'a, 'b> = &'a mut Cursor<'b>;

// ─── Deserializable ──────────────────────────────────────────────────────────

/// Deserialize a value from TL binary format.
pub trait Deserializable: Sized {
    /// Read `Self` from `buf`, advancing its position.
    fn deserialize(buf: Buffer) -> Result<Self>;

    /// Deserialize from a byte slice.
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::from_slice(bytes);
        Self::deserialize(&mut cursor)
    }
}

// ─── Primitives ───────────────────────────────────────────────────────────────

impl Deserializable for bool {
    fn deserialize(buf: Buffer) -> Result<Self> {
        match u32::deserialize(buf)? {
            crate::BOOL_TRUE_ID => Ok(true),
            crate::BOOL_FALSE_ID => Ok(false),
            id => Err(Error::InvalidBool { id }),
        }
    }
}

macro_rules! le_deserializable {
    ( $( $t:ty ),+ ) => {
        $(
            impl Deserializable for $t {
                fn deserialize(buf: Buffer) -> Result<Self> {
                    let mut b = [0u8; size_of::<$t>()];
                    buf.read_exact(&mut b)?;
                    Ok(<$t>::from_le_bytes(b))
                }
            }
        )+
    };
}

le_deserializable!(i32, u32, i64, u64, f64);

impl Deserializable for [u8; 16] {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let mut b = [0u8; 16];
        buf.read_exact(&mut b)?;
        Ok(b)
    }
}

impl Deserializable for [u8; 32] {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let mut b = [0u8; 32];
        buf.read_exact(&mut b)?;
        Ok(b)
    }
}

// ─── Bytes / String ───────────────────────────────────────────────────────────

impl Deserializable for Vec<u8> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let first = buf.read_byte()?;
        let (len, header_len) = if first != 0xfe {
            (first as usize, 1)
        } else {
            let a = buf.read_byte()? as usize;
            let b = buf.read_byte()? as usize;
            let c = buf.read_byte()? as usize;
            (a | (b << 8) | (c << 16), 4)
        };

        let data = buf.read_slice(len)?.to_vec();

        let padding = (4 - ((header_len + len) % 4)) % 4;
        buf.read_slice(padding)?;

        Ok(data)
    }
}

impl Deserializable for String {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let bytes = Vec::<u8>::deserialize(buf)?;
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }
}

// ─── Vectors ─────────────────────────────────────────────────────────────────

fn read_count(buf: Buffer) -> Result<usize> {
    let len = i32::deserialize(buf)?;
    // Every TL item occupies at least four bytes.
    if len < 0 || len as usize > buf.remaining() / 4 {
        return Err(Error::LengthOutOfRange { len: len as i64 });
    }
    Ok(len as usize)
}

impl<T: Deserializable> Deserializable for Vec<T> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let id = u32::deserialize(buf)?;
        if id != VECTOR_ID {
            return Err(Error::UnknownConstructor { id });
        }
        let len = read_count(buf)?;
        (0..len).map(|_| T::deserialize(buf)).collect()
    }
}

impl<T: Deserializable> Deserializable for RawVec<T> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let len = read_count(buf)?;
        let inner = (0..len).map(|_| T::deserialize(buf)).collect::<Result<_>>()?;
        Ok(RawVec(inner))
    }
}

/// A blob swallows the rest of the buffer.
impl Deserializable for Blob {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let mut out = Vec::with_capacity(buf.remaining());
        buf.read_to_end(&mut out);
        Ok(Blob(out))
    }
}

impl<T: Deserializable> Deserializable for Box<T> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        T::deserialize(buf).map(Box::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_int() {
        assert_eq!(i64::from_bytes(&[1, 2, 3]), Err(Error::Truncated));
    }

    #[test]
    fn bool_rejects_other_ids() {
        let bytes = 0xdeadbeefu32.to_le_bytes();
        assert_eq!(bool::from_bytes(&bytes), Err(Error::InvalidBool { id: 0xdeadbeef }));
    }

    #[test]
    fn bytes_consume_padding() {
        // "ab" + 1 byte padding, then an i32 marker.
        let raw = [2, b'a', b'b', 0, 9, 0, 0, 0];
        let mut cur = Cursor::from_slice(&raw);
        assert_eq!(Vec::<u8>::deserialize(&mut cur).unwrap(), b"ab");
        assert_eq!(i32::deserialize(&mut cur).unwrap(), 9);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn bytes_truncated_payload() {
        let raw = [10, b'a', b'b', 0];
        assert_eq!(Vec::<u8>::from_bytes(&raw), Err(Error::Truncated));
    }

    #[test]
    fn vector_with_wrong_header() {
        let mut raw = 0x11223344u32.to_le_bytes().to_vec();
        raw.extend(0i32.to_le_bytes());
        assert_eq!(Vec::<i32>::from_bytes(&raw), Err(Error::UnknownConstructor { id: 0x11223344 }));
    }

    #[test]
    fn vector_count_larger_than_input() {
        let mut raw = VECTOR_ID.to_le_bytes().to_vec();
        raw.extend(1_000_000i32.to_le_bytes());
        assert!(matches!(Vec::<i64>::from_bytes(&raw), Err(Error::LengthOutOfRange { .. })));
    }

    #[test]
    fn peek_does_not_advance() {
        let raw = 5u32.to_le_bytes();
        let cur = Cursor::from_slice(&raw);
        assert_eq!(cur.peek_u32().unwrap(), 5);
        assert_eq!(cur.pos(), 0);
    }
}
