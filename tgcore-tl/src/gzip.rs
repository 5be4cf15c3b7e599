//! `gzip_packed#3072cfa1 packed_data:string = Object;`
//!
//! The server may wrap any object in `gzip_packed`. Readers never see the
//! wrapper: [`inflate_if_packed`] peels it off before decoding.

use std::borrow::Cow;
use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::GzEncoder;

use crate::deserialize::{Buffer, Error, Result};
use crate::{Deserializable, Identifiable, Serializable};

/// A gzip-compressed TL value.
#[derive(Clone, Debug, PartialEq)]
pub struct GzipPacked {
    pub packed_data: Vec<u8>,
}

impl Identifiable for GzipPacked {
    const CONSTRUCTOR_ID: u32 = 0x3072cfa1;
}

impl GzipPacked {
    /// Compress already-encoded TL.
    pub fn new(unpacked: &[u8]) -> io::Result<Self> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(unpacked)?;
        Ok(Self { packed_data: enc.finish()? })
    }

    /// Inflate the payload back into encoded TL.
    pub fn decompress(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if GzDecoder::new(self.packed_data.as_slice()).read_to_end(&mut out).is_ok() {
            return Ok(out);
        }
        out.clear();
        ZlibDecoder::new(self.packed_data.as_slice())
            .read_to_end(&mut out)
            .map_err(|e| Error::Decompression(e.to_string()))?;
        Ok(out)
    }
}

/// Boxed form: the constructor ID is part of the value.
impl Serializable for GzipPacked {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        Self::CONSTRUCTOR_ID.serialize(buf);
        self.packed_data.serialize(buf);
    }
}

impl Deserializable for GzipPacked {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let id = u32::deserialize(buf)?;
        if id != Self::CONSTRUCTOR_ID {
            return Err(Error::UnknownConstructor { id });
        }
        Ok(Self { packed_data: Vec::<u8>::deserialize(buf)? })
    }
}

/// Return `body` unchanged, or its inflated contents if it is a
/// `gzip_packed` object. Nested wrappers are peeled one after another.
pub fn inflate_if_packed(body: &[u8]) -> Result<Cow<'_, [u8]>> {
    let mut current = Cow::Borrowed(body);
    while current.get(..4) == Some(&GzipPacked::CONSTRUCTOR_ID.to_le_bytes()[..]) {
        let packed = GzipPacked::from_bytes(&current)?;
        current = Cow::Owned(packed.decompress()?);
    }
    Ok(current)
}
