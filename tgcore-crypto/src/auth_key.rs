//! The 2048-bit key shared with one data center.

use std::fmt;

use crate::sha1;

/// A Telegram authorization key (256 bytes) plus its 64-bit identifier.
///
/// The key is produced by an out-of-band Diffie-Hellman exchange; this type
/// only carries it. The identifier is the low 64 bits of `SHA1(key)`.
#[derive(Clone)]
pub struct AuthKey {
    pub(crate) data: [u8; 256],
    pub(crate) key_id: [u8; 8],
}

impl AuthKey {
    /// Wrap raw key material.
    pub fn from_bytes(data: [u8; 256]) -> Self {
        let sha = sha1(&[&data]);
        let mut key_id = [0u8; 8];
        key_id.copy_from_slice(&sha[12..20]);
        Self { data, key_id }
    }

    /// Wrap key material read from storage; `None` unless exactly 256 bytes.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let data: [u8; 256] = data.try_into().ok()?;
        Some(Self::from_bytes(data))
    }

    /// The raw 256-byte key.
    pub fn to_bytes(&self) -> [u8; 256] { self.data }

    /// The 8-byte key identifier as it appears on the wire.
    pub fn key_id(&self) -> [u8; 8] { self.key_id }

    /// The key identifier as a little-endian integer.
    pub fn id(&self) -> i64 { i64::from_le_bytes(self.key_id) }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthKey(id={:#018x})", self.id())
    }
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool { self.data == other.data }
}

impl Eq for AuthKey {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_is_sha1_tail() {
        let data = [0x5au8; 256];
        let key = AuthKey::from_bytes(data);
        let sha = sha1(&[&data]);
        assert_eq!(key.key_id(), sha[12..20]);
        assert_eq!(key.id(), i64::from_le_bytes(sha[12..20].try_into().unwrap()));
    }

    #[test]
    fn from_slice_requires_full_length() {
        assert!(AuthKey::from_slice(&[1u8; 255]).is_none());
        assert!(AuthKey::from_slice(&[1u8; 256]).is_some());
    }

    #[test]
    fn debug_hides_material() {
        let s = format!("{:?}", AuthKey::from_bytes([9u8; 256]));
        assert!(s.starts_with("AuthKey(id="));
        assert!(!s.contains("9, 9"));
    }
}
