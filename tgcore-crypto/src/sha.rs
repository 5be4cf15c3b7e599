use sha1::Sha1;
use sha2::{Digest, Sha256};

/// SHA-1 over the concatenation of `parts`.
pub fn sha1(parts: &[&[u8]]) -> [u8; 20] {
    let mut h = Sha1::new();
    for p in parts {
        h.update(p);
    }
    h.finalize().into()
}

/// SHA-256 over the concatenation of `parts`.
pub fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut h = Sha256::new();
    for p in parts {
        h.update(p);
    }
    h.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_input_hashes_like_joined() {
        assert_eq!(sha256(&[b"ab", b"c"]), sha256(&[b"abc"]));
        assert_eq!(sha1(&[b"a", b"", b"bc"]), sha1(&[b"abc"]));
    }

    #[test]
    fn sha1_known_vector() {
        assert_eq!(
            sha1(&[b"abc"])[..4],
            [0xa9, 0x99, 0x3e, 0x36],
        );
    }
}
