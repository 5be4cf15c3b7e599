//! AES-256 in Infinite Garble Extension mode.
//!
//! IGE chains each block to both the previous ciphertext and the previous
//! plaintext:
//!
//! ```text
//! c[i] = E(p[i] ^ c[i-1]) ^ p[i-1]        c[0] = iv[..16], p[0] = iv[16..]
//! ```
//!
//! Buffers must be a multiple of 16 bytes; a trailing partial block is left
//! untouched.

use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

fn xor16(dst: &mut [u8], src: &[u8; 16]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// Encrypt `buffer` in place.
pub fn ige_encrypt(buffer: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    debug_assert_eq!(buffer.len() % 16, 0);
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut prev_cipher = [0u8; 16];
    let mut prev_plain = [0u8; 16];
    prev_cipher.copy_from_slice(&iv[..16]);
    prev_plain.copy_from_slice(&iv[16..]);

    for block in buffer.chunks_exact_mut(16) {
        let mut plain = [0u8; 16];
        plain.copy_from_slice(block);

        xor16(block, &prev_cipher);
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
        xor16(block, &prev_plain);

        prev_cipher.copy_from_slice(block);
        prev_plain = plain;
    }
}

/// Decrypt `buffer` in place.
pub fn ige_decrypt(buffer: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    debug_assert_eq!(buffer.len() % 16, 0);
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut prev_cipher = [0u8; 16];
    let mut prev_plain = [0u8; 16];
    prev_cipher.copy_from_slice(&iv[..16]);
    prev_plain.copy_from_slice(&iv[16..]);

    for block in buffer.chunks_exact_mut(16) {
        let mut encrypted = [0u8; 16];
        encrypted.copy_from_slice(block);

        xor16(block, &prev_plain);
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
        xor16(block, &prev_cipher);

        prev_plain.copy_from_slice(block);
        prev_cipher = encrypted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_iv() -> ([u8; 32], [u8; 32]) {
        (std::array::from_fn(|i| i as u8), std::array::from_fn(|i| (i * 7) as u8))
    }

    #[test]
    fn roundtrip() {
        let (key, iv) = key_iv();
        let original: Vec<u8> = (0..96u32).map(|i| (i * 13) as u8).collect();
        let mut buf = original.clone();
        ige_encrypt(&mut buf, &key, &iv);
        assert_ne!(buf, original);
        ige_decrypt(&mut buf, &key, &iv);
        assert_eq!(buf, original);
    }

    #[test]
    fn first_block_matches_definition() {
        let (key, iv) = key_iv();
        let plain = [0x42u8; 16];

        let mut expected = plain;
        xor16(&mut expected, iv[..16].try_into().unwrap());
        Aes256::new(GenericArray::from_slice(&key))
            .encrypt_block(GenericArray::from_mut_slice(&mut expected));
        xor16(&mut expected, iv[16..].try_into().unwrap());

        let mut buf = plain;
        ige_encrypt(&mut buf, &key, &iv);
        assert_eq!(buf, expected);
    }

    #[test]
    fn identical_blocks_encrypt_differently() {
        let (key, iv) = key_iv();
        let mut buf = [0u8; 32];
        ige_encrypt(&mut buf, &key, &iv);
        assert_ne!(buf[..16], buf[16..]);
    }
}
