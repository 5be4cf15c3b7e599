//! Cryptographic primitives for Telegram MTProto 2.0.
//!
//! Provides:
//! - AES-256-IGE encryption/decryption
//! - SHA-1 / SHA-256 helpers
//! - `AuthKey`, the 256-byte key shared with a data center
//! - MTProto 2.0 message encryption / decryption, in both directions
//! - The Obfuscated2 transport cipher

#![deny(unsafe_code)]

pub mod aes;
mod auth_key;
pub mod obfuscated;
mod sha;

pub use auth_key::AuthKey;
pub use obfuscated::{Keystream, ObfuscatedCipher};
pub use sha::{sha1, sha256};

// ─── Randomness ──────────────────────────────────────────────────────────────

/// Fill `buf` from the operating system RNG.
///
/// # Panics
///
/// If the platform has no usable entropy source. Nothing in MTProto can
/// proceed without one.
pub fn fill_random(buf: &mut [u8]) {
    if let Err(e) = getrandom::getrandom(buf) {
        panic!("operating system RNG unavailable: {e}");
    }
}

/// A random `i64` (session ids, ping ids, request nonces).
pub fn random_i64() -> i64 {
    let mut b = [0u8; 8];
    fill_random(&mut b);
    i64::from_le_bytes(b)
}

// ─── MTProto 2.0 encrypt / decrypt ───────────────────────────────────────────

/// Errors from [`decrypt_data_v2`].
#[derive(Clone, Debug, PartialEq)]
pub enum DecryptError {
    /// Ciphertext too short or not block-aligned.
    InvalidBuffer,
    /// The `auth_key_id` in the ciphertext does not match our key.
    AuthKeyMismatch,
    /// The `msg_key` in the ciphertext does not match our computed value.
    MessageKeyMismatch,
}

impl std::fmt::Display for DecryptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBuffer => write!(f, "invalid ciphertext buffer length"),
            Self::AuthKeyMismatch => write!(f, "auth_key_id mismatch"),
            Self::MessageKeyMismatch => write!(f, "msg_key mismatch"),
        }
    }
}
impl std::error::Error for DecryptError {}

/// Which end of the connection produced a ciphertext.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    /// Offset into the auth key used by this direction.
    fn x(self) -> usize {
        match self {
            Side::Client => 0,
            Side::Server => 8,
        }
    }
}

/// Bytes of the auth key prepended to the plaintext when computing `msg_key`.
fn msg_key_for(auth_key: &AuthKey, plaintext: &[u8], side: Side) -> [u8; 16] {
    let x = side.x();
    let large = sha256(&[&auth_key.data[88 + x..88 + x + 32], plaintext]);
    let mut msg_key = [0u8; 16];
    msg_key.copy_from_slice(&large[8..24]);
    msg_key
}

fn calc_key(auth_key: &AuthKey, msg_key: &[u8; 16], side: Side) -> ([u8; 32], [u8; 32]) {
    let x = side.x();
    let sha_a = sha256(&[&msg_key[..], &auth_key.data[x..x + 36]]);
    let sha_b = sha256(&[&auth_key.data[40 + x..40 + x + 36], &msg_key[..]]);

    let mut aes_key = [0u8; 32];
    aes_key[..8].copy_from_slice(&sha_a[..8]);
    aes_key[8..24].copy_from_slice(&sha_b[8..24]);
    aes_key[24..].copy_from_slice(&sha_a[24..]);

    let mut aes_iv = [0u8; 32];
    aes_iv[..8].copy_from_slice(&sha_b[..8]);
    aes_iv[8..24].copy_from_slice(&sha_a[8..24]);
    aes_iv[24..].copy_from_slice(&sha_b[24..]);

    (aes_key, aes_iv)
}

/// Smallest padding of at least 12 bytes that block-aligns `len`, plus
/// `extra_blocks` whole blocks, never exceeding 1024 bytes.
fn padding_len(len: usize, extra_blocks: usize) -> usize {
    let min = 12 + (16 - (len + 12) % 16) % 16;
    let max_extra = (1024 - min) / 16;
    min + 16 * extra_blocks.min(max_extra)
}

/// Encrypt a plaintext envelope in place using MTProto 2.0.
///
/// On entry `buffer` holds `salt || session_id || msg_id || seq_no || len ||
/// body`; on return it holds `auth_key_id || msg_key || ciphertext`.
pub fn encrypt_data_v2(buffer: &mut Vec<u8>, auth_key: &AuthKey, side: Side) {
    let mut rnd = [0u8; 1];
    fill_random(&mut rnd);
    let pad = padding_len(buffer.len(), (rnd[0] & 0x0f) as usize);

    let start = buffer.len();
    buffer.resize(start + pad, 0);
    fill_random(&mut buffer[start..]);

    do_encrypt_data_v2(buffer, auth_key, side);
}

fn do_encrypt_data_v2(buffer: &mut Vec<u8>, auth_key: &AuthKey, side: Side) {
    let msg_key = msg_key_for(auth_key, buffer, side);
    let (key, iv) = calc_key(auth_key, &msg_key, side);
    aes::ige_encrypt(buffer, &key, &iv);

    let mut header = [0u8; 24];
    header[..8].copy_from_slice(&auth_key.key_id);
    header[8..].copy_from_slice(&msg_key);
    buffer.splice(0..0, header);
}

/// Decrypt an MTProto 2.0 ciphertext produced by `side`.
///
/// `buffer` must start with `key_id || msg_key || ciphertext`. On success
/// returns the plaintext slice (padding included); envelope fields are
/// checked by the caller.
pub fn decrypt_data_v2<'a>(
    buffer: &'a mut [u8],
    auth_key: &AuthKey,
    side: Side,
) -> Result<&'a mut [u8], DecryptError> {
    if buffer.len() < 24 + 16 || (buffer.len() - 24) % 16 != 0 {
        return Err(DecryptError::InvalidBuffer);
    }
    if auth_key.key_id != buffer[..8] {
        return Err(DecryptError::AuthKeyMismatch);
    }
    let mut msg_key = [0u8; 16];
    msg_key.copy_from_slice(&buffer[8..24]);

    let (key, iv) = calc_key(auth_key, &msg_key, side);
    aes::ige_decrypt(&mut buffer[24..], &key, &iv);

    if msg_key != msg_key_for(auth_key, &buffer[24..], side) {
        return Err(DecryptError::MessageKeyMismatch);
    }
    Ok(&mut buffer[24..])
}
