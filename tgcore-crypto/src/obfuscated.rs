//! [Obfuscated2] transport cipher.
//!
//! The client opens the connection with 64 random bytes. Bytes `8..56` seed
//! two AES-256-CTR keystreams (one per direction, the second from the same
//! bytes reversed), bytes `56..60` carry the framing tag, and the last eight
//! bytes of the header are sent encrypted so the server can verify the tag.
//!
//! [Obfuscated2]: https://core.telegram.org/mtproto/mtproto-transports#transport-obfuscation

use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use ctr::Ctr128BE;
use ctr::cipher::{KeyIvInit, StreamCipher};

use crate::sha256;

/// Framing tag of the intermediate transport.
pub const INTERMEDIATE_TAG: [u8; 4] = [0xee, 0xee, 0xee, 0xee];

/// First words a client nonce must never start with, since they would make
/// the stream look like another protocol (HTTP verbs, plain framing tags,
/// TLS).
const RESERVED_FIRST_WORDS: [[u8; 4]; 7] = [
    *b"HEAD",
    *b"POST",
    *b"GET ",
    *b"OPTI",
    [0xdd, 0xdd, 0xdd, 0xdd],
    [0xee, 0xee, 0xee, 0xee],
    [0x16, 0x03, 0x01, 0x02],
];

type Aes256Ctr = Ctr128BE<Aes256>;

/// A pair of keystreams, one per direction.
pub struct ObfuscatedCipher {
    rx: Aes256Ctr,
    tx: Aes256Ctr,
}

fn stream(key_src: &[u8], iv: &[u8], secret: Option<&[u8]>) -> Aes256Ctr {
    let key = match secret {
        Some(s) => sha256(&[key_src, s]),
        None => {
            let mut k = [0u8; 32];
            k.copy_from_slice(key_src);
            k
        }
    };
    Aes256Ctr::new(GenericArray::from_slice(&key), GenericArray::from_slice(iv))
}

fn streams(init: &[u8; 64], secret: Option<&[u8]>) -> (Aes256Ctr, Aes256Ctr) {
    let mut reversed = [0u8; 48];
    reversed.copy_from_slice(&init[8..56]);
    reversed.reverse();

    let forward = stream(&init[8..40], &init[40..56], secret);
    let backward = stream(&reversed[..32], &reversed[32..48], secret);
    (forward, backward)
}

impl ObfuscatedCipher {
    /// Client side: sends with the forward stream, receives with the reversed one.
    pub fn new(init: &[u8; 64], secret: Option<&[u8]>) -> Self {
        let (tx, rx) = streams(init, secret);
        Self { rx, tx }
    }

    /// Server side of the same header.
    pub fn for_server(init: &[u8; 64], secret: Option<&[u8]>) -> Self {
        let (rx, tx) = streams(init, secret);
        Self { rx, tx }
    }

    /// Encrypt outgoing bytes in place.
    pub fn encrypt(&mut self, buf: &mut [u8]) {
        self.tx.apply_keystream(buf);
    }

    /// Decrypt incoming bytes in place.
    pub fn decrypt(&mut self, buf: &mut [u8]) {
        self.rx.apply_keystream(buf);
    }

    /// Separate the directions so reader and writer can live in different
    /// tasks. Returns `(send, receive)`.
    pub fn split(self) -> (Keystream, Keystream) {
        (Keystream(self.tx), Keystream(self.rx))
    }
}

/// One direction of an obfuscated stream.
pub struct Keystream(Aes256Ctr);

impl Keystream {
    /// XOR `buf` with the next bytes of the keystream.
    pub fn apply(&mut self, buf: &mut [u8]) {
        self.0.apply_keystream(buf);
    }
}

/// Generate a valid client nonce carrying `tag` at bytes `56..60`.
pub fn generate_init(tag: [u8; 4]) -> [u8; 64] {
    loop {
        let mut init = [0u8; 64];
        crate::fill_random(&mut init);
        init[56..60].copy_from_slice(&tag);
        if is_valid_init(&init) {
            return init;
        }
    }
}

fn is_valid_init(init: &[u8; 64]) -> bool {
    init[0] != 0xef
        && !RESERVED_FIRST_WORDS.iter().any(|w| init[..4] == w[..])
        && init[4..8] != [0, 0, 0, 0]
}

/// Build the 64-byte header a client sends, and the cipher for the rest of
/// the connection.
///
/// The cipher has already consumed the 64 header bytes of its send stream.
pub fn client_handshake(tag: [u8; 4], secret: Option<&[u8]>) -> ([u8; 64], ObfuscatedCipher) {
    let init = generate_init(tag);
    let mut cipher = ObfuscatedCipher::new(&init, secret);

    let mut encrypted = init;
    cipher.encrypt(&mut encrypted);

    let mut header = init;
    header[56..64].copy_from_slice(&encrypted[56..64]);
    (header, cipher)
}

/// Accept a client header: returns the server-side cipher and the framing tag.
///
/// The cipher has already consumed the 64 header bytes of its receive stream.
pub fn server_handshake(header: &[u8; 64], secret: Option<&[u8]>) -> (ObfuscatedCipher, [u8; 4]) {
    let mut cipher = ObfuscatedCipher::for_server(header, secret);
    let mut decrypted = *header;
    cipher.decrypt(&mut decrypted);
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&decrypted[56..60]);
    (cipher, tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_nonce_respects_constraints() {
        for _ in 0..200 {
            let init = generate_init(INTERMEDIATE_TAG);
            assert!(is_valid_init(&init));
            assert_eq!(init[56..60], INTERMEDIATE_TAG);
        }
    }

    #[test]
    fn reserved_prefixes_rejected() {
        let mut init = [1u8; 64];
        assert!(is_valid_init(&init));
        init[..4].copy_from_slice(b"POST");
        assert!(!is_valid_init(&init));
        init[..4].copy_from_slice(&[0xef, 1, 1, 1]);
        assert!(!is_valid_init(&init));
        init[..4].copy_from_slice(&[1, 1, 1, 1]);
        init[4..8].copy_from_slice(&[0, 0, 0, 0]);
        assert!(!is_valid_init(&init));
    }

    #[test]
    fn server_recovers_tag_and_traffic() {
        let proxy_secret = [7u8; 16];
        for secret in [None, Some(&proxy_secret[..])] {
            let (header, mut client) = client_handshake(INTERMEDIATE_TAG, secret);
            let (mut server, tag) = server_handshake(&header, secret);
            assert_eq!(tag, INTERMEDIATE_TAG);

            let mut up = b"client says hi".to_vec();
            client.encrypt(&mut up);
            server.decrypt(&mut up);
            assert_eq!(up, b"client says hi");

            let mut down = b"server answers".to_vec();
            server.encrypt(&mut down);
            client.decrypt(&mut down);
            assert_eq!(down, b"server answers");
        }
    }

    #[test]
    fn split_halves_keep_their_position() {
        let (header, client) = client_handshake(INTERMEDIATE_TAG, None);
        let (mut server, _) = server_handshake(&header, None);
        let (mut send, mut recv) = client.split();

        let mut up = [1u8, 2, 3, 4];
        send.apply(&mut up);
        server.decrypt(&mut up);
        assert_eq!(up, [1, 2, 3, 4]);

        let mut down = [9u8; 6];
        server.encrypt(&mut down);
        recv.apply(&mut down);
        assert_eq!(down, [9; 6]);
    }
}
