//! The MTProto 2.0 encrypted envelope.
//!
//! ```text
//! salt:i64 session_id:i64 msg_id:i64 seq_no:i32 len:i32 body:[u8; len] padding
//! ```
//!
//! [`EncryptedSession`] wraps and unwraps one envelope at a time; it holds no
//! sequence state of its own, so a reader task can own a clone and decrypt
//! without touching the writer.

use std::fmt;

use tgcore_crypto::{AuthKey, Side, decrypt_data_v2, encrypt_data_v2};

/// Errors that can occur when opening a received envelope.
///
/// All of them mean the connection can no longer be trusted.
#[derive(Clone, Debug, PartialEq)]
pub enum DecryptError {
    /// The crypto layer rejected the frame (key id or msg_key mismatch).
    Crypto(tgcore_crypto::DecryptError),
    /// The plaintext is shorter than the envelope header.
    FrameTooShort,
    /// The envelope belongs to another session.
    SessionMismatch { expected: i64, got: i64 },
    /// The declared body length overruns the plaintext or is not 4-aligned.
    LengthOutOfRange { len: i64 },
    /// Padding after the body is outside `12..=1024` bytes.
    PaddingOutOfRange { len: usize },
    /// The sender's `msg_id` has the wrong parity for its direction.
    BadMsgId { msg_id: i64 },
}

impl fmt::Display for DecryptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crypto(e) => write!(f, "crypto: {e}"),
            Self::FrameTooShort => write!(f, "inner plaintext too short"),
            Self::SessionMismatch { expected, got } => {
                write!(f, "session_id mismatch (expected {expected}, got {got})")
            }
            Self::LengthOutOfRange { len } => write!(f, "message length out of range: {len}"),
            Self::PaddingOutOfRange { len } => write!(f, "padding out of range: {len} bytes"),
            Self::BadMsgId { msg_id } => write!(f, "msg_id {msg_id} has the wrong parity"),
        }
    }
}

impl std::error::Error for DecryptError {}

impl From<tgcore_crypto::DecryptError> for DecryptError {
    fn from(e: tgcore_crypto::DecryptError) -> Self { Self::Crypto(e) }
}

/// The inner payload extracted from a successfully decrypted frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DecryptedMessage {
    pub salt: i64,
    pub session_id: i64,
    pub msg_id: i64,
    pub seq_no: i32,
    pub body: Vec<u8>,
}

/// One end of an encrypted MTProto session.
#[derive(Clone)]
pub struct EncryptedSession {
    auth_key: AuthKey,
    session_id: i64,
    side: Side,
    /// Salt written into outgoing envelopes.
    pub salt: i64,
}

const HEADER_LEN: usize = 8 + 8 + 8 + 4 + 4;

impl EncryptedSession {
    /// Client side of a new session with a random `session_id`.
    pub fn new(auth_key: AuthKey, salt: i64) -> Self {
        Self::with_session_id(auth_key, tgcore_crypto::random_i64(), salt, Side::Client)
    }

    /// Either side of a session whose id is already known.
    pub fn with_session_id(auth_key: AuthKey, session_id: i64, salt: i64, side: Side) -> Self {
        Self { auth_key, session_id, side, salt }
    }

    pub fn session_id(&self) -> i64 { self.session_id }

    pub fn auth_key(&self) -> &AuthKey { &self.auth_key }

    pub fn side(&self) -> Side { self.side }

    /// Wrap one message into a wire-ready encrypted payload.
    pub fn encrypt(&self, msg_id: i64, seq_no: i32, body: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(24 + HEADER_LEN + body.len() + 1024);
        buf.extend(self.salt.to_le_bytes());
        buf.extend(self.session_id.to_le_bytes());
        buf.extend(msg_id.to_le_bytes());
        buf.extend(seq_no.to_le_bytes());
        buf.extend((body.len() as u32).to_le_bytes());
        buf.extend_from_slice(body);

        encrypt_data_v2(&mut buf, &self.auth_key, self.side);
        buf
    }

    /// Open a frame produced by the other side.
    ///
    /// Verifies `session_id`, the body length, the padding size and the
    /// parity of the peer's `msg_id` on top of the key checks done while
    /// decrypting.
    pub fn decrypt(&self, frame: &mut [u8]) -> Result<DecryptedMessage, DecryptError> {
        let peer = match self.side {
            Side::Client => Side::Server,
            Side::Server => Side::Client,
        };
        let plaintext = decrypt_data_v2(frame, &self.auth_key, peer)?;
        if plaintext.len() < HEADER_LEN {
            return Err(DecryptError::FrameTooShort);
        }

        let salt = i64::from_le_bytes(field(plaintext, 0));
        let session_id = i64::from_le_bytes(field(plaintext, 8));
        let msg_id = i64::from_le_bytes(field(plaintext, 16));
        let seq_no = i32::from_le_bytes(field(plaintext, 24));
        let len = i64::from(u32::from_le_bytes(field(plaintext, 28)));

        if session_id != self.session_id {
            return Err(DecryptError::SessionMismatch { expected: self.session_id, got: session_id });
        }
        let available = (plaintext.len() - HEADER_LEN) as i64;
        if len > available || len % 4 != 0 {
            return Err(DecryptError::LengthOutOfRange { len });
        }
        let padding = (available - len) as usize;
        if !(12..=1024).contains(&padding) {
            return Err(DecryptError::PaddingOutOfRange { len: padding });
        }
        let parity_ok = match peer {
            Side::Server => msg_id % 2 != 0,
            Side::Client => msg_id % 4 == 0,
        };
        if !parity_ok {
            return Err(DecryptError::BadMsgId { msg_id });
        }

        let body = plaintext[HEADER_LEN..HEADER_LEN + len as usize].to_vec();
        Ok(DecryptedMessage { salt, session_id, msg_id, seq_no, body })
    }
}

/// `N` bytes at a fixed offset; callers check the length first.
fn field<const N: usize>(buf: &[u8], at: usize) -> [u8; N] {
    let mut b = [0u8; N];
    b.copy_from_slice(&buf[at..at + N]);
    b
}
