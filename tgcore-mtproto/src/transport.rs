//! [MTProto Intermediate] framing.
//!
//! Every packet is `[len: u32 LE][payload]`. A payload of exactly four bytes
//! is not an MTProto message but a negative Int32 status code from the
//! server (for example `-404` when the auth key is unknown).
//!
//! [MTProto Intermediate]: https://core.telegram.org/mtproto/mtproto-transports#intermediate

use std::fmt;

/// Largest payload accepted from the wire.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// One unit received from the transport.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// An encrypted MTProto payload.
    Payload(Vec<u8>),
    /// An out-of-band status code.
    ServerCode(i32),
    /// The peer closed the stream.
    Closed,
}

impl Frame {
    /// Classify a complete payload read from the wire.
    pub fn from_payload(payload: Vec<u8>) -> Self {
        match <[u8; 4]>::try_from(payload.as_slice()) {
            Ok(code) => Self::ServerCode(i32::from_le_bytes(code)),
            Err(_) => Self::Payload(payload),
        }
    }
}

/// A length prefix that cannot start a valid frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameLengthError {
    pub len: usize,
}

impl fmt::Display for FrameLengthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "implausible frame length {}", self.len)
    }
}

impl std::error::Error for FrameLengthError {}

/// Decode a length prefix.
pub fn frame_len(prefix: [u8; 4]) -> Result<usize, FrameLengthError> {
    let len = u32::from_le_bytes(prefix) as usize;
    if len < 4 || len > MAX_FRAME_LEN || len % 4 != 0 {
        return Err(FrameLengthError { len });
    }
    Ok(len)
}

/// Prefix `payload` with its length.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend((payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_byte_payload_is_a_server_code() {
        assert_eq!(Frame::from_payload((-404i32).to_le_bytes().to_vec()), Frame::ServerCode(-404));
        assert_eq!(Frame::from_payload(vec![0; 8]), Frame::Payload(vec![0; 8]));
    }

    #[test]
    fn length_prefix() {
        let framed = encode_frame(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&framed[..4], &[8, 0, 0, 0]);
        assert_eq!(frame_len([8, 0, 0, 0]), Ok(8));
        assert!(frame_len([0, 0, 0, 0]).is_err());
        assert!(frame_len([6, 0, 0, 0]).is_err());
        assert!(frame_len([0, 0, 0, 0x7f]).is_err());
    }
}
