//! TL binary codec and the constructor vocabulary spoken by tgcore.
//!
//! The vocabulary is fixed: the MTProto service constructors a session needs
//! to keep a connection alive, plus the handful of API constructors used by
//! the connection handshake and the peer tables. Everything else travels as
//! an opaque [`Blob`].
//!
//! # Overview
//!
//! | Module        | Contents                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`types`]     | Concrete constructors (bare types) as `struct`s            |
//! | [`functions`] | RPC functions as `struct`s implementing [`RemoteCall`]     |
//! | [`enums`]     | Boxed types as `enum`s, decoded by a match on the tag      |
//!
//! # Raw usage
//!
//! ```rust
//! use tgcore_tl::{functions, Deserializable, Serializable};
//!
//! let req = functions::Ping { ping_id: 42 };
//! let bytes = req.to_bytes();
//! assert_eq!(&bytes[..4], &0x7abe77ecu32.to_le_bytes());
//! ```

#![deny(unsafe_code)]
#![allow(clippy::large_enum_variant)]

#[macro_use]
mod macros;

pub mod deserialize;
pub mod serialize;
mod gzip;

pub mod enums;
pub mod functions;
pub mod types;

pub use deserialize::{Cursor, Deserializable};
pub use gzip::{GzipPacked, inflate_if_packed};
pub use serialize::Serializable;

/// The API layer the vocabulary is pinned to.
pub const LAYER: i32 = 158;

/// Constructor ID of the boxed `Vector` header.
pub const VECTOR_ID: u32 = 0x1cb5c415;
/// `boolTrue#997275b5`
pub const BOOL_TRUE_ID: u32 = 0x997275b5;
/// `boolFalse#bc799737`
pub const BOOL_FALSE_ID: u32 = 0xbc799737;

/// Bare vector: `vector` (lowercase) as opposed to the boxed `Vector`.
///
/// A length-prefixed list without the usual `0x1cb5c415` header.
#[derive(Clone, Debug, PartialEq)]
pub struct RawVec<T>(pub Vec<T>);

/// Opaque, already-encoded TL that is passed through without interpretation.
///
/// Returned by calls whose response type is generic (e.g. `X`) and used for
/// update payloads the core never inspects.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Blob(pub Vec<u8>);

impl From<Vec<u8>> for Blob {
    fn from(v: Vec<u8>) -> Self { Self(v) }
}

impl Blob {
    /// The constructor ID at the head of the blob, if there are four bytes.
    pub fn constructor_id(&self) -> Option<u32> {
        self.0.get(..4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

// ─── Core traits ──────────────────────────────────────────────────────────────

/// Every vocabulary type has a unique 32-bit constructor ID.
pub trait Identifiable {
    /// The constructor ID as specified in the TL schema.
    const CONSTRUCTOR_ID: u32;
}

/// Marks a function type that can be sent to Telegram as an RPC call.
///
/// `Return` is the type Telegram will respond with.
pub trait RemoteCall: Serializable {
    /// The deserialized response type.
    type Return: Deserializable;
}

/// Returns the TL name for a known constructor ID.
pub fn name_for_id(id: u32) -> Option<&'static str> {
    Some(match id {
        0x1cb5c415 => "vector",
        0x997275b5 => "boolTrue",
        0xbc799737 => "boolFalse",
        0x3072cfa1 => "gzip_packed",
        0x73f1f8dc => "msg_container",
        0xf35c6d01 => "rpc_result",
        0x2144ca19 => "rpc_error",
        0x5e2ad36e => "rpc_answer_unknown",
        0xcd78e586 => "rpc_answer_dropped_running",
        0xa43ad8b7 => "rpc_answer_dropped",
        0x62d6b459 => "msgs_ack",
        0xa7eff811 => "bad_msg_notification",
        0xedab447b => "bad_server_salt",
        0x276d3ec6 => "msg_detailed_info",
        0x809db6df => "msg_new_detailed_info",
        0x7d861a08 => "msg_resend_req",
        0xda69fb52 => "msgs_state_req",
        0x04deb57d => "msgs_state_info",
        0x8cc0d131 => "msgs_all_info",
        0x0949d9dc => "future_salt",
        0xae500895 => "future_salts",
        0x347773c5 => "pong",
        0x9ec20908 => "new_session_created",
        0xe22045fc => "destroy_session_ok",
        0x62d350c9 => "destroy_session_none",
        0x9299359f => "http_wait",
        0x7abe77ec => "ping",
        0xf3427b8c => "ping_delay_disconnect",
        0xb921bd04 => "get_future_salts",
        0x58e4a740 => "rpc_drop_answer",
        0xe7512126 => "destroy_session",
        0xda9b0d0d => "invokeWithLayer",
        0xc1cd5ec9 => "initConnection",
        0xc4f9186b => "help.getConfig",
        0x1fb33026 => "help.getNearestDc",
        0xcc1a241e => "config",
        0x18b7a10d => "dcOption",
        0x8e1a1775 => "nearestDc",
        0x7f3b18ea => "inputPeerEmpty",
        0x7da07ec9 => "inputPeerSelf",
        0x35a95cb9 => "inputPeerChat",
        0xdde8a54c => "inputPeerUser",
        0x27bcbbfc => "inputPeerChannel",
        0x59511722 => "peerUser",
        0x36c6019a => "peerChat",
        0xa2a5371e => "peerChannel",
        _ => return None,
    })
}
