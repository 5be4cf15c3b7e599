//! Sans-IO MTProto 2.0 session core.
//!
//! This crate handles:
//! * Message ids (process-wide, monotonic) and sequence numbers
//! * Message containers and `rpc_result`
//! * The encrypted envelope, checked in both directions
//! * Classifying server messages (service messages, replies, updates)
//! * Ack batching, duplicate suppression and server salts
//! * Intermediate transport framing
//!
//! It performs no I/O: bring your own socket and timers.

#![deny(unsafe_code)]

pub mod acks;
pub mod bad_msg;
pub mod encrypted;
pub mod message;
pub mod msg_id;
pub mod salt;
pub mod service;
pub mod session;
pub mod transport;

pub use acks::{AckQueue, SeenMsgIds};
pub use bad_msg::BadMsgCode;
pub use encrypted::{DecryptError, DecryptedMessage, EncryptedSession};
pub use message::{Message, MessageContainer, RpcResult, SeqNo};
pub use salt::ServerSalt;
pub use service::{Inbound, RpcAnswer, ServiceMessage};
pub use session::{Packed, Session};
pub use transport::Frame;
