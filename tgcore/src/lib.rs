//! # tgcore — Telegram MTProto session core
//!
//! `tgcore` wires together four focused sub-crates:
//!
//! | Sub-crate        | Role                                                        |
//! |------------------|-------------------------------------------------------------|
//! | `tgcore-tl`      | TL codec and the service / handshake vocabulary             |
//! | `tgcore-crypto`  | AES-IGE, MTProto 2.0 key derivation, obfuscation keystream  |
//! | `tgcore-mtproto` | Sans-IO session: msg ids, seq numbers, containers, acks     |
//! | `tgcore-client`  | Async session, retries, storage, peer and file ids          |
//!
//! ## Quick start: sans-IO
//!
//! ```rust
//! use tgcore::tl::{functions, Serializable};
//! use tgcore::mtproto::{Session, salt::INITIAL_SALT};
//! use tgcore::AuthKey;
//!
//! let mut session = Session::new(AuthKey::from_bytes([1; 256]), INITIAL_SALT);
//! let packed = session.pack(&functions::Ping { ping_id: 0 }.to_bytes());
//!
//! // Frame `packed.payload` and write it to your transport.
//! assert!(packed.container_id.is_none());
//! ```
//!
//! ## Quick start: client
//!
//! ```rust,no_run
//! # #[cfg(feature = "client")]
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use tgcore::client::{Client, SessionConfig, storage::FileStorage};
//!
//! let storage = Arc::new(FileStorage::open("my_account.session")?);
//! let client = Client::start(SessionConfig { api_id: 12345, ..Default::default() }, storage).await?;
//! let config = client.invoke(&tgcore::tl::functions::help::GetConfig {}).await?;
//! println!("{config:?}");
//! # Ok(()) }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Re-export of [`tgcore_tl`]: constructors, functions and enums.
pub use tgcore_tl as tl;

/// Re-export of [`tgcore_mtproto`]: session state, envelope, framing.
pub use tgcore_mtproto as mtproto;

/// Re-export of [`tgcore_crypto`]: AES-IGE, SHA, AuthKey, obfuscation.
pub use tgcore_crypto as crypto;

/// Re-export of [`tgcore_client`] (requires `feature = "client"`).
#[cfg(feature = "client")]
pub use tgcore_client as client;

// ─── Convenience re-exports ───────────────────────────────────────────────────

pub use tgcore_tl::{
    Identifiable,
    RemoteCall,
    Serializable,
    Deserializable,
    LAYER,
};

pub use tgcore_mtproto::EncryptedSession;
pub use tgcore_crypto::AuthKey;

#[cfg(feature = "client")]
pub use tgcore_client::{Client, InvocationError, Session, SessionConfig};
