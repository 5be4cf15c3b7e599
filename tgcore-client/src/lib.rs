//! # tgcore-client
//!
//! Async MTProto session core.
//!
//! ## Features
//! - One long-lived session per DC over obfuscated intermediate TCP
//!   (optionally through SOCKS5)
//! - Ping, salt-refresh and ack handling in background tasks
//! - Transparent resend on `bad_server_salt` / clock and seq_no corrections
//! - Reconnect with backoff; waiting callers resubmit on the new connection
//! - `FLOOD_WAIT` auto-sleep and transient-error retries via [`RetryPolicy`]
//! - Session and peer persistence: SQLite file or in-memory with session
//!   strings
//! - Bot-API style peer ids and file-id / file-unique-id codecs
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tgcore_client::{Client, SessionConfig, storage::FileStorage};
//! use tgcore_tl::functions;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(FileStorage::open("my_account.session")?);
//! let client = Client::start(SessionConfig { api_id: 12345, ..Default::default() }, storage).await?;
//!
//! let config = client.invoke(&functions::help::GetConfig {}).await?;
//! println!("{config:?}");
//!
//! client.stop().await?;
//! # Ok(()) }
//! ```

#![deny(unsafe_code)]

mod errors;
mod retry;
mod session;
pub mod dc;
pub mod file_id;
pub mod peer_id;
pub mod socks5;
pub mod storage;
pub mod transport;

pub use errors::{
    InvocationError, RpcError, RpcErrorKind, StopReason, StorageError, TransportError,
};
pub use retry::{AutoSleep, InvokeOptions, NoRetries, RetryContext, RetryPolicy};
pub use session::{Session, SessionState};
pub use socks5::Socks5Config;
pub use storage::Storage;

use std::sync::Arc;
use std::time::Duration;

use tgcore_tl::{RemoteCall, enums};
use tokio::sync::mpsc;

use crate::storage::now;
use crate::transport::Connector;

// ─── SessionConfig ────────────────────────────────────────────────────────────

/// Configuration for [`Session::start`] and [`Client::start`].
#[derive(Clone)]
pub struct SessionConfig {
    pub api_id:           i32,
    pub device_model:     String,
    pub system_version:   String,
    pub app_version:      String,
    pub system_lang_code: String,
    pub lang_pack:        String,
    pub lang_code:        String,
    /// Use the test DCs (port 80).
    pub test_mode:        bool,
    /// Prefer IPv6 DC addresses.
    pub ipv6:             bool,
    /// Connect to the media-only address of the DC where there is one.
    pub is_media:         bool,
    /// Optional SOCKS5 proxy for the default TCP connector.
    pub proxy:            Option<Socks5Config>,
    /// Replaces the TCP connector entirely (`proxy` is then ignored).
    pub connector:        Option<Arc<dyn Connector>>,
    /// Default per-call answer timeout; also sets the ping's disconnect delay.
    pub wait_timeout:     Duration,
    /// Limit for the TCP connect and for each handshake step.
    pub start_timeout:    Duration,
    pub ping_interval:    Duration,
    /// Connection attempts made by [`Session::start`] before giving up.
    pub max_retries:      u32,
    /// First delay between reconnect attempts; doubles up to 30 s.
    pub reconnect_backoff: Duration,
    /// Updates buffered before new ones are dropped.
    pub updates_capacity: usize,
    pub retry_policy:     Arc<dyn RetryPolicy>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_id:            0,
            device_model:      "tgcore".into(),
            system_version:    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            app_version:       env!("CARGO_PKG_VERSION").into(),
            system_lang_code:  "en".into(),
            lang_pack:         String::new(),
            lang_code:         "en".into(),
            test_mode:         false,
            ipv6:              false,
            is_media:          false,
            proxy:             None,
            connector:         None,
            wait_timeout:      Duration::from_secs(15),
            start_timeout:     Duration::from_secs(10),
            ping_interval:     Duration::from_secs(5),
            max_retries:       5,
            reconnect_backoff: Duration::from_secs(1),
            updates_capacity:  1000,
            retry_policy:      Arc::new(AutoSleep::default()),
        }
    }
}

// ─── Updates ──────────────────────────────────────────────────────────────────

/// A message the server pushed on its own, still TL-encoded.
#[derive(Clone, Debug, PartialEq)]
pub struct RawUpdate {
    pub body: Vec<u8>,
}

impl RawUpdate {
    pub fn constructor_id(&self) -> Option<u32> {
        self.body.get(..4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// TL name of the constructor, when it is part of the vocabulary.
    pub fn name(&self) -> Option<&'static str> {
        self.constructor_id().and_then(tgcore_tl::name_for_id)
    }
}

/// Asynchronous stream of [`RawUpdate`]s.
pub struct UpdateStream {
    pub(crate) rx: mpsc::Receiver<RawUpdate>,
}

impl UpdateStream {
    /// Wait for the next update. Returns `None` once the session is gone.
    pub async fn next(&mut self) -> Option<RawUpdate> {
        self.rx.recv().await
    }
}

// ─── Client ───────────────────────────────────────────────────────────────────

struct ClientInner {
    session: Session,
    storage: Arc<dyn Storage>,
}

/// A session bound to its persisted auth key and peer cache. Cheap to
/// clone.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Load the stored session and connect to its home DC.
    ///
    /// Fails with [`StorageError::NotAuthorized`] when the storage holds no
    /// auth key.
    pub async fn start(config: SessionConfig, storage: Arc<dyn Storage>) -> Result<Self, InvocationError> {
        let mut data = storage.load()?;
        let auth_key = data.auth_key.clone().ok_or(StorageError::NotAuthorized)?;
        if data.test_mode != config.test_mode {
            tracing::warn!(
                "[tgcore] {} session is for {} DCs; ignoring test_mode = {}",
                storage.name(),
                if data.test_mode { "test" } else { "production" },
                config.test_mode
            );
        }
        tracing::info!("[tgcore] loading {} session (DC{})", storage.name(), data.dc_id);

        let api_id = config.api_id;
        let session = Session::start(
            SessionConfig { test_mode: data.test_mode, ..config },
            data.dc_id,
            auth_key,
        )
        .await?;

        data.api_id = Some(api_id);
        data.date = now();
        storage.save(&data)?;
        Ok(Self { inner: Arc::new(ClientInner { session, storage }) })
    }

    pub fn session(&self) -> &Session { &self.inner.session }

    pub fn storage(&self) -> &Arc<dyn Storage> { &self.inner.storage }

    pub async fn invoke<R: RemoteCall>(&self, request: &R) -> Result<R::Return, InvocationError> {
        self.inner.session.invoke(request).await
    }

    pub async fn invoke_with<R: RemoteCall>(
        &self,
        request: &R,
        options: &InvokeOptions,
    ) -> Result<R::Return, InvocationError> {
        self.inner.session.invoke_with(request, options).await
    }

    /// See [`Session::updates`].
    pub fn updates(&self) -> Option<UpdateStream> {
        self.inner.session.updates()
    }

    /// Input peer for a Bot-API style id.
    ///
    /// Basic groups need no access hash and resolve without a cache entry.
    pub fn resolve_peer(&self, peer_id: i64) -> Result<enums::InputPeer, InvocationError> {
        match self.inner.storage.get_peer_by_id(peer_id) {
            Ok(peer) => Ok(peer),
            Err(StorageError::PeerNotFound(key)) => match peer_id::get_peer_type(peer_id) {
                Ok(peer_id::PeerKind::Chat) => Ok(peer_id::get_input_peer(peer_id, 0)
                    .map_err(|e| StorageError::PeerNotFound(e.to_string()))?),
                _ => Err(StorageError::PeerNotFound(key).into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    pub fn resolve_username(&self, username: &str) -> Result<enums::InputPeer, InvocationError> {
        Ok(self.inner.storage.get_peer_by_username(username)?)
    }

    pub fn resolve_phone_number(&self, phone_number: &str) -> Result<enums::InputPeer, InvocationError> {
        Ok(self.inner.storage.get_peer_by_phone_number(phone_number)?)
    }

    pub fn export_session_string(&self) -> Result<String, StorageError> {
        self.inner.storage.export_session_string()
    }

    /// Stop the session and record the time in storage.
    pub async fn stop(&self) -> Result<(), StorageError> {
        self.inner.session.stop().await;
        let mut data = self.inner.storage.load()?;
        data.date = now();
        self.inner.storage.save(&data)
    }
}
