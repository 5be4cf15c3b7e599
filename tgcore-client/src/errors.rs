//! Error types for tgcore-client.

use std::{fmt, io};

use tgcore_mtproto::bad_msg;
use tgcore_mtproto::transport::FrameLengthError;

// ─── RpcError ─────────────────────────────────────────────────────────────────

/// Broad class of an RPC error, taken from its HTTP-like code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcErrorKind {
    /// 303: the request must be repeated on another DC.
    SeeOther,
    /// 400
    BadRequest,
    /// 401: the auth key is not authorized (anymore).
    Unauthorized,
    /// 403
    Forbidden,
    /// 406: the request was valid but cannot be served right now.
    NotAcceptable,
    /// 420: flood limits.
    Flood,
    /// 500 and above.
    InternalServerError,
    /// Any other code (Telegram also sends some negative ones).
    Other(i32),
}

impl RpcErrorKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            303 => Self::SeeOther,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            406 => Self::NotAcceptable,
            420 => Self::Flood,
            c if c >= 500 || c <= -500 => Self::InternalServerError,
            c => Self::Other(c),
        }
    }
}

/// Known errors, keyed by `(code, pattern)`. `X` stands for the integer
/// captured into [`RpcError::value`].
static KNOWN_ERRORS: &[(i32, &str, &str)] = &[
    (303, "FILE_MIGRATE_X", "The file is stored on DC X"),
    (303, "NETWORK_MIGRATE_X", "The source IP is associated with DC X"),
    (303, "PHONE_MIGRATE_X", "The phone number is associated with DC X"),
    (303, "STATS_MIGRATE_X", "The statistics are stored on DC X"),
    (303, "USER_MIGRATE_X", "The user is associated with DC X"),
    (400, "API_ID_INVALID", "The api_id/api_hash combination is invalid"),
    (400, "CHANNEL_INVALID", "The channel parameter is invalid"),
    (400, "CONNECTION_LAYER_INVALID", "The connection layer is invalid"),
    (400, "FILE_PART_X_MISSING", "Part X of the file is missing from storage"),
    (400, "FILE_REFERENCE_EXPIRED", "The file reference has expired"),
    (400, "MESSAGE_ID_INVALID", "The message id is invalid"),
    (400, "MSG_ID_INVALID", "The message id used in the peer was invalid"),
    (400, "PEER_ID_INVALID", "The peer id being used is invalid or not known yet"),
    (400, "USERNAME_INVALID", "The username is invalid"),
    (400, "USERNAME_NOT_OCCUPIED", "The username is not occupied by anyone"),
    (401, "AUTH_KEY_INVALID", "The key is invalid"),
    (401, "AUTH_KEY_UNREGISTERED", "The key is not registered in the system"),
    (401, "SESSION_EXPIRED", "The authorization has expired"),
    (401, "SESSION_PASSWORD_NEEDED", "Two-step verification is enabled and a password is required"),
    (401, "SESSION_REVOKED", "The authorization has been invalidated"),
    (401, "USER_DEACTIVATED", "The user has been deleted or deactivated"),
    (403, "CHAT_ADMIN_REQUIRED", "The method requires chat admin privileges"),
    (403, "CHAT_WRITE_FORBIDDEN", "You don't have rights to send messages in this chat"),
    (406, "AUTH_KEY_DUPLICATED", "The same auth key was used by two connections at once"),
    (406, "FILEREF_UPGRADE_NEEDED", "The file reference must be refreshed"),
    (420, "FLOOD_PREMIUM_WAIT_X", "A wait of X seconds is required"),
    (420, "FLOOD_WAIT_X", "A wait of X seconds is required"),
    (420, "SLOWMODE_WAIT_X", "A wait of X seconds is required before sending another message in this chat"),
    (420, "TAKEOUT_INIT_DELAY_X", "A wait of X seconds is required before initializing takeout"),
    (500, "HISTORY_GET_FAILED", "The chat history couldn't be retrieved due to an internal error"),
    (500, "INTERDC_X_CALL_ERROR", "An error occurred while communicating with DC X"),
    (500, "RPC_CALL_FAIL", "The server failed to process the call"),
    (500, "RPC_MCGET_FAIL", "The server failed to fetch a value internally"),
    (500, "WORKER_BUSY_TOO_LONG_RETRY", "Server workers are too busy right now"),
];

/// Names whose value is a number of seconds to wait.
const WAIT_ERRORS: [&str; 3] = ["FLOOD_WAIT", "FLOOD_PREMIUM_WAIT", "SLOWMODE_WAIT"];

/// An error returned by Telegram's servers in response to an RPC call.
///
/// The first all-digit segment is removed from the name and placed in
/// [`RpcError::value`].
///
/// # Example
/// `FLOOD_WAIT_30` → `RpcError { code: 420, name: "FLOOD_WAIT", value: Some(30) }`
/// `FILE_PART_3_MISSING` → `RpcError { code: 400, name: "FILE_PART_MISSING", value: Some(3) }`
#[derive(Clone, Debug, PartialEq)]
pub struct RpcError {
    /// HTTP-like status code.
    pub code: i32,
    /// Error name in SCREAMING_SNAKE_CASE with the numeric segment removed.
    pub name: String,
    /// Numeric segment extracted from the name, if any.
    pub value: Option<u32>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC {}: {}", self.code, self.name)?;
        if let Some(v) = self.value {
            write!(f, " (value: {v})")?;
        }
        if let Some(d) = self.description() {
            write!(f, " - {d}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

impl RpcError {
    /// Parse a raw Telegram error message like `"FLOOD_WAIT_30"`.
    pub fn from_telegram(code: i32, message: &str) -> Self {
        let parts: Vec<&str> = message.split('_').collect();
        let numeric = parts
            .iter()
            .position(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));

        if let Some(idx) = numeric {
            if let Ok(v) = parts[idx].parse::<u32>() {
                let name = parts
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != idx)
                    .map(|(_, p)| *p)
                    .collect::<Vec<_>>()
                    .join("_");
                return Self { code, name, value: Some(v) };
            }
        }
        Self { code, name: message.to_string(), value: None }
    }

    pub fn kind(&self) -> RpcErrorKind {
        RpcErrorKind::from_code(self.code)
    }

    /// Match on the error name, with optional wildcard prefix/suffix `'*'`.
    ///
    /// # Examples
    /// - `err.is("FLOOD_WAIT")`: exact match
    /// - `err.is("PHONE_CODE_*")`: starts-with match
    /// - `err.is("*_INVALID")`: ends-with match
    pub fn is(&self, pattern: &str) -> bool {
        if let Some(prefix) = pattern.strip_suffix('*') {
            self.name.starts_with(prefix)
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            self.name.ends_with(suffix)
        } else {
            self.name == pattern
        }
    }

    /// Seconds to wait for `FLOOD_WAIT_X`, `FLOOD_PREMIUM_WAIT_X` and
    /// `SLOWMODE_WAIT_X`.
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        if self.code == 420 && WAIT_ERRORS.contains(&self.name.as_str()) {
            self.value.map(u64::from)
        } else {
            None
        }
    }

    /// Human-readable description for errors in the known table.
    pub fn description(&self) -> Option<&'static str> {
        KNOWN_ERRORS
            .iter()
            .find(|(code, pattern, _)| *code == self.code && self.matches_pattern(pattern))
            .map(|(_, _, d)| *d)
    }

    fn matches_pattern(&self, pattern: &str) -> bool {
        let has_x = pattern.split('_').any(|p| p == "X");
        if has_x != self.value.is_some() {
            return false;
        }
        let stripped = pattern.split('_').filter(|p| *p != "X").collect::<Vec<_>>().join("_");
        stripped == self.name
    }

    /// 500-class errors the server itself asks to be retried.
    pub fn is_server_side(&self) -> bool {
        self.kind() == RpcErrorKind::InternalServerError
    }
}

// ─── TransportError ───────────────────────────────────────────────────────────

/// Failure of the byte channel to the DC. Always answered with a reconnect.
#[derive(Debug)]
pub enum TransportError {
    Io(io::Error),
    /// The peer closed the stream.
    Closed,
    /// A frame length prefix no valid packet can have.
    InvalidFrame(FrameLengthError),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e)           => write!(f, "I/O error: {e}"),
            Self::Closed          => write!(f, "connection closed by peer"),
            Self::InvalidFrame(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e)           => Some(e),
            Self::InvalidFrame(e) => Some(e),
            Self::Closed          => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::Closed
        } else {
            Self::Io(e)
        }
    }
}

impl From<FrameLengthError> for TransportError {
    fn from(e: FrameLengthError) -> Self { Self::InvalidFrame(e) }
}

// ─── StorageError ─────────────────────────────────────────────────────────────

/// Errors from the session/peer store.
#[derive(Debug)]
pub enum StorageError {
    Sqlite(rusqlite::Error),
    Io(io::Error),
    /// The legacy JSON session file could not be parsed.
    Json(serde_json::Error),
    /// The legacy JSON session file parsed but holds an unusable value.
    InvalidLegacySession(String),
    /// No peer matches the lookup key.
    PeerNotFound(String),
    /// The cached username is older than the allowed age; resolve it again.
    UsernameExpired(String),
    /// An exported session string that has the wrong length or encoding.
    InvalidSessionString(String),
    /// The store holds no auth key yet.
    NotAuthorized,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e)               => write!(f, "sqlite error: {e}"),
            Self::Io(e)                   => write!(f, "I/O error: {e}"),
            Self::Json(e)                 => write!(f, "legacy session file: {e}"),
            Self::InvalidLegacySession(s) => write!(f, "legacy session file: {s}"),
            Self::PeerNotFound(key)       => write!(f, "peer not found: {key}"),
            Self::UsernameExpired(name)   => write!(f, "username expired: {name}"),
            Self::InvalidSessionString(s) => write!(f, "invalid session string: {s}"),
            Self::NotAuthorized           => write!(f, "the session has no auth key"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self { Self::Sqlite(e) }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self { Self::Json(e) }
}

// ─── InvocationError ──────────────────────────────────────────────────────────

/// The error type returned from any call that talks to Telegram.
#[derive(Debug)]
pub enum InvocationError {
    /// Telegram rejected the request.
    Rpc(RpcError),
    /// Network / I/O failure.
    Transport(TransportError),
    /// No answer within the per-call timeout.
    Timeout,
    /// A received envelope failed its integrity checks.
    SecurityCheckMismatch(String),
    /// Another connection is using the same auth key. Terminal.
    AuthKeyDuplicated,
    /// Out-of-band status code from the server (`-404`: unknown auth key). Terminal.
    ServerCode(i32),
    /// `bad_msg_notification` that cannot be fixed by resending.
    BadMsgNotification(i32),
    /// Response deserialization failed.
    Deserialize(String),
    /// Session or peer storage failed.
    Storage(StorageError),
    /// The session was shut down before the request completed.
    Dropped,
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(e)                   => write!(f, "{e}"),
            Self::Transport(e)             => write!(f, "transport error: {e}"),
            Self::Timeout                  => write!(f, "request timed out"),
            Self::SecurityCheckMismatch(s) => write!(f, "security check mismatch: {s}"),
            Self::AuthKeyDuplicated        => write!(f, "auth key duplicated"),
            Self::ServerCode(c)            => write!(f, "server sent transport code {c}"),
            Self::BadMsgNotification(c)    => write!(f, "bad msg notification: {}", bad_msg::describe(*c)),
            Self::Deserialize(s)           => write!(f, "deserialize error: {s}"),
            Self::Storage(e)               => write!(f, "{e}"),
            Self::Dropped                  => write!(f, "request dropped"),
        }
    }
}

impl std::error::Error for InvocationError {}

impl From<TransportError> for InvocationError {
    fn from(e: TransportError) -> Self { Self::Transport(e) }
}

impl From<io::Error> for InvocationError {
    fn from(e: io::Error) -> Self { Self::Transport(e.into()) }
}

impl From<StorageError> for InvocationError {
    fn from(e: StorageError) -> Self { Self::Storage(e) }
}

impl From<tgcore_tl::deserialize::Error> for InvocationError {
    fn from(e: tgcore_tl::deserialize::Error) -> Self { Self::Deserialize(e.to_string()) }
}

impl InvocationError {
    /// Returns `true` if this is the named RPC error (supports `'*'` wildcards).
    pub fn is(&self, pattern: &str) -> bool {
        match self {
            Self::Rpc(e) => e.is(pattern),
            _            => false,
        }
    }

    /// If this is a flood wait, returns how many seconds to wait.
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        match self {
            Self::Rpc(e) => e.flood_wait_seconds(),
            _            => None,
        }
    }

    /// Transport failures, timeouts and 500-class RPC errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Rpc(e)                       => e.is_server_side(),
            _                                  => false,
        }
    }

    /// Errors after which the session cannot continue on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AuthKeyDuplicated | Self::ServerCode(_) | Self::Dropped)
    }
}

// ─── StopReason ───────────────────────────────────────────────────────────────

/// Why a session entered the `Stopped` state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// [`crate::Session::stop`] was called.
    Shutdown,
    AuthKeyDuplicated,
    ServerCode(i32),
}

impl StopReason {
    pub fn to_error(self) -> InvocationError {
        match self {
            Self::Shutdown          => InvocationError::Dropped,
            Self::AuthKeyDuplicated => InvocationError::AuthKeyDuplicated,
            Self::ServerCode(c)     => InvocationError::ServerCode(c),
        }
    }
}
