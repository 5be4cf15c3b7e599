//! Session and peer persistence.
//!
//! The [`Storage`] trait abstracts over where the auth key and the peer cache
//! live. Two backends are provided:
//! * [`FileStorage`]: an SQLite database (`<name>.session`).
//! * [`MemoryStorage`]: ephemeral, importable from / exportable to a
//!   session string.

mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::FileStorage;

use std::time::Duration;

use base64::Engine as _;
use tgcore_crypto::AuthKey;
use tgcore_tl::{enums, types};

use crate::errors::StorageError;
use crate::file_id::URL_SAFE;
use crate::peer_id;

/// Cached usernames older than this must be resolved again.
pub const USERNAME_TTL: Duration = Duration::from_secs(8 * 60 * 60);

// ─── Records ──────────────────────────────────────────────────────────────────

/// The single session row.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionData {
    pub dc_id:     i32,
    pub api_id:    Option<i32>,
    pub test_mode: bool,
    pub auth_key:  Option<AuthKey>,
    /// Unix time of the last save.
    pub date:      i64,
    pub user_id:   Option<i64>,
    pub is_bot:    Option<bool>,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            dc_id:     2,
            api_id:    None,
            test_mode: false,
            auth_key:  None,
            date:      0,
            user_id:   None,
            is_bot:    None,
        }
    }
}

/// Stored kind of a peer; the discriminant is the value in the `type` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerType {
    User = 0,
    Bot = 1,
    Group = 2,
    Channel = 3,
    Supergroup = 4,
}

impl PeerType {
    pub fn from_i64(v: i64) -> Option<Self> {
        Some(match v {
            0 => Self::User,
            1 => Self::Bot,
            2 => Self::Group,
            3 => Self::Channel,
            4 => Self::Supergroup,
            _ => return None,
        })
    }
}

/// One entry of the peer cache. `id` uses the signed convention of
/// [`crate::peer_id`].
#[derive(Clone, Debug, PartialEq)]
pub struct PeerRecord {
    pub id:           i64,
    pub access_hash:  i64,
    pub peer_type:    PeerType,
    pub username:     Option<String>,
    pub phone_number: Option<String>,
}

/// Input form of a stored peer.
pub fn get_input_peer(id: i64, access_hash: i64, peer_type: PeerType) -> enums::InputPeer {
    match peer_type {
        PeerType::User | PeerType::Bot => types::InputPeerUser { user_id: id, access_hash }.into(),
        PeerType::Group => types::InputPeerChat { chat_id: -id }.into(),
        PeerType::Channel | PeerType::Supergroup => {
            types::InputPeerChannel { channel_id: peer_id::get_channel_id(id), access_hash }.into()
        }
    }
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub(crate) fn normalize_username(username: &str) -> String {
    username.trim_start_matches('@').to_lowercase()
}

pub(crate) fn username_expired(last_update_on: i64) -> bool {
    (now() - last_update_on).unsigned_abs() > USERNAME_TTL.as_secs()
}

// ─── Trait ────────────────────────────────────────────────────────────────────

/// An abstraction over where and how session data is persisted.
pub trait Storage: Send + Sync {
    /// The session row. A fresh store returns [`SessionData::default`].
    fn load(&self) -> Result<SessionData, StorageError>;

    fn save(&self, data: &SessionData) -> Result<(), StorageError>;

    /// Insert or replace peers; their `last_update_on` becomes now.
    fn update_peers(&self, peers: &[PeerRecord]) -> Result<(), StorageError>;

    fn get_peer_by_id(&self, peer_id: i64) -> Result<enums::InputPeer, StorageError>;

    /// Fails with [`StorageError::UsernameExpired`] when the cached entry is
    /// older than [`USERNAME_TTL`].
    fn get_peer_by_username(&self, username: &str) -> Result<enums::InputPeer, StorageError>;

    fn get_peer_by_phone_number(&self, phone_number: &str) -> Result<enums::InputPeer, StorageError>;

    /// Remove the stored session (e.g. on sign-out).
    fn delete(&self) -> Result<(), StorageError>;

    /// Human-readable name of this backend (for log messages).
    fn name(&self) -> &str;

    fn export_session_string(&self) -> Result<String, StorageError> {
        encode_session_string(&self.load()?)
    }
}

// ─── Session strings ──────────────────────────────────────────────────────────

/// `dc_id(1) test_mode(1) auth_key(256) user_id(4) is_bot(1)`
const LEGACY_LEN: usize = 263;
/// `dc_id(1) test_mode(1) auth_key(256) user_id(8) is_bot(1)`
const NO_API_ID_LEN: usize = 267;
/// `dc_id(1) api_id(4) test_mode(1) auth_key(256) user_id(8) is_bot(1)`
const CURRENT_LEN: usize = 271;

/// Pack a session into URL-safe base64 (big-endian fields, no padding).
pub fn encode_session_string(data: &SessionData) -> Result<String, StorageError> {
    let key = data.auth_key.as_ref().ok_or(StorageError::NotAuthorized)?;
    let dc_id = u8::try_from(data.dc_id)
        .map_err(|_| StorageError::InvalidSessionString(format!("dc_id {} does not fit", data.dc_id)))?;

    let mut out = Vec::with_capacity(CURRENT_LEN);
    out.push(dc_id);
    out.extend(data.api_id.unwrap_or(0).to_be_bytes());
    out.push(u8::from(data.test_mode));
    out.extend(key.to_bytes());
    out.extend(data.user_id.unwrap_or(0).to_be_bytes());
    out.push(u8::from(data.is_bot.unwrap_or(false)));
    Ok(URL_SAFE.encode(out))
}

/// Unpack any of the three known layouts.
pub fn decode_session_string(s: &str) -> Result<SessionData, StorageError> {
    let raw = URL_SAFE
        .decode(s.trim())
        .map_err(|e| StorageError::InvalidSessionString(e.to_string()))?;

    let (api_id, rest) = match raw.len() {
        CURRENT_LEN => {
            let api_id = i32::from_be_bytes([raw[1], raw[2], raw[3], raw[4]]);
            (Some(api_id), &raw[5..])
        }
        LEGACY_LEN | NO_API_ID_LEN => (None, &raw[1..]),
        n => return Err(StorageError::InvalidSessionString(format!("unexpected length {n}"))),
    };

    let test_mode = rest[0] != 0;
    let auth_key = AuthKey::from_slice(&rest[1..257]);
    let user_id = match &rest[257..rest.len() - 1] {
        [a, b, c, d] => i64::from(u32::from_be_bytes([*a, *b, *c, *d])),
        tail => {
            let mut b = [0u8; 8];
            b.copy_from_slice(tail);
            i64::from_be_bytes(b)
        }
    };
    let is_bot = rest[rest.len() - 1] != 0;

    Ok(SessionData {
        dc_id: i32::from(raw[0]),
        api_id,
        test_mode,
        auth_key,
        date: 0,
        user_id: Some(user_id),
        is_bot: Some(is_bot),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionData {
        SessionData {
            dc_id: 4,
            api_id: Some(12345),
            test_mode: true,
            auth_key: Some(AuthKey::from_bytes([0xab; 256])),
            date: 0,
            user_id: Some(5_000_000_001),
            is_bot: Some(true),
        }
    }

    #[test]
    fn session_string_lengths() {
        let s = encode_session_string(&session()).unwrap();
        assert_eq!(s.len(), 362);
        assert!(!s.contains('='));
        assert_eq!(decode_session_string(&s).unwrap(), session());
    }

    #[test]
    fn legacy_layouts_are_accepted() {
        let mut legacy = vec![2u8, 0];
        legacy.extend([0x11; 256]);
        legacy.extend(777u32.to_be_bytes());
        legacy.push(0);
        let s = URL_SAFE.encode(&legacy);
        assert_eq!(s.len(), 351);

        let data = decode_session_string(&s).unwrap();
        assert_eq!(data.dc_id, 2);
        assert_eq!(data.api_id, None);
        assert_eq!(data.user_id, Some(777));
        assert_eq!(data.is_bot, Some(false));

        let mut wide = vec![1u8, 1];
        wide.extend([0x22; 256]);
        wide.extend(9_000_000_000u64.to_be_bytes());
        wide.push(1);
        let s = URL_SAFE.encode(&wide);
        assert_eq!(s.len(), 356);
        let data = decode_session_string(&s).unwrap();
        assert!(data.test_mode);
        assert_eq!(data.user_id, Some(9_000_000_000));

        let upgraded = decode_session_string(&encode_session_string(&data).unwrap()).unwrap();
        assert_eq!(upgraded.api_id, Some(0));
        assert_eq!(upgraded.auth_key, data.auth_key);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            decode_session_string("AAAA"),
            Err(StorageError::InvalidSessionString(_))
        ));
        let no_key = SessionData::default();
        assert!(matches!(encode_session_string(&no_key), Err(StorageError::NotAuthorized)));
    }

    #[test]
    fn input_peers_follow_the_stored_type() {
        assert_eq!(
            get_input_peer(-1_000_000_000_777, 5, PeerType::Supergroup),
            enums::InputPeer::Channel(types::InputPeerChannel { channel_id: 777, access_hash: 5 })
        );
        assert_eq!(
            get_input_peer(-12, 0, PeerType::Group),
            enums::InputPeer::Chat(types::InputPeerChat { chat_id: 12 })
        );
        assert_eq!(
            get_input_peer(12, 3, PeerType::Bot),
            enums::InputPeer::User(types::InputPeerUser { user_id: 12, access_hash: 3 })
        );
    }
}
