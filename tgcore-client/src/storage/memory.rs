use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tgcore_tl::enums;

use super::{
    PeerRecord, SessionData, Storage, decode_session_string, get_input_peer, normalize_username,
    now, username_expired,
};
use crate::errors::StorageError;

struct StoredPeer {
    record:         PeerRecord,
    last_update_on: i64,
}

#[derive(Default)]
struct Inner {
    session: SessionData,
    peers:   HashMap<i64, StoredPeer>,
}

/// An ephemeral store that writes nothing to disk.
///
/// Useful for tests, or for bots started from an exported session string.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }

    /// Start from a string produced by [`Storage::export_session_string`].
    pub fn from_session_string(s: &str) -> Result<Self, StorageError> {
        let session = decode_session_string(s)?;
        Ok(Self { inner: Mutex::new(Inner { session, peers: HashMap::new() }) })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find(
        &self,
        key: &str,
        pred: impl Fn(&PeerRecord) -> bool,
    ) -> Result<(PeerRecord, i64), StorageError> {
        self.lock()
            .peers
            .values()
            .filter(|p| pred(&p.record))
            .max_by_key(|p| p.last_update_on)
            .map(|p| (p.record.clone(), p.last_update_on))
            .ok_or_else(|| StorageError::PeerNotFound(key.to_string()))
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<SessionData, StorageError> {
        Ok(self.lock().session.clone())
    }

    fn save(&self, data: &SessionData) -> Result<(), StorageError> {
        self.lock().session = data.clone();
        Ok(())
    }

    fn update_peers(&self, peers: &[PeerRecord]) -> Result<(), StorageError> {
        let at = now();
        let mut inner = self.lock();
        for p in peers {
            let mut record = p.clone();
            record.username = record.username.as_deref().map(normalize_username);
            inner.peers.insert(p.id, StoredPeer { record, last_update_on: at });
        }
        Ok(())
    }

    fn get_peer_by_id(&self, peer_id: i64) -> Result<enums::InputPeer, StorageError> {
        let inner = self.lock();
        let p = inner
            .peers
            .get(&peer_id)
            .ok_or_else(|| StorageError::PeerNotFound(peer_id.to_string()))?;
        Ok(get_input_peer(p.record.id, p.record.access_hash, p.record.peer_type))
    }

    fn get_peer_by_username(&self, username: &str) -> Result<enums::InputPeer, StorageError> {
        let username = normalize_username(username);
        let (p, last_update_on) =
            self.find(&username, |p| p.username.as_deref() == Some(username.as_str()))?;
        if username_expired(last_update_on) {
            return Err(StorageError::UsernameExpired(username));
        }
        Ok(get_input_peer(p.id, p.access_hash, p.peer_type))
    }

    fn get_peer_by_phone_number(&self, phone_number: &str) -> Result<enums::InputPeer, StorageError> {
        let (p, _) = self.find(phone_number, |p| p.phone_number.as_deref() == Some(phone_number))?;
        Ok(get_input_peer(p.id, p.access_hash, p.peer_type))
    }

    fn delete(&self) -> Result<(), StorageError> {
        *self.lock() = Inner::default();
        Ok(())
    }

    fn name(&self) -> &str { "memory" }
}
