use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rusqlite::{Connection, OptionalExtension, ToSql, params};
use serde::Deserialize;
use tgcore_crypto::AuthKey;
use tgcore_tl::enums;

use super::{
    PeerRecord, PeerType, SessionData, Storage, get_input_peer, normalize_username, now,
    username_expired,
};
use crate::errors::StorageError;
use crate::peer_id::{self, PeerKind};

/// Current schema version.
pub const SCHEMA_VERSION: i64 = 3;

const SCHEMA: &str = "
CREATE TABLE sessions
(
    dc_id     INTEGER PRIMARY KEY,
    api_id    INTEGER,
    test_mode INTEGER,
    auth_key  BLOB,
    date      INTEGER NOT NULL,
    user_id   INTEGER,
    is_bot    INTEGER
);

CREATE TABLE peers
(
    id             INTEGER PRIMARY KEY,
    access_hash    INTEGER,
    type           INTEGER NOT NULL,
    username       TEXT,
    phone_number   TEXT,
    last_update_on INTEGER NOT NULL DEFAULT (CAST(STRFTIME('%s', 'now') AS INTEGER))
);

CREATE TABLE version
(
    number INTEGER PRIMARY KEY
);

CREATE INDEX idx_peers_id ON peers (id);
CREATE INDEX idx_peers_username ON peers (username);
CREATE INDEX idx_peers_phone_number ON peers (phone_number);

CREATE TRIGGER trg_peers_last_update_on
    AFTER UPDATE
    ON peers
BEGIN
    UPDATE peers
    SET last_update_on = CAST(STRFTIME('%s', 'now') AS INTEGER)
    WHERE id = NEW.id;
END;
";

/// Pre-database session files were plain JSON.
#[derive(Deserialize)]
struct LegacySession {
    dc_id:     i32,
    #[serde(default)]
    test_mode: bool,
    auth_key:  LegacyKey,
    #[serde(default)]
    user_id:   Option<i64>,
    #[serde(default)]
    date:      i64,
    #[serde(default)]
    is_bot:    Option<bool>,
    /// peer id → access hash
    #[serde(default)]
    peers_by_id:       HashMap<String, Option<i64>>,
    /// username → peer id
    #[serde(default)]
    peers_by_username: HashMap<String, i64>,
    /// phone number → peer id
    #[serde(default)]
    peers_by_phone:    HashMap<String, i64>,
}

/// Base64 auth key, either whole or split into a list of chunks.
#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyKey {
    Whole(String),
    Chunks(Vec<String>),
}

impl LegacyKey {
    fn decode(&self) -> Result<AuthKey, StorageError> {
        let text = match self {
            Self::Whole(s) => s.clone(),
            Self::Chunks(parts) => parts.concat(),
        };
        let raw = STANDARD
            .decode(text.trim())
            .map_err(|e| StorageError::InvalidLegacySession(format!("auth_key is not base64: {e}")))?;
        AuthKey::from_slice(&raw).ok_or_else(|| {
            StorageError::InvalidLegacySession(format!("auth_key is {} bytes, expected 256", raw.len()))
        })
    }
}

impl LegacySession {
    fn into_parts(self) -> Result<(SessionData, Vec<PeerRecord>), StorageError> {
        let data = SessionData {
            dc_id:     self.dc_id,
            api_id:    None,
            test_mode: self.test_mode,
            auth_key:  Some(self.auth_key.decode()?),
            date:      self.date,
            user_id:   self.user_id,
            is_bot:    self.is_bot,
        };

        let mut peers: Vec<PeerRecord> = Vec::with_capacity(self.peers_by_id.len());
        for (key, access_hash) in &self.peers_by_id {
            let Ok(id) = key.parse::<i64>() else {
                tracing::warn!("[tgcore] skipping legacy peer with id {key:?}");
                continue;
            };
            let peer_type = match peer_id::get_peer_type(id) {
                Ok(PeerKind::User) => PeerType::User,
                Ok(PeerKind::Chat) => PeerType::Group,
                Ok(PeerKind::Channel) => PeerType::Channel,
                Err(e) => {
                    tracing::warn!("[tgcore] skipping legacy peer: {e}");
                    continue;
                }
            };
            let username = self
                .peers_by_username
                .iter()
                .find_map(|(name, &pid)| (pid == id).then(|| name.clone()));
            let phone_number = self
                .peers_by_phone
                .iter()
                .find_map(|(phone, &pid)| (pid == id).then(|| phone.clone()));
            peers.push(PeerRecord {
                id,
                access_hash: access_hash.unwrap_or(0),
                peer_type,
                username,
                phone_number,
            });
        }
        Ok((data, peers))
    }
}

/// SQLite-backed store, one file per session.
///
/// A legacy JSON session found at the same path is converted on open; the
/// original is kept next to it with an `.OLD` suffix.
pub struct FileStorage {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl FileStorage {
    /// `<workdir>/<name>.session`
    pub fn in_workdir(name: &str, workdir: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open(workdir.as_ref().join(format!("{name}.session")))
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(legacy) = read_legacy(&path)? {
            convert_legacy(&path, legacy)?;
        }

        let fresh = !path.exists();
        let conn = Connection::open(&path)?;
        if fresh {
            create(&conn)?;
        } else {
            migrate(&conn)?;
        }
        Ok(Self { path, conn: Mutex::new(Some(conn)) })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "storage was deleted",
            ))),
        }
    }

    fn find_peer(
        &self,
        sql: &str,
        key: impl ToSql + fmt::Display,
    ) -> Result<(i64, i64, PeerType, i64), StorageError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(sql, [&key], |r| {
                    Ok((r.get::<_, i64>(0)?, r.get::<_, Option<i64>>(1)?, r.get::<_, i64>(2)?, r.get::<_, i64>(3)?))
                })
                .optional()?;
            let (id, access_hash, kind, last_update_on) =
                row.ok_or_else(|| StorageError::PeerNotFound(key.to_string()))?;
            let peer_type = PeerType::from_i64(kind)
                .ok_or_else(|| StorageError::PeerNotFound(format!("{key} (bad type {kind})")))?;
            Ok((id, access_hash.unwrap_or(0), peer_type, last_update_on))
        })
    }
}

fn read_legacy(path: &Path) -> Result<Option<LegacySession>, StorageError> {
    let Ok(mut file) = fs::File::open(path) else { return Ok(None) };
    let mut head = [0u8; 1];
    if file.read(&mut head)? == 0 || head[0] != b'{' {
        return Ok(None);
    }
    let mut bytes = head.to_vec();
    file.read_to_end(&mut bytes)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(suffix);
    PathBuf::from(p)
}

/// Replace the JSON file at `path` with an equivalent database.
///
/// The database is built next to it first; the JSON is moved to `.OLD` only
/// once that succeeded, so a failed conversion leaves `path` untouched.
fn convert_legacy(path: &Path, legacy: LegacySession) -> Result<(), StorageError> {
    let (data, peers) = legacy.into_parts()?;

    let staging = with_suffix(path, ".migrating");
    if staging.exists() {
        fs::remove_file(&staging)?;
    }
    let built = Connection::open(&staging).map_err(StorageError::from).and_then(|conn| {
        create(&conn)?;
        let storage = FileStorage { path: staging.clone(), conn: Mutex::new(Some(conn)) };
        storage.save(&data)?;
        storage.update_peers(&peers)
    });
    if let Err(e) = built {
        if let Err(cleanup) = fs::remove_file(&staging) {
            tracing::debug!("[tgcore] could not remove {}: {cleanup}", staging.display());
        }
        return Err(e);
    }

    let old = with_suffix(path, ".OLD");
    fs::rename(path, &old)?;
    if let Err(e) = fs::rename(&staging, path) {
        fs::rename(&old, path)?;
        return Err(e.into());
    }
    tracing::warn!(
        "[tgcore] legacy JSON session migrated ({} peers), original kept at {}",
        peers.len(),
        old.display()
    );
    Ok(())
}

fn create(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(SCHEMA)?;
    conn.execute("INSERT INTO version VALUES (?1)", [SCHEMA_VERSION])?;
    conn.execute(
        "INSERT INTO sessions VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![2, None::<i32>, None::<bool>, None::<Vec<u8>>, 0, None::<i64>, None::<bool>],
    )?;
    tracing::debug!("[tgcore] created session database (schema {SCHEMA_VERSION})");
    Ok(())
}

/// Bring an existing database up to [`SCHEMA_VERSION`].
fn migrate(conn: &Connection) -> Result<(), StorageError> {
    let mut version: i64 = conn.query_row("SELECT number FROM version", [], |r| r.get(0))?;
    let from = version;

    if version == 1 {
        conn.execute("DELETE FROM peers", [])?;
        version = 2;
    }
    if version == 2 {
        conn.execute("ALTER TABLE sessions ADD api_id INTEGER", [])?;
        version = 3;
    }
    if version != from {
        conn.execute("UPDATE version SET number = ?1", [version])?;
        tracing::info!("[tgcore] session database migrated from schema {from} to {version}");
    }
    Ok(())
}

impl Storage for FileStorage {
    fn load(&self) -> Result<SessionData, StorageError> {
        self.with_conn(|conn| {
            let data = conn.query_row(
                "SELECT dc_id, api_id, test_mode, auth_key, date, user_id, is_bot FROM sessions",
                [],
                |r| {
                    let key: Option<Vec<u8>> = r.get(3)?;
                    Ok(SessionData {
                        dc_id:     r.get(0)?,
                        api_id:    r.get(1)?,
                        test_mode: r.get::<_, Option<bool>>(2)?.unwrap_or(false),
                        auth_key:  key.and_then(|k| AuthKey::from_slice(&k)),
                        date:      r.get(4)?,
                        user_id:   r.get(5)?,
                        is_bot:    r.get(6)?,
                    })
                },
            )?;
            Ok(data)
        })
    }

    fn save(&self, data: &SessionData) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET dc_id = ?1, api_id = ?2, test_mode = ?3, auth_key = ?4,
                                     date = ?5, user_id = ?6, is_bot = ?7",
                params![
                    data.dc_id,
                    data.api_id,
                    data.test_mode,
                    data.auth_key.as_ref().map(|k| k.to_bytes().to_vec()),
                    data.date,
                    data.user_id,
                    data.is_bot,
                ],
            )?;
            Ok(())
        })
    }

    fn update_peers(&self, peers: &[PeerRecord]) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "REPLACE INTO peers (id, access_hash, type, username, phone_number, last_update_on)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            let at = now();
            for p in peers {
                stmt.execute(params![
                    p.id,
                    p.access_hash,
                    p.peer_type as i64,
                    p.username.as_deref().map(normalize_username),
                    p.phone_number,
                    at,
                ])?;
            }
            Ok(())
        })
    }

    fn get_peer_by_id(&self, peer_id: i64) -> Result<enums::InputPeer, StorageError> {
        let (id, access_hash, peer_type, _) = self.find_peer(
            "SELECT id, access_hash, type, last_update_on FROM peers WHERE id = ?1",
            peer_id,
        )?;
        Ok(get_input_peer(id, access_hash, peer_type))
    }

    fn get_peer_by_username(&self, username: &str) -> Result<enums::InputPeer, StorageError> {
        let username = normalize_username(username);
        let (id, access_hash, peer_type, last_update_on) = self.find_peer(
            "SELECT id, access_hash, type, last_update_on FROM peers WHERE username = ?1
             ORDER BY last_update_on DESC",
            &username,
        )?;
        if username_expired(last_update_on) {
            return Err(StorageError::UsernameExpired(username));
        }
        Ok(get_input_peer(id, access_hash, peer_type))
    }

    fn get_peer_by_phone_number(&self, phone_number: &str) -> Result<enums::InputPeer, StorageError> {
        let (id, access_hash, peer_type, _) = self.find_peer(
            "SELECT id, access_hash, type, last_update_on FROM peers WHERE phone_number = ?1",
            phone_number,
        )?;
        Ok(get_input_peer(id, access_hash, peer_type))
    }

    fn delete(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| e)?;
        }
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn name(&self) -> &str { "sqlite" }
}
