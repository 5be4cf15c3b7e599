//! Bot-API style peer ids: one signed integer for users, basic groups and
//! channels.
//!
//! | kind    | range                                          |
//! |---------|------------------------------------------------|
//! | user    | `1 ..= 999_999_999_999`                        |
//! | chat    | `-999_999_999_999 ..= -1`                      |
//! | channel | `-1_002_147_483_647 ..= -1_000_000_000_001`    |

use std::fmt;

use tgcore_tl::{enums, types};

pub const MAX_USER_ID: i64 = 999_999_999_999;
pub const MIN_CHAT_ID: i64 = -999_999_999_999;
pub const MAX_CHANNEL_ID: i64 = -1_000_000_000_000;
pub const MIN_CHANNEL_ID: i64 = -1_002_147_483_647;

/// What a peer id points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerKind {
    User,
    Chat,
    Channel,
}

/// A peer id outside every valid range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidPeerId(pub i64);

impl fmt::Display for InvalidPeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer id invalid: {}", self.0)
    }
}

impl std::error::Error for InvalidPeerId {}

/// Map a TL peer to its signed id.
pub fn get_peer_id(peer: &enums::Peer) -> i64 {
    match peer {
        enums::Peer::User(p) => p.user_id,
        enums::Peer::Chat(p) => -p.chat_id,
        enums::Peer::Channel(p) => MAX_CHANNEL_ID - p.channel_id,
    }
}

/// The raw id the server uses for `peer`, without sign or offset.
pub fn get_raw_peer_id(peer: &enums::Peer) -> i64 {
    match peer {
        enums::Peer::User(p) => p.user_id,
        enums::Peer::Chat(p) => p.chat_id,
        enums::Peer::Channel(p) => p.channel_id,
    }
}

pub fn get_peer_type(peer_id: i64) -> Result<PeerKind, InvalidPeerId> {
    if peer_id < 0 {
        if MIN_CHAT_ID <= peer_id {
            return Ok(PeerKind::Chat);
        }
        if (MIN_CHANNEL_ID..MAX_CHANNEL_ID).contains(&peer_id) {
            return Ok(PeerKind::Channel);
        }
    } else if 0 < peer_id && peer_id <= MAX_USER_ID {
        return Ok(PeerKind::User);
    }
    Err(InvalidPeerId(peer_id))
}

/// Raw channel id from a signed channel peer id (the mapping is its own
/// inverse).
pub fn get_channel_id(peer_id: i64) -> i64 {
    MAX_CHANNEL_ID - peer_id
}

/// Build the TL peer for a signed id.
pub fn to_peer(peer_id: i64) -> Result<enums::Peer, InvalidPeerId> {
    Ok(match get_peer_type(peer_id)? {
        PeerKind::User => types::PeerUser { user_id: peer_id }.into(),
        PeerKind::Chat => types::PeerChat { chat_id: -peer_id }.into(),
        PeerKind::Channel => types::PeerChannel { channel_id: get_channel_id(peer_id) }.into(),
    })
}

/// Build the input form the API expects for a stored peer.
pub fn get_input_peer(peer_id: i64, access_hash: i64) -> Result<enums::InputPeer, InvalidPeerId> {
    Ok(match get_peer_type(peer_id)? {
        PeerKind::User => types::InputPeerUser { user_id: peer_id, access_hash }.into(),
        PeerKind::Chat => types::InputPeerChat { chat_id: -peer_id }.into(),
        PeerKind::Channel => {
            types::InputPeerChannel { channel_id: get_channel_id(peer_id), access_hash }.into()
        }
    })
}
