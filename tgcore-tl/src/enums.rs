//! Boxed types.
//!
//! Every enum reads its leading constructor ID and dispatches to the matching
//! bare type; an ID outside the variant set yields
//! [`crate::deserialize::Error::UnknownConstructor`].

use crate::types;

tl_enum! {
    /// `MsgsAck`
    MsgsAck { MsgsAck(types::MsgsAck) }
}

tl_enum! {
    /// `BadMsgNotification`: either a plain notification or a salt correction.
    BadMsgNotification {
        BadMsgNotification(types::BadMsgNotification),
        BadServerSalt(types::BadServerSalt),
    }
}

tl_enum! {
    /// `MsgDetailedInfo`
    MsgDetailedInfo {
        MsgDetailedInfo(types::MsgDetailedInfo),
        MsgNewDetailedInfo(types::MsgNewDetailedInfo),
    }
}

tl_enum! {
    /// `MsgResendReq`
    MsgResendReq { MsgResendReq(types::MsgResendReq) }
}

tl_enum! {
    /// `MsgsStateReq`
    MsgsStateReq { MsgsStateReq(types::MsgsStateReq) }
}

tl_enum! {
    /// `MsgsStateInfo`
    MsgsStateInfo { MsgsStateInfo(types::MsgsStateInfo) }
}

tl_enum! {
    /// `MsgsAllInfo`
    MsgsAllInfo { MsgsAllInfo(types::MsgsAllInfo) }
}

tl_enum! {
    /// `RpcError`
    RpcError { RpcError(types::RpcError) }
}

tl_enum! {
    /// `RpcDropAnswer`
    RpcDropAnswer {
        RpcAnswerUnknown(types::RpcAnswerUnknown),
        RpcAnswerDroppedRunning(types::RpcAnswerDroppedRunning),
        RpcAnswerDropped(types::RpcAnswerDropped),
    }
}

tl_enum! {
    /// `FutureSalt`
    FutureSalt { FutureSalt(types::FutureSalt) }
}

tl_enum! {
    /// `FutureSalts`
    FutureSalts { FutureSalts(types::FutureSalts) }
}

tl_enum! {
    /// `Pong`
    Pong { Pong(types::Pong) }
}

tl_enum! {
    /// `NewSession`
    NewSession { NewSessionCreated(types::NewSessionCreated) }
}

tl_enum! {
    /// `DestroySessionRes`
    DestroySessionRes {
        DestroySessionOk(types::DestroySessionOk),
        DestroySessionNone(types::DestroySessionNone),
    }
}

tl_enum! {
    /// `HttpWait`
    HttpWait { HttpWait(types::HttpWait) }
}

tl_enum! {
    /// `InputPeer`
    InputPeer {
        Empty(types::InputPeerEmpty),
        PeerSelf(types::InputPeerSelf),
        Chat(types::InputPeerChat),
        User(types::InputPeerUser),
        Channel(types::InputPeerChannel),
    }
}

tl_enum! {
    /// `Peer`
    Peer {
        User(types::PeerUser),
        Chat(types::PeerChat),
        Channel(types::PeerChannel),
    }
}

tl_enum! {
    /// `DcOption`
    DcOption { DcOption(types::DcOption) }
}

tl_enum! {
    /// `Config`
    Config { Config(types::Config) }
}

tl_enum! {
    /// `NearestDc`
    NearestDc { NearestDc(types::NearestDc) }
}

impl FutureSalts {
    /// Unwrap the single constructor.
    pub fn into_inner(self) -> types::FutureSalts {
        match self { Self::FutureSalts(x) => x }
    }
}

impl Pong {
    /// Unwrap the single constructor.
    pub fn into_inner(self) -> types::Pong {
        match self { Self::Pong(x) => x }
    }
}

impl Config {
    /// Unwrap the single constructor.
    pub fn into_inner(self) -> types::Config {
        match self { Self::Config(x) => x }
    }
}
