//! Bare constructors.
//!
//! Each type implements [`crate::Identifiable`]; its `Serializable` impl
//! writes the fields only. Wrap it in the matching [`crate::enums`] variant to
//! get the boxed, tagged form.

use crate::deserialize::{Buffer, Result};
use crate::{Deserializable, Identifiable, RawVec, Serializable};

// ─── MTProto service messages ────────────────────────────────────────────────

tl_type! {
    /// `msgs_ack#62d6b459 msg_ids:Vector<long> = MsgsAck;`
    MsgsAck = 0x62d6b459 { msg_ids: Vec<i64> }
}

tl_type! {
    /// `bad_msg_notification#a7eff811 bad_msg_id:long bad_msg_seqno:int error_code:int = BadMsgNotification;`
    BadMsgNotification = 0xa7eff811 {
        bad_msg_id: i64,
        bad_msg_seqno: i32,
        error_code: i32,
    }
}

tl_type! {
    /// `bad_server_salt#edab447b bad_msg_id:long bad_msg_seqno:int error_code:int new_server_salt:long = BadMsgNotification;`
    BadServerSalt = 0xedab447b {
        bad_msg_id: i64,
        bad_msg_seqno: i32,
        error_code: i32,
        new_server_salt: i64,
    }
}

tl_type! {
    /// `msg_detailed_info#276d3ec6 msg_id:long answer_msg_id:long bytes:int status:int = MsgDetailedInfo;`
    MsgDetailedInfo = 0x276d3ec6 {
        msg_id: i64,
        answer_msg_id: i64,
        bytes: i32,
        status: i32,
    }
}

tl_type! {
    /// `msg_new_detailed_info#809db6df answer_msg_id:long bytes:int status:int = MsgDetailedInfo;`
    MsgNewDetailedInfo = 0x809db6df {
        answer_msg_id: i64,
        bytes: i32,
        status: i32,
    }
}

tl_type! {
    /// `msg_resend_req#7d861a08 msg_ids:Vector<long> = MsgResendReq;`
    MsgResendReq = 0x7d861a08 { msg_ids: Vec<i64> }
}

tl_type! {
    /// `msgs_state_req#da69fb52 msg_ids:Vector<long> = MsgsStateReq;`
    MsgsStateReq = 0xda69fb52 { msg_ids: Vec<i64> }
}

tl_type! {
    /// `msgs_state_info#04deb57d req_msg_id:long info:string = MsgsStateInfo;`
    MsgsStateInfo = 0x04deb57d { req_msg_id: i64, info: Vec<u8> }
}

tl_type! {
    /// `msgs_all_info#8cc0d131 msg_ids:Vector<long> info:string = MsgsAllInfo;`
    MsgsAllInfo = 0x8cc0d131 { msg_ids: Vec<i64>, info: Vec<u8> }
}

tl_type! {
    /// `rpc_error#2144ca19 error_code:int error_message:string = RpcError;`
    RpcError = 0x2144ca19 { error_code: i32, error_message: String }
}

tl_type! {
    /// `rpc_answer_unknown#5e2ad36e = RpcDropAnswer;`
    RpcAnswerUnknown = 0x5e2ad36e {}
}

tl_type! {
    /// `rpc_answer_dropped_running#cd78e586 = RpcDropAnswer;`
    RpcAnswerDroppedRunning = 0xcd78e586 {}
}

tl_type! {
    /// `rpc_answer_dropped#a43ad8b7 msg_id:long seq_no:int bytes:int = RpcDropAnswer;`
    RpcAnswerDropped = 0xa43ad8b7 { msg_id: i64, seq_no: i32, bytes: i32 }
}

tl_type! {
    /// `future_salt#0949d9dc valid_since:int valid_until:int salt:long = FutureSalt;`
    FutureSalt = 0x0949d9dc {
        valid_since: i32,
        valid_until: i32,
        salt: i64,
    }
}

tl_type! {
    /// `future_salts#ae500895 req_msg_id:long now:int salts:vector<future_salt> = FutureSalts;`
    ///
    /// `salts` is a bare vector of bare `future_salt`s: no vector header and
    /// no per-item constructor ID.
    FutureSalts = 0xae500895 {
        req_msg_id: i64,
        now: i32,
        salts: RawVec<FutureSalt>,
    }
}

tl_type! {
    /// `pong#347773c5 msg_id:long ping_id:long = Pong;`
    Pong = 0x347773c5 { msg_id: i64, ping_id: i64 }
}

tl_type! {
    /// `new_session_created#9ec20908 first_msg_id:long unique_id:long server_salt:long = NewSession;`
    NewSessionCreated = 0x9ec20908 {
        first_msg_id: i64,
        unique_id: i64,
        server_salt: i64,
    }
}

tl_type! {
    /// `destroy_session_ok#e22045fc session_id:long = DestroySessionRes;`
    DestroySessionOk = 0xe22045fc { session_id: i64 }
}

tl_type! {
    /// `destroy_session_none#62d350c9 session_id:long = DestroySessionRes;`
    DestroySessionNone = 0x62d350c9 { session_id: i64 }
}

tl_type! {
    /// `http_wait#9299359f max_delay:int wait_after:int max_wait:int = HttpWait;`
    HttpWait = 0x9299359f {
        max_delay: i32,
        wait_after: i32,
        max_wait: i32,
    }
}

// ─── API: peers ──────────────────────────────────────────────────────────────

tl_type! {
    /// `inputPeerEmpty#7f3b18ea = InputPeer;`
    InputPeerEmpty = 0x7f3b18ea {}
}

tl_type! {
    /// `inputPeerSelf#7da07ec9 = InputPeer;`
    InputPeerSelf = 0x7da07ec9 {}
}

tl_type! {
    /// `inputPeerChat#35a95cb9 chat_id:long = InputPeer;`
    InputPeerChat = 0x35a95cb9 { chat_id: i64 }
}

tl_type! {
    /// `inputPeerUser#dde8a54c user_id:long access_hash:long = InputPeer;`
    InputPeerUser = 0xdde8a54c { user_id: i64, access_hash: i64 }
}

tl_type! {
    /// `inputPeerChannel#27bcbbfc channel_id:long access_hash:long = InputPeer;`
    InputPeerChannel = 0x27bcbbfc { channel_id: i64, access_hash: i64 }
}

tl_type! {
    /// `peerUser#59511722 user_id:long = Peer;`
    PeerUser = 0x59511722 { user_id: i64 }
}

tl_type! {
    /// `peerChat#36c6019a chat_id:long = Peer;`
    PeerChat = 0x36c6019a { chat_id: i64 }
}

tl_type! {
    /// `peerChannel#a2a5371e channel_id:long = Peer;`
    PeerChannel = 0xa2a5371e { channel_id: i64 }
}

// ─── API: help ───────────────────────────────────────────────────────────────

tl_type! {
    /// `nearestDc#8e1a1775 country:string this_dc:int nearest_dc:int = NearestDc;`
    NearestDc = 0x8e1a1775 {
        country: String,
        this_dc: i32,
        nearest_dc: i32,
    }
}

/// `dcOption#18b7a10d flags:# ipv6:flags.0?true media_only:flags.1?true
/// tcpo_only:flags.2?true cdn:flags.3?true static:flags.4?true
/// this_port_only:flags.5?true id:int ip_address:string port:int
/// secret:flags.10?bytes = DcOption;`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DcOption {
    pub ipv6: bool,
    pub media_only: bool,
    pub tcpo_only: bool,
    pub cdn: bool,
    pub r#static: bool,
    pub this_port_only: bool,
    pub id: i32,
    pub ip_address: String,
    pub port: i32,
    pub secret: Option<Vec<u8>>,
}

impl Identifiable for DcOption {
    const CONSTRUCTOR_ID: u32 = 0x18b7a10d;
}

impl Serializable for DcOption {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        let flags: u32 = (if self.ipv6 { 1 << 0 } else { 0 })
            | (if self.media_only { 1 << 1 } else { 0 })
            | (if self.tcpo_only { 1 << 2 } else { 0 })
            | (if self.cdn { 1 << 3 } else { 0 })
            | (if self.r#static { 1 << 4 } else { 0 })
            | (if self.this_port_only { 1 << 5 } else { 0 })
            | (if self.secret.is_some() { 1 << 10 } else { 0 });
        flags.serialize(buf);
        self.id.serialize(buf);
        self.ip_address.serialize(buf);
        self.port.serialize(buf);
        if let Some(ref v) = self.secret { v.serialize(buf); }
    }
}

impl Deserializable for DcOption {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let flags = u32::deserialize(buf)?;
        let id = i32::deserialize(buf)?;
        let ip_address = String::deserialize(buf)?;
        let port = i32::deserialize(buf)?;
        let secret = if flags & (1 << 10) != 0 { Some(Vec::<u8>::deserialize(buf)?) } else { None };
        Ok(Self {
            ipv6: flags & (1 << 0) != 0,
            media_only: flags & (1 << 1) != 0,
            tcpo_only: flags & (1 << 2) != 0,
            cdn: flags & (1 << 3) != 0,
            r#static: flags & (1 << 4) != 0,
            this_port_only: flags & (1 << 5) != 0,
            id,
            ip_address,
            port,
            secret,
        })
    }
}

/// `config#cc1a241e flags:# … date:int expires:int test_mode:Bool this_dc:int
/// dc_options:Vector<DcOption> dc_txt_domain_name:string … = Config;`
///
/// Only the leading fields are decoded. Everything after
/// `dc_txt_domain_name` is kept verbatim in `tail` so the value re-encodes to
/// the exact bytes it was read from; decoding therefore expects the buffer to
/// end where the config ends (as it does inside an `rpc_result`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    pub flags: u32,
    pub date: i32,
    pub expires: i32,
    pub test_mode: bool,
    pub this_dc: i32,
    pub dc_options: Vec<crate::enums::DcOption>,
    pub dc_txt_domain_name: String,
    pub tail: Vec<u8>,
}

impl Identifiable for Config {
    const CONSTRUCTOR_ID: u32 = 0xcc1a241e;
}

impl Serializable for Config {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.flags.serialize(buf);
        self.date.serialize(buf);
        self.expires.serialize(buf);
        self.test_mode.serialize(buf);
        self.this_dc.serialize(buf);
        self.dc_options.serialize(buf);
        self.dc_txt_domain_name.serialize(buf);
        buf.extend(self.tail.iter().copied());
    }
}

impl Deserializable for Config {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let flags = u32::deserialize(buf)?;
        let date = i32::deserialize(buf)?;
        let expires = i32::deserialize(buf)?;
        let test_mode = bool::deserialize(buf)?;
        let this_dc = i32::deserialize(buf)?;
        let dc_options = Vec::<crate::enums::DcOption>::deserialize(buf)?;
        let dc_txt_domain_name = String::deserialize(buf)?;
        let mut tail = Vec::new();
        buf.read_to_end(&mut tail);
        Ok(Self { flags, date, expires, test_mode, this_dc, dc_options, dc_txt_domain_name, tail })
    }
}
