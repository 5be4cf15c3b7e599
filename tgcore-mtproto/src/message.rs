//! Messages as they appear inside the encrypted envelope.

use tgcore_tl::deserialize::{Buffer, Error, Result};
use tgcore_tl::{Deserializable, Identifiable, Serializable, functions, types};

/// `msg_container#73f1f8dc messages:vector<message> = MessageContainer;`
pub const MSG_CONTAINER_ID: u32 = 0x73f1f8dc;
/// `rpc_result#f35c6d01 req_msg_id:long result:Object = RpcResult;`
pub const RPC_RESULT_ID: u32 = 0xf35c6d01;

// ─── Message ─────────────────────────────────────────────────────────────────

/// `message msg_id:long seqno:int bytes:int body:Object = Message;`
///
/// `body` is already-encoded TL; it is written verbatim after its length.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub msg_id: i64,
    pub seq_no: i32,
    pub body: Vec<u8>,
}

impl Message {
    /// Size of the fixed header preceding the body.
    pub const HEADER_LEN: usize = 8 + 4 + 4;

    /// Whether the server must acknowledge this message.
    pub fn requires_ack(&self) -> bool {
        self.seq_no % 2 == 1
    }

    /// Constructor id at the head of the body.
    pub fn constructor_id(&self) -> Option<u32> {
        self.body.get(..4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

impl Serializable for Message {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.msg_id.serialize(buf);
        self.seq_no.serialize(buf);
        (self.body.len() as i32).serialize(buf);
        buf.extend(self.body.iter().copied());
    }
}

impl Deserializable for Message {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let msg_id = i64::deserialize(buf)?;
        let seq_no = i32::deserialize(buf)?;
        let len = i32::deserialize(buf)?;
        if len < 0 || len % 4 != 0 || len as usize > buf.remaining() {
            return Err(Error::LengthOutOfRange { len: len.into() });
        }
        let body = buf.read_slice(len as usize)?.to_vec();
        Ok(Self { msg_id, seq_no, body })
    }
}

// ─── MessageContainer ────────────────────────────────────────────────────────

/// A list of messages sent as the body of one outer message.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageContainer {
    pub messages: Vec<Message>,
}

impl MessageContainer {
    /// Largest encoded container the server accepts.
    pub const MAXIMUM_SIZE: usize = 1_044_456 - 8;
    /// Most messages a single container may carry.
    pub const MAXIMUM_LENGTH: usize = 100;
}

impl Identifiable for MessageContainer {
    const CONSTRUCTOR_ID: u32 = MSG_CONTAINER_ID;
}

impl Serializable for MessageContainer {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        Self::CONSTRUCTOR_ID.serialize(buf);
        (self.messages.len() as i32).serialize(buf);
        for m in &self.messages {
            m.serialize(buf);
        }
    }
}

/// Reads the fields after the constructor id.
impl Deserializable for MessageContainer {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let count = i32::deserialize(buf)?;
        if count < 0 || count as usize > buf.remaining() / Message::HEADER_LEN {
            return Err(Error::LengthOutOfRange { len: count.into() });
        }
        let mut messages = Vec::with_capacity(count as usize);
        for _ in 0..count {
            messages.push(Message::deserialize(buf)?);
        }
        Ok(Self { messages })
    }
}

// ─── RpcResult ───────────────────────────────────────────────────────────────

/// The reply to a content-related request; `result` is the raw, possibly
/// gzip-packed, answer.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcResult {
    pub req_msg_id: i64,
    pub result: Vec<u8>,
}

impl Identifiable for RpcResult {
    const CONSTRUCTOR_ID: u32 = RPC_RESULT_ID;
}

impl Serializable for RpcResult {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        Self::CONSTRUCTOR_ID.serialize(buf);
        self.req_msg_id.serialize(buf);
        buf.extend(self.result.iter().copied());
    }
}

/// Reads the fields after the constructor id.
impl Deserializable for RpcResult {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let req_msg_id = i64::deserialize(buf)?;
        let mut result = Vec::new();
        buf.read_to_end(&mut result);
        Ok(Self { req_msg_id, result })
    }
}

// ─── Sequence numbers ────────────────────────────────────────────────────────

/// Whether a message with this body counts towards `seq_no`.
///
/// Everything is content-related except pings, `http_wait`, acks and
/// containers.
pub fn is_content_related(body: &[u8]) -> bool {
    let Some(head) = body.get(..4) else { return true };
    let id = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
    !matches!(
        id,
        functions::Ping::CONSTRUCTOR_ID
            | types::HttpWait::CONSTRUCTOR_ID
            | types::MsgsAck::CONSTRUCTOR_ID
            | MSG_CONTAINER_ID
    )
}

/// Counter of content-related messages sent in the current session.
#[derive(Clone, Copy, Debug, Default)]
pub struct SeqNo {
    content_related: i32,
}

impl SeqNo {
    /// `2n + 1` for a content-related message (then `n += 1`), `2n` otherwise.
    pub fn next(&mut self, content_related: bool) -> i32 {
        if content_related {
            let seq = self.content_related * 2 + 1;
            self.content_related += 1;
            seq
        } else {
            self.content_related * 2
        }
    }

    /// Number of content-related messages counted so far.
    pub fn count(&self) -> i32 { self.content_related }

    /// Shift the counter after the server reported `msg_seqno` too low (32)
    /// or too high (33).
    pub fn correct(&mut self, error_code: i32) {
        match error_code {
            32 => self.content_related += 32,
            33 => self.content_related = (self.content_related - 8).max(0),
            _ => {}
        }
    }

    pub fn reset(&mut self) {
        self.content_related = 0;
    }
}
