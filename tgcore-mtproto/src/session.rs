//! Outgoing side of one MTProto session.

use tgcore_crypto::AuthKey;
use tgcore_tl::Serializable;

use crate::acks::AckQueue;
use crate::encrypted::EncryptedSession;
use crate::message::{Message, MessageContainer, SeqNo, is_content_related};
use crate::msg_id;

/// An encrypted payload ready for the transport.
#[derive(Clone, Debug)]
pub struct Packed {
    /// `msg_id` of the caller's message; replies are keyed by it.
    pub msg_id: i64,
    /// Set when the message travelled inside a container together with
    /// pending acks. The server may refer to the container id instead.
    pub container_id: Option<i64>,
    pub payload: Vec<u8>,
}

/// Per-connection sending state: envelope, sequence counter and the acks
/// owed to the server.
///
/// A fresh `Session` (new `session_id`, `seq_no` back at zero) is created
/// for every connection attempt.
///
/// # Example
///
/// ```rust
/// use tgcore_crypto::AuthKey;
/// use tgcore_mtproto::{Session, salt::INITIAL_SALT};
/// use tgcore_tl::functions;
/// use tgcore_tl::Serializable;
///
/// let key = AuthKey::from_bytes([7u8; 256]);
/// let mut session = Session::new(key, INITIAL_SALT);
/// let packed = session.pack(&functions::Ping { ping_id: 0 }.to_bytes());
/// assert_eq!(packed.msg_id % 4, 0);
/// ```
pub struct Session {
    envelope: EncryptedSession,
    seq: SeqNo,
    acks: AckQueue,
}

impl Session {
    /// Client session with a random `session_id`.
    pub fn new(auth_key: AuthKey, salt: i64) -> Self {
        Self::from_envelope(EncryptedSession::new(auth_key, salt))
    }

    pub fn from_envelope(envelope: EncryptedSession) -> Self {
        Self { envelope, seq: SeqNo::default(), acks: AckQueue::default() }
    }

    /// The envelope, for a reader that decrypts on its own.
    pub fn envelope(&self) -> &EncryptedSession { &self.envelope }

    pub fn session_id(&self) -> i64 { self.envelope.session_id() }

    pub fn salt(&self) -> i64 { self.envelope.salt }

    pub fn set_salt(&mut self, salt: i64) {
        if self.envelope.salt != salt {
            log::debug!("[tgcore] salt {:#x} -> {salt:#x}", self.envelope.salt);
            self.envelope.salt = salt;
        }
    }

    /// Queue an ack for a server message with an odd `seq_no`.
    pub fn ack(&mut self, msg_id: i64) {
        self.acks.push(msg_id);
    }

    pub fn pending_acks(&self) -> usize { self.acks.len() }

    pub fn should_flush_acks(&self) -> bool { self.acks.should_flush() }

    /// Drop queued acks (the connection they belonged to is gone).
    pub fn clear_acks(&mut self) {
        self.acks.clear();
    }

    /// Encrypt `body` as the next message.
    ///
    /// Pending acks ride along in a container; the container gets the
    /// highest `msg_id` and an even `seq_no`.
    pub fn pack(&mut self, body: &[u8]) -> Packed {
        let content_related = is_content_related(body);
        let fits = body.len() + Message::HEADER_LEN * 3 + 8 * self.acks.len() + 64
            <= MessageContainer::MAXIMUM_SIZE;

        let ack_body = if fits { self.acks.take_body() } else { None };
        let Some(ack_body) = ack_body else {
            let msg_id = msg_id::next();
            let seq_no = self.seq.next(content_related);
            let payload = self.envelope.encrypt(msg_id, seq_no, body);
            return Packed { msg_id, container_id: None, payload };
        };

        let ack = Message { msg_id: msg_id::next(), seq_no: self.seq.next(false), body: ack_body };
        let msg_id = msg_id::next();
        let request = Message { msg_id, seq_no: self.seq.next(content_related), body: body.to_vec() };
        let container = MessageContainer { messages: vec![ack, request] };

        let container_id = msg_id::next();
        let seq_no = self.seq.next(false);
        let payload = self.envelope.encrypt(container_id, seq_no, &container.to_bytes());
        log::trace!("[tgcore] {msg_id} sent in container {container_id} with acks");
        Packed { msg_id, container_id: Some(container_id), payload }
    }

    /// Encrypt the pending acks on their own, if there are any.
    pub fn pack_acks(&mut self) -> Option<Packed> {
        let body = self.acks.take_body()?;
        let msg_id = msg_id::next();
        let seq_no = self.seq.next(false);
        let payload = self.envelope.encrypt(msg_id, seq_no, &body);
        Some(Packed { msg_id, container_id: None, payload })
    }

    /// Apply a `bad_msg_notification` about `msg_seqno` (codes 32 / 33).
    pub fn correct_seq_no(&mut self, error_code: i32) {
        self.seq.correct(error_code);
    }

    /// Start counting from zero again after `new_session_created`.
    pub fn reset_seq_no(&mut self) {
        self.seq.reset();
    }

    /// Content-related messages sent so far.
    pub fn content_related_sent(&self) -> i32 { self.seq.count() }
}
