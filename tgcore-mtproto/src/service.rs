//! Classifying decrypted messages.
//!
//! Containers are flattened and `gzip_packed` wrappers peeled, so every
//! [`Inbound`] carries exactly one logical message.

use tgcore_tl::deserialize::Result;
use tgcore_tl::{Deserializable, Identifiable, enums, inflate_if_packed, types};

use crate::message::{MSG_CONTAINER_ID, MessageContainer, RPC_RESULT_ID, RpcResult};

/// Answer carried by an `rpc_result`.
#[derive(Clone, Debug, PartialEq)]
pub enum RpcAnswer {
    /// Encoded reply, already inflated.
    Ok(Vec<u8>),
    Err(types::RpcError),
}

/// One logical message received from the server.
#[derive(Clone, Debug, PartialEq)]
pub enum ServiceMessage {
    RpcResult { req_msg_id: i64, answer: RpcAnswer },
    BadMsgNotification(types::BadMsgNotification),
    BadServerSalt(types::BadServerSalt),
    FutureSalts(types::FutureSalts),
    Pong(types::Pong),
    NewSessionCreated(types::NewSessionCreated),
    MsgsAck(Vec<i64>),
    /// `msg_detailed_info` / `msg_new_detailed_info`: the answer was sent
    /// earlier and only needs acknowledging.
    DetailedInfo { answer_msg_id: i64 },
    /// A service constructor the session does not act on.
    Ignored { constructor_id: u32 },
    /// Anything else; handed to the update queue as is.
    Update(Vec<u8>),
}

/// A decoded message together with its envelope fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Inbound {
    pub msg_id: i64,
    pub seq_no: i32,
    pub message: ServiceMessage,
}

impl Inbound {
    /// Odd `seq_no`: the server expects an ack.
    pub fn requires_ack(&self) -> bool {
        self.seq_no % 2 == 1
    }
}

/// Decode one message body, appending the result(s) to `out`.
///
/// A container contributes one entry per inner message, in order.
pub fn decode(msg_id: i64, seq_no: i32, body: &[u8], out: &mut Vec<Inbound>) -> Result<()> {
    let body = inflate_if_packed(body)?;
    let id = match body.get(..4) {
        Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        None => return Err(tgcore_tl::deserialize::Error::Truncated),
    };
    let rest = &body[4..];

    if id == MSG_CONTAINER_ID {
        let container = MessageContainer::from_bytes(rest)?;
        for m in container.messages {
            if m.constructor_id() == Some(MSG_CONTAINER_ID) {
                log::warn!("[tgcore] nested msg_container {} skipped", m.msg_id);
                continue;
            }
            decode(m.msg_id, m.seq_no, &m.body, out)?;
        }
        return Ok(());
    }

    let message = classify(id, &body, rest)?;
    out.push(Inbound { msg_id, seq_no, message });
    Ok(())
}

fn classify(id: u32, body: &[u8], rest: &[u8]) -> Result<ServiceMessage> {
    Ok(match id {
        RPC_RESULT_ID => {
            let RpcResult { req_msg_id, result } = RpcResult::from_bytes(rest)?;
            let result = inflate_if_packed(&result)?.into_owned();
            let answer = if result.get(..4) == Some(&types::RpcError::CONSTRUCTOR_ID.to_le_bytes()[..]) {
                RpcAnswer::Err(types::RpcError::from_bytes(&result[4..])?)
            } else {
                RpcAnswer::Ok(result)
            };
            ServiceMessage::RpcResult { req_msg_id, answer }
        }
        types::BadMsgNotification::CONSTRUCTOR_ID | types::BadServerSalt::CONSTRUCTOR_ID => {
            match enums::BadMsgNotification::from_bytes(body)? {
                enums::BadMsgNotification::BadMsgNotification(n) => {
                    ServiceMessage::BadMsgNotification(n)
                }
                enums::BadMsgNotification::BadServerSalt(s) => ServiceMessage::BadServerSalt(s),
            }
        }
        types::FutureSalts::CONSTRUCTOR_ID => {
            ServiceMessage::FutureSalts(types::FutureSalts::from_bytes(rest)?)
        }
        types::Pong::CONSTRUCTOR_ID => ServiceMessage::Pong(types::Pong::from_bytes(rest)?),
        types::NewSessionCreated::CONSTRUCTOR_ID => {
            ServiceMessage::NewSessionCreated(types::NewSessionCreated::from_bytes(rest)?)
        }
        types::MsgsAck::CONSTRUCTOR_ID => {
            ServiceMessage::MsgsAck(types::MsgsAck::from_bytes(rest)?.msg_ids)
        }
        types::MsgDetailedInfo::CONSTRUCTOR_ID | types::MsgNewDetailedInfo::CONSTRUCTOR_ID => {
            let answer_msg_id = match enums::MsgDetailedInfo::from_bytes(body)? {
                enums::MsgDetailedInfo::MsgDetailedInfo(i) => i.answer_msg_id,
                enums::MsgDetailedInfo::MsgNewDetailedInfo(i) => i.answer_msg_id,
            };
            ServiceMessage::DetailedInfo { answer_msg_id }
        }
        types::MsgsStateReq::CONSTRUCTOR_ID
        | types::MsgsStateInfo::CONSTRUCTOR_ID
        | types::MsgsAllInfo::CONSTRUCTOR_ID
        | types::MsgResendReq::CONSTRUCTOR_ID
        | types::DestroySessionOk::CONSTRUCTOR_ID
        | types::DestroySessionNone::CONSTRUCTOR_ID
        | types::HttpWait::CONSTRUCTOR_ID => ServiceMessage::Ignored { constructor_id: id },
        _ => ServiceMessage::Update(body.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use tgcore_tl::{GzipPacked, Serializable};

    fn decode_one(body: &[u8]) -> ServiceMessage {
        let mut out = Vec::new();
        decode(1, 1, body, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        out.remove(0).message
    }

    #[test]
    fn rpc_result_with_value() {
        let pong = enums::Pong::Pong(types::Pong { msg_id: 4, ping_id: 5 }).to_bytes();
        let body = RpcResult { req_msg_id: 4, result: pong.clone() }.to_bytes();
        assert_eq!(
            decode_one(&body),
            ServiceMessage::RpcResult { req_msg_id: 4, answer: RpcAnswer::Ok(pong) }
        );
    }

    #[test]
    fn rpc_result_with_error() {
        let err = types::RpcError { error_code: 420, error_message: "FLOOD_WAIT_17".into() };
        let body = RpcResult {
            req_msg_id: 8,
            result: enums::RpcError::RpcError(err.clone()).to_bytes(),
        }
        .to_bytes();
        assert_eq!(
            decode_one(&body),
            ServiceMessage::RpcResult { req_msg_id: 8, answer: RpcAnswer::Err(err) }
        );
    }

    #[test]
    fn packed_result_is_inflated() {
        let config = vec![0xaa; 64];
        let body = RpcResult { req_msg_id: 12, result: GzipPacked::new(&config).unwrap().to_bytes() }.to_bytes();
        assert_eq!(
            decode_one(&body),
            ServiceMessage::RpcResult { req_msg_id: 12, answer: RpcAnswer::Ok(config) }
        );
    }

    #[test]
    fn bad_server_salt_keeps_new_salt() {
        let salt = types::BadServerSalt {
            bad_msg_id: 16,
            bad_msg_seqno: 1,
            error_code: 48,
            new_server_salt: 99,
        };
        let body = enums::BadMsgNotification::BadServerSalt(salt.clone()).to_bytes();
        assert_eq!(decode_one(&body), ServiceMessage::BadServerSalt(salt));
    }

    #[test]
    fn container_is_flattened_in_order() {
        let ack = enums::MsgsAck::MsgsAck(types::MsgsAck { msg_ids: vec![4, 8] }).to_bytes();
        let created = enums::NewSession::NewSessionCreated(types::NewSessionCreated {
            first_msg_id: 4,
            unique_id: 1,
            server_salt: 7,
        })
        .to_bytes();
        let update = 0x12345678u32.to_le_bytes().to_vec();
        let container = crate::message::MessageContainer {
            messages: vec![
                Message { msg_id: 101, seq_no: 0, body: ack },
                Message { msg_id: 105, seq_no: 1, body: created },
                Message { msg_id: 109, seq_no: 3, body: update.clone() },
            ],
        };

        let mut out = Vec::new();
        decode(113, 0, &container.to_bytes(), &mut out).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].message, ServiceMessage::MsgsAck(vec![4, 8]));
        assert!(!out[0].requires_ack());
        assert!(matches!(out[1].message, ServiceMessage::NewSessionCreated(_)));
        assert_eq!(out[2].msg_id, 109);
        assert_eq!(out[2].message, ServiceMessage::Update(update));
        assert!(out[2].requires_ack());
    }

    #[test]
    fn truncated_body_is_an_error() {
        let mut out = Vec::new();
        assert!(decode(1, 1, &[1, 2], &mut out).is_err());
        let pong_head = types::Pong::CONSTRUCTOR_ID.to_le_bytes();
        assert!(decode(1, 1, &pong_head, &mut out).is_err());
    }
}
