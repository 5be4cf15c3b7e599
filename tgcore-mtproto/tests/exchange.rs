//! A client `Session` talking to a hand-driven server envelope.

use tgcore_crypto::{AuthKey, Side};
use tgcore_mtproto::message::MSG_CONTAINER_ID;
use tgcore_mtproto::{
    EncryptedSession, Inbound, Message, MessageContainer, RpcAnswer, RpcResult, SeenMsgIds,
    ServiceMessage, Session, service,
};
use tgcore_tl::{Deserializable, Serializable, enums, functions, types};

struct Server {
    envelope: EncryptedSession,
    next_id: i64,
    seq: i32,
}

impl Server {
    fn for_client(session: &Session) -> Self {
        let env = session.envelope();
        Self {
            envelope: EncryptedSession::with_session_id(
                env.auth_key().clone(),
                env.session_id(),
                0x5eed,
                Side::Server,
            ),
            next_id: (1_700_000_000i64 << 32) | 1,
            seq: 0,
        }
    }

    fn send(&mut self, body: &[u8], content_related: bool) -> (i64, Vec<u8>) {
        let msg_id = self.next_id;
        self.next_id += 4;
        let seq_no = if content_related {
            self.seq += 1;
            self.seq * 2 - 1
        } else {
            self.seq * 2
        };
        (msg_id, self.envelope.encrypt(msg_id, seq_no, body))
    }
}

fn receive(client: &Session, seen: &mut SeenMsgIds, frame: &mut [u8]) -> Vec<Inbound> {
    let msg = client.envelope().decrypt(frame).unwrap();
    let mut out = Vec::new();
    if seen.insert(msg.msg_id) {
        service::decode(msg.msg_id, msg.seq_no, &msg.body, &mut out).unwrap();
    }
    out
}

#[test]
fn request_reply_and_ack() {
    let mut client = Session::new(AuthKey::from_bytes([0x42; 256]), 7);
    let mut server = Server::for_client(&client);
    let mut seen = SeenMsgIds::default();

    let mut req = client.pack(&functions::Ping { ping_id: 9 }.to_bytes());
    let got = server.envelope.decrypt(&mut req.payload).unwrap();
    assert_eq!(got.seq_no, 0);

    let pong = enums::Pong::Pong(types::Pong { msg_id: req.msg_id, ping_id: 9 }).to_bytes();
    let reply = RpcResult { req_msg_id: req.msg_id, result: pong.clone() }.to_bytes();
    let (reply_id, mut frame) = server.send(&reply, true);

    let inbound = receive(&client, &mut seen, &mut frame);
    assert_eq!(inbound.len(), 1);
    assert!(inbound[0].requires_ack());
    assert_eq!(
        inbound[0].message,
        ServiceMessage::RpcResult { req_msg_id: req.msg_id, answer: RpcAnswer::Ok(pong) }
    );
    client.ack(reply_id);

    // A replay of the same frame is swallowed.
    let mut again = server.envelope.encrypt(reply_id, 1, &reply);
    assert!(receive(&client, &mut seen, &mut again).is_empty());

    // The ack rides on the next request.
    let mut next = client.pack(&functions::help::GetConfig {}.to_bytes());
    assert!(next.container_id.is_some());
    let got = server.envelope.decrypt(&mut next.payload).unwrap();
    assert_eq!(&got.body[..4], &MSG_CONTAINER_ID.to_le_bytes());
    let container = MessageContainer::from_bytes(&got.body[4..]).unwrap();
    let enums::MsgsAck::MsgsAck(ack) = enums::MsgsAck::from_bytes(&container.messages[0].body).unwrap();
    assert_eq!(ack.msg_ids, [reply_id]);
}

#[test]
fn server_container_with_salt_and_update() {
    let mut client = Session::new(AuthKey::from_bytes([0x17; 256]), 7);
    let mut server = Server::for_client(&client);
    let mut seen = SeenMsgIds::default();

    let bad_salt = enums::BadMsgNotification::BadServerSalt(types::BadServerSalt {
        bad_msg_id: 4,
        bad_msg_seqno: 1,
        error_code: 48,
        new_server_salt: 0xabc,
    })
    .to_bytes();
    let update = [0x74, 0xae, 0x4c, 0xe5, 0, 0, 0, 0].to_vec();
    let body = MessageContainer {
        messages: vec![
            Message { msg_id: server.next_id + 4, seq_no: 0, body: bad_salt },
            Message { msg_id: server.next_id + 8, seq_no: 1, body: update.clone() },
        ],
    }
    .to_bytes();
    let (_, mut frame) = server.send(&body, false);

    let inbound = receive(&client, &mut seen, &mut frame);
    assert_eq!(inbound.len(), 2);
    match &inbound[0].message {
        ServiceMessage::BadServerSalt(s) => client.set_salt(s.new_server_salt),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(client.salt(), 0xabc);
    assert_eq!(inbound[1].message, ServiceMessage::Update(update));

    let mut req = client.pack(&functions::help::GetConfig {}.to_bytes());
    assert_eq!(server.envelope.decrypt(&mut req.payload).unwrap().salt, 0xabc);
}
