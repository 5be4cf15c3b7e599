//! A scripted DC on the far end of an in-memory pipe.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tgcore_client::dc::DcAddress;
use tgcore_client::transport::{self, BoxedStream, ConnectFuture, Connector, FrameReader, FrameWriter};
use tgcore_client::{NoRetries, Session, SessionConfig};
use tgcore_crypto::{AuthKey, Side, decrypt_data_v2};
use tgcore_mtproto::message::MSG_CONTAINER_ID;
use tgcore_mtproto::{EncryptedSession, Frame, MessageContainer, RpcResult, msg_id};
use tgcore_tl::{Blob, Deserializable, Identifiable, RawVec, RemoteCall, Serializable, enums, functions, types};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

/// The salt the mock DC accepts.
pub const SALT: i64 = 0x5a17_0000_5a17;

pub fn auth_key() -> AuthKey {
    AuthKey::from_bytes(std::array::from_fn(|i| (i * 7 + 3) as u8))
}

pub fn dc() -> DcAddress {
    DcAddress { dc_id: 2, ip: "127.0.0.1".into(), port: 443 }
}

pub fn config(connector: Arc<dyn Connector>) -> SessionConfig {
    SessionConfig {
        api_id: 1,
        connector: Some(connector),
        reconnect_backoff: Duration::from_millis(10),
        ..SessionConfig::default()
    }
}

pub fn config_without_retries(connector: Arc<dyn Connector>) -> SessionConfig {
    SessionConfig { retry_policy: Arc::new(NoRetries), ..config(connector) }
}

// ─── Echo ─────────────────────────────────────────────────────────────────────

/// A request outside the vocabulary that the mock answers with its nonce.
#[derive(Clone, Debug)]
pub struct Echo {
    pub nonce: i64,
}

impl Identifiable for Echo {
    const CONSTRUCTOR_ID: u32 = 0x0ec4_0001;
}

impl Serializable for Echo {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        Self::CONSTRUCTOR_ID.serialize(buf);
        self.nonce.serialize(buf);
    }
}

impl RemoteCall for Echo {
    type Return = Blob;
}

// ─── Connector ────────────────────────────────────────────────────────────────

struct PipeConnector {
    tx: mpsc::UnboundedSender<DuplexStream>,
}

impl Connector for PipeConnector {
    fn connect<'a>(&'a self, _: &'a DcAddress) -> ConnectFuture<'a> {
        Box::pin(async move {
            let (client, server) = tokio::io::duplex(1 << 20);
            self.tx
                .send(server)
                .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "mock DC is down"))?;
            Ok(Box::new(client) as BoxedStream)
        })
    }
}

/// Accepts the connections a [`Session`] opens through the paired connector.
pub struct MockDc {
    incoming: mpsc::UnboundedReceiver<DuplexStream>,
}

pub fn mock_dc() -> (Arc<dyn Connector>, MockDc) {
    let (tx, incoming) = mpsc::unbounded_channel();
    (Arc::new(PipeConnector { tx }), MockDc { incoming })
}

impl MockDc {
    pub async fn accept(&mut self) -> MockConn {
        let stream = self.incoming.recv().await.expect("client connects");
        let (reader, writer) = transport::accept(Box::new(stream)).await.expect("obfuscation header");
        MockConn {
            reader,
            writer,
            envelope: None,
            seq: 0,
            inbox: VecDeque::new(),
            greeted: false,
        }
    }
}

/// Start a session against a fresh mock and serve its handshake.
pub async fn started(config: SessionConfig, mut dc: MockDc) -> (Session, MockDc, MockConn) {
    let server = tokio::spawn(async move {
        let mut conn = dc.accept().await;
        conn.handshake().await;
        (dc, conn)
    });
    let session = Session::start_at(config, self::dc(), auth_key()).await.expect("session starts");
    let (dc, conn) = server.await.expect("mock DC task");
    (session, dc, conn)
}

// ─── Connection ───────────────────────────────────────────────────────────────

/// One client message, unpacked from any container.
#[derive(Clone, Debug)]
pub struct Request {
    pub msg_id: i64,
    pub salt:   i64,
    pub body:   Vec<u8>,
}

impl Request {
    pub fn constructor_id(&self) -> u32 {
        u32::from_le_bytes([self.body[0], self.body[1], self.body[2], self.body[3]])
    }

    pub fn echo_nonce(&self) -> Option<i64> {
        (self.constructor_id() == Echo::CONSTRUCTOR_ID)
            .then(|| i64::from_le_bytes(self.body[4..12].try_into().expect("nonce")))
    }
}

pub struct MockConn {
    reader:   FrameReader,
    writer:   FrameWriter,
    envelope: Option<EncryptedSession>,
    seq:      i32,
    inbox:    VecDeque<Request>,
    greeted:  bool,
}

impl MockConn {
    /// Next client message other than acks; `None` once the client hung up.
    pub async fn recv(&mut self) -> Option<Request> {
        loop {
            if let Some(r) = self.inbox.pop_front() {
                return Some(r);
            }
            let mut payload = match self.reader.recv().await {
                Ok(Frame::Payload(p)) => p,
                _ => return None,
            };
            if self.envelope.is_none() {
                let mut copy = payload.clone();
                let plain = decrypt_data_v2(&mut copy, &auth_key(), Side::Client).expect("client key");
                let session_id = i64::from_le_bytes(plain[8..16].try_into().expect("session id"));
                self.envelope =
                    Some(EncryptedSession::with_session_id(auth_key(), session_id, SALT, Side::Server));
            }
            let msg = self.envelope().decrypt(&mut payload).expect("client envelope");
            self.unpack(msg.msg_id, msg.salt, msg.body);
        }
    }

    fn unpack(&mut self, msg_id: i64, salt: i64, body: Vec<u8>) {
        if body[..4] == MSG_CONTAINER_ID.to_le_bytes() {
            let container = MessageContainer::from_bytes(&body[4..]).expect("container");
            for m in container.messages {
                self.unpack(m.msg_id, salt, m.body);
            }
        } else if body[..4] != types::MsgsAck::CONSTRUCTOR_ID.to_le_bytes() {
            self.inbox.push_back(Request { msg_id, salt, body });
        }
    }

    fn envelope(&self) -> &EncryptedSession {
        self.envelope.as_ref().expect("client spoke first")
    }

    pub async fn send(&mut self, body: &[u8]) {
        self.seq += 1;
        let seq_no = self.seq * 2 - 1;
        let payload = self.envelope().encrypt(msg_id::next() + 1, seq_no, body);
        self.writer.send(&payload).await.expect("client is reading");
    }

    /// A transport-level status code instead of an encrypted frame.
    pub async fn send_code(&mut self, code: i32) {
        self.writer.send(&code.to_le_bytes()).await.expect("client is reading");
    }

    pub async fn reply(&mut self, req_msg_id: i64, result: Vec<u8>) {
        self.send(&RpcResult { req_msg_id, result }.to_bytes()).await;
    }

    pub async fn reply_error(&mut self, req_msg_id: i64, error_code: i32, error_message: &str) {
        let error = enums::RpcError::RpcError(types::RpcError {
            error_code,
            error_message: error_message.into(),
        });
        self.reply(req_msg_id, error.to_bytes()).await;
    }

    pub async fn bad_server_salt(&mut self, req: &Request, new_server_salt: i64) {
        let notice = enums::BadMsgNotification::BadServerSalt(types::BadServerSalt {
            bad_msg_id: req.msg_id,
            bad_msg_seqno: 0,
            error_code: 48,
            new_server_salt,
        });
        self.send(&notice.to_bytes()).await;
    }

    /// Answer the service traffic every session produces: pings and salt
    /// requests. Returns `false` for anything else.
    pub async fn serve_service(&mut self, req: &Request) -> bool {
        match req.constructor_id() {
            functions::Ping::CONSTRUCTOR_ID | functions::PingDelayDisconnect::CONSTRUCTOR_ID => {
                let ping_id = i64::from_le_bytes(req.body[4..12].try_into().expect("ping id"));
                let pong = enums::Pong::Pong(types::Pong { msg_id: req.msg_id, ping_id });
                self.send(&pong.to_bytes()).await;
                true
            }
            functions::GetFutureSalts::CONSTRUCTOR_ID => {
                let now = msg_id::server_now() as i32;
                let salts = enums::FutureSalts::FutureSalts(types::FutureSalts {
                    req_msg_id: req.msg_id,
                    now,
                    salts: RawVec(vec![types::FutureSalt {
                        valid_since: now - 60,
                        valid_until: now + 3600,
                        salt:        SALT,
                    }]),
                });
                self.send(&salts.to_bytes()).await;
                true
            }
            _ => false,
        }
    }

    /// Serve a connection handshake: the first message gets
    /// `new_session_created`, wrong salts get `bad_server_salt`, and the
    /// layer init is answered with a `config`.
    pub async fn handshake(&mut self) {
        loop {
            let req = self.recv().await.expect("handshake traffic");
            if !self.greeted {
                self.greeted = true;
                let created = enums::NewSession::NewSessionCreated(types::NewSessionCreated {
                    first_msg_id: req.msg_id,
                    unique_id:    0x1234,
                    server_salt:  SALT,
                });
                self.send(&created.to_bytes()).await;
            }
            if req.salt != SALT {
                self.bad_server_salt(&req, SALT).await;
                continue;
            }
            if self.serve_service(&req).await {
                continue;
            }
            assert_eq!(req.constructor_id(), functions::InvokeWithLayer::<functions::help::GetConfig>::CONSTRUCTOR_ID);
            let config = enums::Config::Config(types::Config { this_dc: 2, ..types::Config::default() });
            self.reply(req.msg_id, config.to_bytes()).await;
            return;
        }
    }

    /// Next message that is not pings or salt requests (those are answered).
    pub async fn next_request(&mut self) -> Option<Request> {
        loop {
            let req = self.recv().await?;
            if !self.serve_service(&req).await {
                return Some(req);
            }
        }
    }
}
