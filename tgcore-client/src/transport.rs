//! Byte channel to a DC: connectors and obfuscated intermediate framing.
//!
//! Every connection starts with the 64-byte obfuscation header, then carries
//! `[len: u32 LE][payload]` frames XOR'd with an AES-CTR keystream in each
//! direction. A [`Connector`] only has to produce the raw duplex stream, so
//! tests can swap TCP for an in-memory pipe.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tgcore_crypto::obfuscated::{self, INTERMEDIATE_TAG};
use tgcore_crypto::{Keystream, ObfuscatedCipher};
use tgcore_mtproto::Frame;
use tgcore_mtproto::transport::{encode_frame, frame_len};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;

use crate::dc::DcAddress;
use crate::errors::TransportError;
use crate::socks5::Socks5Config;

// ─── Connector ────────────────────────────────────────────────────────────────

/// Anything that can carry the MTProto byte stream.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

pub type BoxedStream = Box<dyn AsyncStream>;

pub type ConnectFuture<'a> = Pin<Box<dyn Future<Output = io::Result<BoxedStream>> + Send + 'a>>;

/// Opens raw streams to DCs.
pub trait Connector: Send + Sync + 'static {
    fn connect<'a>(&'a self, dc: &'a DcAddress) -> ConnectFuture<'a>;
}

/// Plain TCP, optionally through a SOCKS5 proxy.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    pub proxy:     Option<Socks5Config>,
    pub keepalive: Option<Duration>,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self { proxy: None, keepalive: Some(Duration::from_secs(60)) }
    }
}

impl Connector for TcpConnector {
    fn connect<'a>(&'a self, dc: &'a DcAddress) -> ConnectFuture<'a> {
        Box::pin(async move {
            let addr = dc.socket_addr();
            let stream = match &self.proxy {
                Some(proxy) => proxy.connect(dc).await?,
                None => TcpStream::connect(&addr).await?,
            };
            stream.set_nodelay(true)?;
            if let Some(time) = self.keepalive {
                SockRef::from(&stream).set_tcp_keepalive(&TcpKeepalive::new().with_time(time))?;
            }
            tracing::debug!("[tgcore] tcp connected to {dc}");
            Ok(Box::new(stream) as BoxedStream)
        })
    }
}

// ─── Framing ──────────────────────────────────────────────────────────────────

/// Receiving half of an obfuscated intermediate connection.
pub struct FrameReader {
    read:   ReadHalf<BoxedStream>,
    cipher: Keystream,
}

impl FrameReader {
    /// Read the next frame. A clean end of stream yields [`Frame::Closed`].
    pub async fn recv(&mut self) -> Result<Frame, TransportError> {
        let mut prefix = [0u8; 4];
        match self.read.read_exact(&mut prefix).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(Frame::Closed),
            Err(e) => return Err(e.into()),
        }
        self.cipher.apply(&mut prefix);
        let len = frame_len(prefix)?;

        let mut payload = vec![0u8; len];
        self.read.read_exact(&mut payload).await?;
        self.cipher.apply(&mut payload);
        Ok(Frame::from_payload(payload))
    }
}

/// Sending half of an obfuscated intermediate connection.
pub struct FrameWriter {
    write:  WriteHalf<BoxedStream>,
    cipher: Keystream,
}

impl FrameWriter {
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let mut frame = encode_frame(payload);
        self.cipher.apply(&mut frame);
        self.write.write_all(&frame).await?;
        self.write.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        if let Err(e) = self.write.shutdown().await {
            tracing::trace!("[tgcore] shutdown: {e}");
        }
    }
}

/// Split an obfuscated stream whose header has been exchanged.
pub fn split(stream: BoxedStream, cipher: ObfuscatedCipher) -> (FrameReader, FrameWriter) {
    let (send, recv) = cipher.split();
    let (read, write) = tokio::io::split(stream);
    (FrameReader { read, cipher: recv }, FrameWriter { write, cipher: send })
}

/// Connect to `dc` and send the obfuscation header.
pub async fn connect(
    connector: &dyn Connector,
    dc:        &DcAddress,
) -> Result<(FrameReader, FrameWriter), TransportError> {
    let mut stream = connector.connect(dc).await?;
    let (header, cipher) = obfuscated::client_handshake(INTERMEDIATE_TAG, None);
    stream.write_all(&header).await?;
    stream.flush().await?;
    Ok(split(stream, cipher))
}

/// Server end of [`connect`]: read the header and check it asks for
/// intermediate framing.
pub async fn accept(mut stream: BoxedStream) -> Result<(FrameReader, FrameWriter), TransportError> {
    let mut header = [0u8; 64];
    stream.read_exact(&mut header).await?;
    let (cipher, tag) = obfuscated::server_handshake(&header, None);
    if tag != INTERMEDIATE_TAG {
        return Err(TransportError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported transport tag {tag:02x?}"),
        )));
    }
    Ok(split(stream, cipher))
}
