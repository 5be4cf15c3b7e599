//! Connections tunnelled through a SOCKS5 proxy.
//!
//! ```rust,no_run
//! use tgcore_client::{SessionConfig, Socks5Config};
//!
//! let cfg = SessionConfig {
//!     proxy: Some(Socks5Config::new("127.0.0.1:1080").with_credentials("user", "secret")),
//!     ..Default::default()
//! };
//! ```

use std::fmt;
use std::io;

use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;

use crate::dc::DcAddress;

/// Username/password pair for RFC 1929 authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Socks5Config {
    /// `host:port` of the proxy.
    pub addr:        String,
    pub credentials: Option<Credentials>,
}

impl Socks5Config {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), credentials: None }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials { username: username.into(), password: password.into() });
        self
    }

    /// Ask the proxy for a TCP stream to `dc`. The DC address is passed to the
    /// proxy as a literal IP, never resolved locally.
    pub async fn connect(&self, dc: &DcAddress) -> io::Result<TcpStream> {
        let target = (dc.ip.as_str(), dc.port);
        tracing::debug!("[tgcore] DC{}: tunnelling through socks5 proxy {}", dc.dc_id, self.addr);
        let stream = match &self.credentials {
            Some(c) if c.username.is_empty() => {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "socks5 username is empty"));
            }
            Some(c) => {
                Socks5Stream::connect_with_password(self.addr.as_str(), target, &c.username, &c.password).await
            }
            None => Socks5Stream::connect(self.addr.as_str(), target).await,
        };
        stream
            .map(Socks5Stream::into_inner)
            .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, format!("socks5 proxy {}: {e}", self.addr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_not_printed() {
        let cfg = Socks5Config::new("127.0.0.1:1080").with_credentials("alice", "hunter2");
        let shown = format!("{cfg:?}");
        assert!(shown.contains("alice"));
        assert!(!shown.contains("hunter2"));
    }

    #[tokio::test]
    async fn empty_username_is_rejected_before_connecting() {
        let cfg = Socks5Config::new("127.0.0.1:1").with_credentials("", "x");
        let dc = DcAddress { dc_id: 2, ip: "149.154.167.51".into(), port: 443 };
        let err = cfg.connect(&dc).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
