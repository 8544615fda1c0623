//! Receiver and sender configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use pdl_01_product_io::ProductEncoding;

/// Default receiver port.
pub const DEFAULT_PORT: u16 = 11235;

/// Default per-read timeout on receiver sockets.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Receiver settings.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Name used in logs.
    pub name: String,
    pub bind_addr: SocketAddr,
    /// Longest wait for any single read; `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Most payload bytes accepted per product; `None` is unlimited.
    pub size_limit: Option<u64>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            name: "receiver".into(),
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            size_limit: None,
        }
    }
}

/// Sender settings.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    /// Longest wait for a reply read; `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Payload encoding.
    pub encoding: ProductEncoding,
    /// Use the marker and handshake; `false` speaks legacy mode.
    pub versioned: bool,
}

impl SenderConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(15),
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            encoding: ProductEncoding::Xml,
            versioned: true,
        }
    }
}
