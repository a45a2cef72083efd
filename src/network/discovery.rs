use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{DiscoveredBulb, Result, ScanConfig};

/// Payload that makes controllers announce themselves
pub const ANNOUNCE_PAYLOAD: &[u8] = b"HF-A11ASSISTHREAD";

/// Collects controllers announcing themselves on the local network.
///
/// One broadcast, then a bounded listen loop. The scan ends when the
/// timeout elapses or the scanner is cancelled; cancellation is checked
/// at every receive boundary and unblocks the loop promptly.
pub struct Scanner {
    config: ScanConfig,
    cancel: CancellationToken,
}

impl Scanner {
    /// Creates a scanner with the default broadcast target and timeout
    pub fn new() -> Self {
        Self::with_config(ScanConfig::default())
    }

    /// Creates a scanner with an explicit configuration
    pub fn with_config(config: ScanConfig) -> Self {
        Scanner {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Returns a handle that cancels a running scan
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels a running scan
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Broadcasts the announce payload and collects replies until the
    /// timeout elapses or the scan is cancelled.
    ///
    /// Each well-formed reply is one comma-delimited `addr,id,model`
    /// triple; malformed replies are skipped.
    pub async fn scan(&self) -> Result<Vec<DiscoveredBulb>> {
        let socket = broadcast_socket()?;
        socket.send_to(ANNOUNCE_PAYLOAD, self.config.target).await?;

        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let mut found = Vec::new();
        let mut buf = [0u8; 512];

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("discovery scan cancelled");
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => break,
                received = socket.recv_from(&mut buf) => {
                    let (len, from) = received?;
                    match parse_reply(&buf[..len]) {
                        Some(bulb) => {
                            debug!(%from, id = %bulb.id, model = %bulb.model, "controller announced");
                            found.push(bulb);
                        }
                        None => warn!(%from, "skipping malformed discovery reply"),
                    }
                }
            }
        }

        Ok(found)
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the UDP socket used for the discovery broadcast
fn broadcast_socket() -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_broadcast(true)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from(([0, 0, 0, 0], 0)).into())?;
    Ok(UdpSocket::from_std(socket.into())?)
}

/// Parses one `addr,id,model` announce reply
fn parse_reply(bytes: &[u8]) -> Option<DiscoveredBulb> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut parts = text.trim().split(',');
    let addr = parts.next()?.parse().ok()?;
    let id = parts.next()?.to_string();
    let model = parts.next()?.to_string();

    Some(DiscoveredBulb { addr, id, model })
}
