use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use crate::core::Result;

/// One exclusive stream connection to a device's control port.
///
/// All reads are bounded by the configured timeout; exceeding it
/// surfaces as a timed-out IO error, which the session treats like any
/// other transport failure.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    timeout: Duration,
}

impl Connection {
    /// Opens a connection, bounding the connect itself by the timeout
    pub async fn open(addr: SocketAddr, io_timeout: Duration) -> Result<Self> {
        let stream = timeout(io_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;

        Ok(Connection {
            stream,
            timeout: io_timeout,
        })
    }

    /// Writes a full message
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        trace!(len = bytes.len(), "send");
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    /// Reads up to `expected` bytes.
    ///
    /// Returns once the buffer is full or the peer closes the stream;
    /// a closed stream yields a short (possibly empty) buffer rather
    /// than an error. Each read is bounded by the timeout.
    pub async fn recv(&mut self, expected: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; expected];
        let mut filled = 0;

        while filled < expected {
            let n = timeout(self.timeout, self.stream.read(&mut buf[filled..]))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "receive timed out"))??;
            if n == 0 {
                break;
            }
            filled += n;
        }

        buf.truncate(filled);
        trace!(len = filled, expected, "recv");
        Ok(buf)
    }

    /// The remote address this connection is bound to
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }
}
