//! Packet transport over the daemon's local seqpacket socket.
//!
//! One [`Connection`] carries exactly one request/response exchange. The
//! daemon reads each field of a request as its own packet, so callers send
//! the length, the command line and any blob separately. Replies may arrive
//! split over several packets and are collected until the expected size is
//! reached; a peer that closes early is a [`ControlError::Framing`] error
//! carrying how far the read got.

use std::{
    fmt, io,
    net::Shutdown,
    path::{Path, PathBuf},
};

use chasm_common::{incoming, internal, outgoing};
use tokio_seqpacket::UnixSeqpacket;

use crate::error::{ControlError, Result};

/// An open connection to the control socket
pub struct Connection {
    socket: Option<UnixSeqpacket>,
    path: PathBuf,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Connection {
    /// Connect to the control socket at `path`
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Connection`] if the socket is missing or
    /// refuses the connection
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        internal!("Connecting to control socket {}", path.display());

        let socket = UnixSeqpacket::connect(path)
            .await
            .map_err(|source| ControlError::Connection {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            socket: Some(socket),
            path: path.to_path_buf(),
        })
    }

    /// Wrap an already-connected socket
    #[must_use]
    pub fn from_socket(socket: UnixSeqpacket, path: impl Into<PathBuf>) -> Self {
        Self {
            socket: Some(socket),
            path: path.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn socket(&self) -> Result<&UnixSeqpacket> {
        self.socket.as_ref().ok_or(ControlError::ConnectionClosed)
    }

    /// Send `bytes` as a single packet
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the kernel accepts
    /// fewer bytes than the packet holds
    pub async fn send_packet(&mut self, bytes: &[u8]) -> Result<()> {
        let sent = self.socket()?.send(bytes).await?;
        if sent != bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("packet truncated to {sent} of {} bytes", bytes.len()),
            )
            .into());
        }
        outgoing!("Sent {sent} byte packet");
        Ok(())
    }

    /// Fill `buf` completely, one packet at a time
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Framing`] if the peer closes before `buf` is
    /// full
    pub async fn recv_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let socket = self.socket()?;
        let expected = buf.len();
        let mut received = 0;

        while received < expected {
            let read = socket.recv(&mut buf[received..]).await?;
            if read == 0 {
                incoming!(
                    level = DEBUG,
                    "Peer closed after {received} of {expected} bytes"
                );
                return Err(ControlError::Framing { expected, received });
            }
            received += read;
        }

        incoming!("Received {expected} bytes");
        Ok(())
    }

    /// Receive exactly `n` bytes
    ///
    /// # Errors
    ///
    /// See [`Connection::recv_into`]
    pub async fn recv_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.recv_into(&mut buf).await?;
        Ok(buf)
    }

    /// Receive a fixed-size record
    ///
    /// # Errors
    ///
    /// See [`Connection::recv_into`]
    pub async fn recv_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.recv_into(&mut buf).await?;
        Ok(buf)
    }

    /// Shut the connection down. Closing twice is a no-op.
    pub fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            if let Err(err) = socket.shutdown(Shutdown::Both) {
                internal!(level = DEBUG, "Ignoring shutdown error: {err}");
            }
            internal!("Closed connection to {}", self.path.display());
        }
    }
}
