//! Socket transports for FINS frames.
//!
//! A [`FrameTransport`] moves complete FINS frames and knows nothing about
//! their content. Two implementations exist:
//!
//! - [`UdpTransport`]: one datagram per frame.
//! - [`TcpTransport`]: frames wrapped in FINS/TCP envelopes, preceded by the
//!   node address handshake.
//!
//! Receiving is done by a single background thread, so `recv_frame` polls
//! with a short read timeout and returns `Ok(None)` when nothing arrived.
//! Sending may happen from any thread.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, UdpSocket};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{FinsError, Result};
use crate::tcp::{NodeAssignment, TcpCommand, TcpFrame, TcpFrameDecoder};

/// Default FINS port, for both UDP and TCP.
pub const DEFAULT_FINS_PORT: u16 = 9600;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum FINS frame size.
pub const MAX_PACKET_SIZE: usize = 2048;

/// How long a receive call blocks before returning `Ok(None)`.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Locks a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Longest wait a deadline is clamped to.
const MAX_WAIT: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Instant `timeout` from now, clamped when the clock cannot represent it.
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(MAX_WAIT))
        .unwrap_or(now)
}

fn is_poll_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Frame-level transport used by the session.
pub trait FrameTransport: Send + Sync {
    /// Sends one complete FINS frame.
    fn send_frame(&self, frame: &[u8]) -> Result<()>;

    /// Receives one complete FINS frame. Returns `Ok(None)` when the poll
    /// interval elapsed without data. An error means the transport is dead.
    fn recv_frame(&self) -> Result<Option<Vec<u8>>>;

    /// Unblocks pending I/O and closes the socket where possible.
    fn shutdown(&self);

    /// Remote address.
    fn peer_addr(&self) -> SocketAddr;
}

/// UDP transport: one FINS frame per datagram.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Binds an ephemeral local port and connects it to the PLC.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the socket cannot be created or configured.
    pub fn connect(peer: SocketAddr) -> Result<Self> {
        let bind_addr: SocketAddr = if peer.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(peer)?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        tracing::debug!(%peer, local = ?socket.local_addr().ok(), "UDP socket ready");
        Ok(Self { socket, peer })
    }
}

impl FrameTransport for UdpTransport {
    fn send_frame(&self, frame: &[u8]) -> Result<()> {
        self.socket.send(frame)?;
        Ok(())
    }

    fn recv_frame(&self) -> Result<Option<Vec<u8>>> {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        match self.socket.recv(&mut buf) {
            Ok(len) => Ok(Some(buf[..len].to_vec())),
            Err(e) if is_poll_timeout(&e) => Ok(None),
            // ICMP port unreachable surfaces here; the PLC may come back.
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
                ) =>
            {
                tracing::debug!(peer = %self.peer, error = %e, "UDP peer unreachable");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn shutdown(&self) {}

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

struct TcpReader {
    stream: TcpStream,
    decoder: TcpFrameDecoder,
}

impl TcpReader {
    /// Reads until a complete envelope is buffered. Returns `Ok(None)` when
    /// the read timed out first.
    fn next_envelope(&mut self) -> Result<Option<TcpFrame>> {
        let mut chunk = [0u8; MAX_PACKET_SIZE];
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(Some(frame));
            }
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(FinsError::connection_failure("connection closed by PLC")),
                Ok(len) => self.decoder.push(&chunk[..len]),
                Err(e) if is_poll_timeout(&e) => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// TCP transport: FINS frames in FINS/TCP envelopes.
pub struct TcpTransport {
    reader: Mutex<TcpReader>,
    writer: Mutex<TcpStream>,
    control: TcpStream,
    peer: SocketAddr,
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport").field("peer", &self.peer).finish()
    }
}

impl TcpTransport {
    /// Opens the TCP connection. The handshake is a separate step.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailure` if the connection cannot be established
    /// within `timeout`.
    pub fn connect(peer: SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&peer, timeout).map_err(|e| {
            FinsError::connection_failure(format!("cannot connect to {}: {}", peer, e))
        })?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_read_timeout(Some(POLL_INTERVAL))?;

        let writer = stream.try_clone()?;
        let control = stream.try_clone()?;
        tracing::debug!(%peer, "TCP connection established");

        Ok(Self {
            reader: Mutex::new(TcpReader {
                stream,
                decoder: TcpFrameDecoder::new(),
            }),
            writer: Mutex::new(writer),
            control,
            peer,
        })
    }

    /// Performs the node address handshake.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailure` on rejection, timeout, or a malformed
    /// reply.
    pub fn handshake(&self, client_node: u8, timeout: Duration) -> Result<NodeAssignment> {
        self.write_envelope(&TcpFrame::node_address_request(client_node))?;

        let deadline = deadline_after(timeout);
        let mut reader = lock(&self.reader);
        loop {
            if Instant::now() >= deadline {
                return Err(FinsError::connection_failure(
                    "timed out waiting for node address response",
                ));
            }
            let frame = reader.next_envelope().map_err(|e| {
                FinsError::connection_failure(format!("FINS/TCP handshake failed: {}", e))
            })?;
            match frame {
                Some(frame) if frame.command() == Some(TcpCommand::ConnectionConfirmation) => {
                    tracing::trace!("connection confirmation during handshake");
                }
                Some(frame) => {
                    return NodeAssignment::from_frame(&frame).map_err(|e| match e {
                        FinsError::MalformedResponse { reason } => FinsError::connection_failure(
                            format!("invalid node address response: {}", reason),
                        ),
                        other => other,
                    });
                }
                None => {}
            }
        }
    }

    fn write_envelope(&self, frame: &TcpFrame) -> Result<()> {
        let bytes = frame.encode();
        let mut writer = lock(&self.writer);
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }
}

impl FrameTransport for TcpTransport {
    fn send_frame(&self, frame: &[u8]) -> Result<()> {
        self.write_envelope(&TcpFrame::fins(frame))
    }

    fn recv_frame(&self) -> Result<Option<Vec<u8>>> {
        let mut reader = lock(&self.reader);
        loop {
            let Some(frame) = reader.next_envelope()? else {
                return Ok(None);
            };
            match frame.command() {
                Some(TcpCommand::Frame) if frame.error_code == 0 => return Ok(Some(frame.payload)),
                Some(TcpCommand::FrameSendError) | Some(TcpCommand::Frame) => {
                    tracing::warn!(
                        peer = %self.peer,
                        error_code = frame.error_code,
                        reason = crate::tcp::tcp_error_description(frame.error_code),
                        "PLC reported a FINS/TCP send error"
                    );
                }
                _ => {
                    tracing::trace!(command = frame.command, "ignoring FINS/TCP envelope");
                }
            }
        }
    }

    fn shutdown(&self) {
        if let Err(e) = self.control.shutdown(Shutdown::Both) {
            tracing::trace!(error = %e, "TCP shutdown");
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
