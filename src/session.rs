//! Request/response correlation over one socket.
//!
//! A [`TransportSession`] owns a transport and a background receive thread.
//! Callers on any number of threads [`submit`](TransportSession::submit)
//! commands; each gets a [`PendingReply`] bound to the SID stamped into its
//! header. The receive thread matches replies by SID and hands each one to
//! its waiter, so replies may arrive in any order.
//!
//! ```text
//!  caller ──submit──▶ pending[sid] ──frame──▶ PLC
//!  caller ◀──wait──── pending[sid] ◀──reply── receive thread
//! ```
//!
//! Delivery and timeout cleanup both happen under the pending-table lock:
//! a late reply can never reach a newer request that reused its SID.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::client::{ClientConfig, Protocol};
use crate::command::{Command, CommandCode};
use crate::error::{FinsError, Result};
use crate::header::{FinsHeader, NodeAddress, FINS_HEADER_SIZE};
use crate::response::FinsResponse;
use crate::sequence::{SidAllocator, SID_SPACE};
use crate::tcp::NodeAssignment;
use crate::transport::{deadline_after, lock, FrameTransport, TcpTransport, UdpTransport};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No socket, or the session was closed.
    Disconnected,
    /// Opening the socket.
    Connecting,
    /// Exchanging FINS/TCP node addresses.
    Handshaking,
    /// Accepting requests.
    Ready,
}

struct PendingRequest {
    command_code: u16,
    response_tx: SyncSender<Result<FinsResponse>>,
}

struct Shared {
    transport: Box<dyn FrameTransport>,
    pending: Mutex<HashMap<u8, PendingRequest>>,
    state: Mutex<SessionState>,
    sids: SidAllocator,
    closing: AtomicBool,
    source: NodeAddress,
    destination: NodeAddress,
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        let mut current = lock(&self.state);
        if *current != state {
            tracing::debug!(from = ?*current, to = ?state, "session state change");
            *current = state;
        }
    }

    /// Hands a received frame to its waiter.
    fn dispatch(&self, frame: &[u8]) {
        if frame.len() < FINS_HEADER_SIZE {
            tracing::trace!(len = frame.len(), "discarding runt frame");
            return;
        }
        let header = match FinsHeader::from_bytes(frame) {
            Ok(header) => header,
            Err(_) => return,
        };
        if !header.is_response() {
            tracing::trace!(sid = header.sid, icf = header.icf, "discarding non-response frame");
            return;
        }

        let mut pending = lock(&self.pending);
        let Some(request) = pending.remove(&header.sid) else {
            tracing::warn!(sid = header.sid, "discarding reply for unknown SID");
            return;
        };

        let result = FinsResponse::from_bytes(frame).and_then(|response| {
            response.check_command(request.command_code)?;
            Ok(response)
        });
        if let Err(e) = &result {
            tracing::warn!(sid = header.sid, error = %e, "malformed reply");
        } else {
            tracing::trace!(sid = header.sid, len = frame.len(), "reply delivered");
        }
        // Capacity is 1 and only this send ever happens.
        let _ = request.response_tx.try_send(result);
    }

    /// Fails every outstanding request.
    fn fail_all(&self, error: &FinsError) {
        let mut pending = lock(&self.pending);
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), error = %error, "failing pending requests");
        }
        for (_, request) in pending.drain() {
            let _ = request.response_tx.try_send(Err(error.duplicate()));
        }
    }

    fn is_open(&self) -> bool {
        !self.closing.load(Ordering::Acquire)
    }
}

fn receive_loop(shared: Arc<Shared>) {
    tracing::debug!(peer = %shared.transport.peer_addr(), "receive thread started");
    while shared.is_open() {
        match shared.transport.recv_frame() {
            Ok(Some(frame)) => shared.dispatch(&frame),
            Ok(None) => {}
            Err(e) => {
                if shared.closing.swap(true, Ordering::AcqRel) {
                    break;
                }
                tracing::error!(error = %e, "receive failed, closing session");
                shared.transport.shutdown();
                shared.set_state(SessionState::Disconnected);
                // Broken framing reaches waiters as is; I/O and peer close
                // become connection failures.
                let error = match e {
                    FinsError::MalformedResponse { .. } | FinsError::ConnectionFailure { .. } => e,
                    other => FinsError::connection_failure(format!("receive failed: {}", other)),
                };
                shared.fail_all(&error);
                break;
            }
        }
    }
    tracing::debug!("receive thread stopped");
}

/// A submitted request waiting for its reply.
///
/// Dropping it without calling [`wait`](Self::wait) cancels the request and
/// frees its SID.
pub struct PendingReply {
    sid: u8,
    deadline: Instant,
    rx: Receiver<Result<FinsResponse>>,
    shared: Arc<Shared>,
    finished: bool,
}

impl PendingReply {
    /// SID stamped into the request.
    pub fn sid(&self) -> u8 {
        self.sid
    }

    /// Instant after which [`wait`](Self::wait) gives up.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Blocks until the reply arrives or the deadline passes.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` after the deadline, `ConnectionFailure` if the
    /// session closed, and `MalformedResponse` for a reply that does not
    /// match the request.
    pub fn wait(mut self) -> Result<FinsResponse> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let outcome = self.rx.recv_timeout(remaining);
        self.finished = true;
        match outcome {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                let mut pending = lock(&self.shared.pending);
                // The reply may have been delivered while the lock was free.
                match self.rx.try_recv() {
                    Ok(result) => result,
                    Err(TryRecvError::Disconnected) => {
                        Err(FinsError::connection_failure("session closed"))
                    }
                    Err(TryRecvError::Empty) => {
                        pending.remove(&self.sid);
                        tracing::debug!(sid = self.sid, "request timed out");
                        Err(FinsError::Timeout)
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(FinsError::connection_failure("session closed"))
            }
        }
    }

    /// Abandons the request and frees its SID.
    pub fn cancel(self) {
        tracing::debug!(sid = self.sid, "request cancelled");
        // `Drop` releases the pending entry.
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut pending = lock(&self.shared.pending);
        // A delivered reply means the entry is already gone and the SID may
        // belong to someone else now.
        if let Err(TryRecvError::Empty) = self.rx.try_recv() {
            pending.remove(&self.sid);
        }
    }
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("sid", &self.sid)
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// One connection to a PLC with concurrent request correlation.
///
/// `TransportSession` is `Send + Sync`; share it behind an `Arc` to issue
/// requests from several threads.
pub struct TransportSession {
    shared: Arc<Shared>,
    receiver: Mutex<Option<JoinHandle<()>>>,
    nodes: Option<NodeAssignment>,
}

impl TransportSession {
    /// Opens a session as described by `config`.
    ///
    /// UDP sessions are ready at once. TCP sessions connect, run the node
    /// address handshake and then use the assigned node numbers as SA1/DA1.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailure` if the socket cannot be opened or the
    /// handshake fails.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        tracing::debug!(
            peer = %config.plc_addr,
            protocol = %config.protocol,
            state = ?SessionState::Connecting,
            "opening session"
        );

        match config.protocol {
            Protocol::Udp => {
                let transport = UdpTransport::connect(config.plc_addr).map_err(|e| {
                    FinsError::connection_failure(format!(
                        "cannot open UDP socket to {}: {}",
                        config.plc_addr, e
                    ))
                })?;
                Ok(Self::start(
                    Box::new(transport),
                    config.source,
                    config.destination,
                    None,
                ))
            }
            Protocol::Tcp => {
                let transport = TcpTransport::connect(config.plc_addr, config.timeout)?;
                tracing::debug!(state = ?SessionState::Handshaking, "sending node address request");
                let nodes = transport.handshake(config.source.node, config.timeout)?;
                tracing::info!(
                    client_node = nodes.client_node,
                    server_node = nodes.server_node,
                    "FINS/TCP node addresses assigned"
                );
                Ok(Self::start(
                    Box::new(transport),
                    config.source.with_node(nodes.client_node),
                    config.destination.with_node(nodes.server_node),
                    Some(nodes),
                ))
            }
        }
    }

    /// Starts a session over an already connected transport.
    pub fn with_transport(
        transport: Box<dyn FrameTransport>,
        source: NodeAddress,
        destination: NodeAddress,
    ) -> Self {
        Self::start(transport, source, destination, None)
    }

    fn start(
        transport: Box<dyn FrameTransport>,
        source: NodeAddress,
        destination: NodeAddress,
        nodes: Option<NodeAssignment>,
    ) -> Self {
        let shared = Arc::new(Shared {
            transport,
            pending: Mutex::new(HashMap::new()),
            state: Mutex::new(SessionState::Ready),
            sids: SidAllocator::new(),
            closing: AtomicBool::new(false),
            source,
            destination,
        });

        let thread_shared = Arc::clone(&shared);
        let receiver = thread::Builder::new()
            .name("fins-receiver".to_string())
            .spawn(move || receive_loop(thread_shared));

        let receiver = match receiver {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "cannot spawn receive thread");
                shared.closing.store(true, Ordering::Release);
                shared.set_state(SessionState::Disconnected);
                None
            }
        };

        tracing::info!(
            peer = %shared.transport.peer_addr(),
            source = %source,
            destination = %destination,
            "session ready"
        );

        Self {
            shared,
            receiver: Mutex::new(receiver),
            nodes,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *lock(&self.shared.state)
    }

    /// Returns whether the session accepts requests.
    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Source address stamped into every header.
    pub fn source(&self) -> NodeAddress {
        self.shared.source
    }

    /// Destination address stamped into every header.
    pub fn destination(&self) -> NodeAddress {
        self.shared.destination
    }

    /// Node numbers from the FINS/TCP handshake, `None` for UDP.
    pub fn node_assignment(&self) -> Option<NodeAssignment> {
        self.nodes
    }

    /// Number of requests waiting for a reply.
    pub fn pending_count(&self) -> usize {
        lock(&self.shared.pending).len()
    }

    /// Sends a command and returns a handle to wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailure` if the session is closed, if all 256 SIDs
    /// are outstanding, or if the send fails.
    pub fn submit(
        &self,
        code: CommandCode,
        body: &[u8],
        timeout: Duration,
    ) -> Result<PendingReply> {
        let (response_tx, rx) = mpsc::sync_channel(1);
        let sid = {
            let mut pending = lock(&self.shared.pending);
            // `disconnect` raises `closing` before draining under this lock,
            // so nothing is inserted after the drain.
            if !self.shared.is_open() {
                return Err(FinsError::connection_failure("session is closed"));
            }
            if pending.len() >= SID_SPACE {
                return Err(FinsError::connection_failure(
                    "all 256 service IDs are awaiting replies",
                ));
            }
            let sid = loop {
                let candidate = self.shared.sids.next();
                if !pending.contains_key(&candidate) {
                    break candidate;
                }
            };
            pending.insert(
                sid,
                PendingRequest {
                    command_code: code.value(),
                    response_tx,
                },
            );
            sid
        };

        let reply = PendingReply {
            sid,
            deadline: deadline_after(timeout),
            rx,
            shared: Arc::clone(&self.shared),
            finished: false,
        };

        let header = FinsHeader::new_command(self.shared.destination, self.shared.source, sid);
        let mut frame = Vec::with_capacity(FINS_HEADER_SIZE + 2 + body.len());
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(&code.to_bytes());
        frame.extend_from_slice(body);

        tracing::trace!(sid, code = ?code, len = frame.len(), "sending request");
        // On failure `reply` is dropped, which releases the SID.
        self.shared.transport.send_frame(&frame)?;
        Ok(reply)
    }

    /// Sends a command and blocks until its reply or the timeout.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit) and [`PendingReply::wait`].
    pub fn send_and_wait(
        &self,
        code: CommandCode,
        body: &[u8],
        timeout: Duration,
    ) -> Result<FinsResponse> {
        self.submit(code, body, timeout)?.wait()
    }

    /// Executes a typed command and decodes its reply.
    ///
    /// # Errors
    ///
    /// Returns transport errors from [`send_and_wait`](Self::send_and_wait)
    /// and decode errors from [`Command::decode`].
    pub fn execute<C: Command>(&self, command: &C, timeout: Duration) -> Result<C::Output> {
        let response = self.send_and_wait(command.code(), &command.body(), timeout)?;
        command.decode(&response)
    }

    /// Closes the socket, fails waiting calls and stops the receive thread.
    ///
    /// Safe to call more than once.
    pub fn disconnect(&self) {
        let already_closing = self.shared.closing.swap(true, Ordering::AcqRel);
        self.shared.transport.shutdown();
        self.shared
            .fail_all(&FinsError::connection_failure("session disconnected"));
        self.shared.set_state(SessionState::Disconnected);

        if let Some(handle) = lock(&self.receiver).take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::warn!("receive thread panicked");
            }
        }
        if !already_closing {
            tracing::info!(peer = %self.shared.transport.peer_addr(), "session disconnected");
        }
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("peer", &self.shared.transport.peer_addr())
            .field("state", &self.state())
            .field("source", &self.shared.source)
            .field("destination", &self.shared.destination)
            .finish()
    }
}
