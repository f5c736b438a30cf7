//! Mock FINS PLCs for integration tests.
#![allow(dead_code)]

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use omron_fins_client::{
    Client, ClientConfig, FinsHeader, Protocol, TcpCommand, TcpFrame, TcpFrameDecoder,
    FINS_HEADER_SIZE,
};
use tracing::Level;

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .without_time()
            .with_test_writer()
            .try_init();
    });
}

/// Produces the frames to send back for one received FINS command.
pub type Handler = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

/// Builds a response to `request` with the given end code and data.
pub fn reply(request: &[u8], end_code: u16, data: &[u8]) -> Vec<u8> {
    let header = FinsHeader::from_bytes(request).unwrap().response();
    let mut frame = header.to_bytes().to_vec();
    frame.extend_from_slice(&request[FINS_HEADER_SIZE..FINS_HEADER_SIZE + 2]);
    frame.extend_from_slice(&end_code.to_be_bytes());
    frame.extend_from_slice(data);
    frame
}

/// Command code of a request frame.
pub fn command_code(request: &[u8]) -> u16 {
    u16::from_be_bytes([request[10], request[11]])
}

/// Body of a request frame (after the command code).
pub fn body(request: &[u8]) -> &[u8] {
    &request[FINS_HEADER_SIZE + 2..]
}

/// A PLC that answers every memory area read with ascending words and
/// acknowledges every other command.
pub fn echo_handler() -> Handler {
    Box::new(|request| {
        let data = if command_code(request) == 0x0101 {
            let body = body(request);
            let count = u16::from_be_bytes([body[4], body[5]]);
            let bit = body[0] < 0x80;
            (0..count)
                .flat_map(|i| {
                    if bit {
                        vec![(i % 2) as u8]
                    } else {
                        i.to_be_bytes().to_vec()
                    }
                })
                .collect()
        } else {
            Vec::new()
        };
        vec![reply(request, 0x0000, &data)]
    })
}

pub struct MockPlc {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<Vec<u8>>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MockPlc {
    /// FINS/UDP PLC on an ephemeral port.
    pub fn udp(mut handler: Handler) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let addr = socket.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let stop = Arc::clone(&stop);
            let requests = Arc::clone(&requests);
            thread::spawn(move || {
                let mut buf = [0u8; 2048];
                while !stop.load(Ordering::Relaxed) {
                    let (len, from) = match socket.recv_from(&mut buf) {
                        Ok(received) => received,
                        Err(_) => continue,
                    };
                    let request = buf[..len].to_vec();
                    requests.lock().unwrap().push(request.clone());
                    for frame in handler(&request) {
                        socket.send_to(&frame, from).unwrap();
                    }
                }
            })
        };

        Self {
            addr,
            requests,
            stop,
            handle: Some(handle),
        }
    }

    /// FINS/TCP PLC that assigns the given node numbers in the handshake.
    pub fn tcp(client_node: u8, server_node: u8, mut handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let stop = Arc::clone(&stop);
            let requests = Arc::clone(&requests);
            thread::spawn(move || {
                let (mut stream, _) = listener.accept().unwrap();
                stream
                    .set_read_timeout(Some(Duration::from_millis(20)))
                    .unwrap();
                let mut decoder = TcpFrameDecoder::new();
                let mut buf = [0u8; 2048];

                while !stop.load(Ordering::Relaxed) {
                    match stream.read(&mut buf) {
                        Ok(0) => break,
                        Ok(len) => decoder.push(&buf[..len]),
                        Err(e) if is_poll_timeout(&e) => continue,
                        Err(_) => break,
                    }
                    while let Ok(Some(envelope)) = decoder.next_frame() {
                        match envelope.command() {
                            Some(TcpCommand::NodeAddressRequest) => {
                                let response =
                                    TcpFrame::node_address_response(client_node, server_node);
                                write_all(&mut stream, &response.encode());
                            }
                            Some(TcpCommand::Frame) => {
                                requests.lock().unwrap().push(envelope.payload.clone());
                                for frame in handler(&envelope.payload) {
                                    write_all(&mut stream, &TcpFrame::fins(&frame).encode());
                                }
                            }
                            _ => {}
                        }
                    }
                }
            })
        };

        Self {
            addr,
            requests,
            stop,
            handle: Some(handle),
        }
    }

    /// Client configuration pointing at this PLC.
    pub fn config(&self, protocol: Protocol) -> ClientConfig {
        ClientConfig::new(self.addr.ip(), 10, 1)
            .with_port(self.addr.port())
            .with_protocol(protocol)
            .with_timeout(Duration::from_secs(2))
    }

    /// Connected client.
    pub fn client(&self, protocol: Protocol) -> Client {
        init_tracing();
        Client::new(self.config(protocol)).unwrap()
    }

    /// Requests received so far.
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockPlc {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn is_poll_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn write_all(stream: &mut TcpStream, bytes: &[u8]) {
    let _ = stream.write_all(bytes);
}
