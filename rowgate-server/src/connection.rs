//! Per-connection state and the incremental protocol parser.
//!
//! A [`Connection`] owns one socket's receive/send buffers and its parse
//! cursor. Bytes arrive in arbitrary fragments across readiness events; the
//! parser only advances once enough bytes are buffered and never blocks
//! waiting for more. Partial reads and writes never regress state.
//!
//! Each connection models exactly one request/response exchange: after the
//! queued response drains, the connection closes. There is no pipelining
//! and no keep-alive.

use crate::error::ServerError;
use bytes::{Buf, BytesMut};
use rowgate_protocol::{Header, Message, ProtocolError, LENGTH_PREFIX_SIZE};
use std::io::{self, ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::time::Instant;

const RECV_CHUNK_SIZE: usize = 4096;
const INITIAL_BUFFER_CAPACITY: usize = 4096;

/// Parse cursor state, strictly ordered; no transition skips a state.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnState {
    /// Waiting for the 2-byte header length prefix.
    AwaitingLength,
    /// Waiting for the declared header bytes.
    AwaitingHeader { header_len: usize },
    /// Waiting for `content-length` body bytes.
    AwaitingBody { header: Header },
    /// A complete request has been handed off for dispatch.
    RequestReady,
    /// The framed response sits in the send buffer.
    ResponseQueued,
    /// Terminal. Entered on drain-after-response, peer shutdown, or error.
    Closed,
}

/// Outcome of servicing a read-readiness event.
#[derive(Debug, PartialEq)]
pub enum ReadProgress {
    /// Not enough bytes buffered yet; state retained for the next event.
    Incomplete,
    /// Exactly one complete request was parsed.
    Ready(Message),
    /// The peer shut down or reset; the connection is now closed.
    PeerClosed,
}

/// Outcome of servicing a write-readiness event.
#[derive(Debug, PartialEq, Eq)]
pub enum WriteProgress {
    /// Unsent bytes remain; write interest should stay registered.
    Pending,
    /// The send buffer drained and the connection closed itself.
    Drained,
}

/// One peer connection.
///
/// Generic over the transport so the state machine can be driven by an
/// in-memory stream in tests; the reactor instantiates it with
/// `mio::net::TcpStream`. All buffers and parse state are owned exclusively
/// by this object and touched only from the reactor thread.
pub struct Connection<S> {
    stream: S,
    peer_addr: SocketAddr,
    state: ConnState,
    recv_buf: BytesMut,
    send_buf: BytesMut,
    last_activity: Instant,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S, peer_addr: SocketAddr) -> Self {
        Self {
            stream,
            peer_addr,
            state: ConnState::AwaitingLength,
            recv_buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            send_buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            last_activity: Instant::now(),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn state(&self) -> &ConnState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ConnState::Closed)
    }

    /// Time of the last read or write on this connection, for the reactor's
    /// idle sweep.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// The underlying transport, exposed for readiness registration.
    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Drains the socket into the receive buffer and advances the parser.
    ///
    /// Reads until the transport would block. A reset closes the connection
    /// from any state. A zero-length read (orderly peer shutdown) closes it
    /// only if the bytes buffered ahead of the FIN do not complete a
    /// request: a peer may legally half-close right after writing its
    /// request and still gets its response. A framing violation closes the
    /// connection and surfaces the error to the caller for teardown.
    pub fn handle_readable(&mut self) -> Result<ReadProgress, ServerError> {
        if self.is_closed() {
            return Ok(ReadProgress::PeerClosed);
        }
        self.last_activity = Instant::now();

        let mut peer_eof = false;
        let mut chunk = [0u8; RECV_CHUNK_SIZE];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    peer_eof = true;
                    break;
                }
                Ok(n) => self.recv_buf.extend_from_slice(&chunk[..n]),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(ref e) if is_disconnect(e.kind()) => {
                    self.close();
                    return Ok(ReadProgress::PeerClosed);
                }
                Err(e) => {
                    self.close();
                    return Err(ServerError::Io(e));
                }
            }
        }

        let progress = self.advance()?;
        if peer_eof && progress == ReadProgress::Incomplete {
            self.close();
            return Ok(ReadProgress::PeerClosed);
        }
        Ok(progress)
    }

    /// Advances the parser as far as the buffered bytes allow.
    fn advance(&mut self) -> Result<ReadProgress, ServerError> {
        loop {
            match &self.state {
                ConnState::AwaitingLength => {
                    if self.recv_buf.len() < LENGTH_PREFIX_SIZE {
                        return Ok(ReadProgress::Incomplete);
                    }
                    let header_len = self.recv_buf.get_u16() as usize;
                    if header_len == 0 {
                        self.close();
                        return Err(ProtocolError::MalformedLength.into());
                    }
                    self.state = ConnState::AwaitingHeader { header_len };
                }
                ConnState::AwaitingHeader { header_len } => {
                    let header_len = *header_len;
                    if self.recv_buf.len() < header_len {
                        return Ok(ReadProgress::Incomplete);
                    }
                    let header_bytes = self.recv_buf.split_to(header_len);
                    match Header::decode(&header_bytes) {
                        Ok(header) => self.state = ConnState::AwaitingBody { header },
                        Err(e) => {
                            self.close();
                            return Err(e.into());
                        }
                    }
                }
                ConnState::AwaitingBody { header } => {
                    if self.recv_buf.len() < header.content_length {
                        return Ok(ReadProgress::Incomplete);
                    }
                    let header = header.clone();
                    let body = self.recv_buf.split_to(header.content_length);
                    match Message::from_parts(&header, &body) {
                        Ok(message) => {
                            self.state = ConnState::RequestReady;
                            return Ok(ReadProgress::Ready(message));
                        }
                        Err(e) => {
                            self.close();
                            return Err(e.into());
                        }
                    }
                }
                ConnState::RequestReady | ConnState::ResponseQueued | ConnState::Closed => {
                    // One request per connection; surplus bytes are ignored.
                    return Ok(ReadProgress::Incomplete);
                }
            }
        }
    }

    /// Appends framed response bytes to the send buffer.
    pub fn queue_response(&mut self, bytes: &[u8]) {
        self.send_buf.extend_from_slice(bytes);
        self.state = ConnState::ResponseQueued;
    }

    /// Flushes the send buffer as far as the transport allows.
    ///
    /// On full drain after a queued response the connection closes itself;
    /// the caller is expected to deregister and drop it.
    pub fn handle_writable(&mut self) -> Result<WriteProgress, ServerError> {
        self.last_activity = Instant::now();

        while !self.send_buf.is_empty() {
            match self.stream.write(&self.send_buf) {
                Ok(0) => {
                    self.close();
                    return Err(ServerError::Io(io::Error::new(
                        ErrorKind::WriteZero,
                        "failed to write to peer",
                    )));
                }
                Ok(n) => self.send_buf.advance(n),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    return Ok(WriteProgress::Pending)
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(ref e) if is_disconnect(e.kind()) => {
                    self.close();
                    return Ok(WriteProgress::Drained);
                }
                Err(e) => {
                    self.close();
                    return Err(ServerError::Io(e));
                }
            }
        }

        match self.state {
            ConnState::ResponseQueued | ConnState::Closed => {
                self.close();
                Ok(WriteProgress::Drained)
            }
            // Nothing queued yet; keep the connection alive.
            _ => Ok(WriteProgress::Pending),
        }
    }

    /// Closes the connection. Safe to call repeatedly; only the first call
    /// has any effect. The socket itself is released when the connection is
    /// dropped.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.state = ConnState::Closed;
        self.recv_buf.clear();
        self.send_buf.clear();
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
    )
}
