//! Single-threaded readiness reactor.
//!
//! One `mio::Poll` instance multiplexes the listener and every peer
//! connection. All parsing, dispatch, and response writing happen inline on
//! the reactor thread; there are no worker threads and no per-connection
//! tasks. Per-connection failures are contained: the offending connection is
//! torn down and the loop keeps serving everyone else.

use crate::config::NetworkConfig;
use crate::connection::{Connection, ReadProgress, WriteProgress};
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use rowgate_protocol::{Message, Payload, Request, Response, BINARY_SERVER_TYPE};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const LISTENER: Token = Token(0);
const EVENT_CAPACITY: usize = 256;
const POLL_TIMEOUT: Duration = Duration::from_millis(200);
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Prefix of the raw-binary echo response.
const BINARY_ECHO_PREFIX: &[u8] = b"First 10 bytes of request: ";
const BINARY_ECHO_LEN: usize = 10;

/// Cooperative stop signal for a running reactor, usable from any thread.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    /// Asks the reactor to stop after its current poll cycle.
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// The event loop: listener, connection table, and dispatcher.
pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    connections: HashMap<Token, Connection<TcpStream>>,
    dispatcher: Dispatcher,
    config: NetworkConfig,
    next_token: usize,
    shutdown: Arc<AtomicBool>,
}

impl Reactor {
    /// Binds the listener and registers it with a fresh poll instance.
    pub fn bind(config: NetworkConfig, dispatcher: Dispatcher) -> Result<Self, ServerError> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(config.bind_addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        info!(addr = %config.bind_addr, actions = ?dispatcher.actions(), "listening");

        Ok(Self {
            poll,
            listener,
            connections: HashMap::new(),
            dispatcher,
            config,
            next_token: 1,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Returns a handle that can stop the run loop from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the event loop until a shutdown is requested.
    ///
    /// Only listener-level and poll-level failures propagate out of here;
    /// everything scoped to a single connection is logged and contained.
    pub fn run(&mut self) -> Result<(), ServerError> {
        let mut events = Events::with_capacity(EVENT_CAPACITY);
        let mut last_report = Instant::now();

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                Ok(()) => {}
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ServerError::Io(e)),
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_ready(),
                    token => self.service_connection(token, event.is_readable(), event.is_writable()),
                }
            }

            if last_report.elapsed() >= REPORT_INTERVAL {
                debug!(active = self.connections.len(), "active peers");
                self.sweep_idle();
                last_report = Instant::now();
            }
        }

        info!("reactor stopped");
        Ok(())
    }

    /// Accepts until the listener would block.
    ///
    /// Accept and registration failures affect only the socket being
    /// admitted, never the listener: the socket is dropped with a warning
    /// and the loop keeps serving. Under fd exhaustion the pending queue is
    /// retried on the next listener event.
    fn accept_ready(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer_addr)) => {
                    if self.connections.len() >= self.config.max_connections {
                        warn!(%peer_addr, "connection limit reached, refusing peer");
                        continue;
                    }

                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%peer_addr, error = %e, "set_nodelay failed");
                    }

                    let token = Token(self.next_token);
                    self.next_token += 1;

                    // Write interest is added only once a response is queued.
                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                    {
                        warn!(%peer_addr, error = %e, "register failed, dropping peer");
                        continue;
                    }

                    debug!(%peer_addr, token = token.0, "accepted");
                    self.connections
                        .insert(token, Connection::new(stream, peer_addr));
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // EMFILE, aborted handshakes and the like.
                    warn!(error = %e, "accept failed");
                    return;
                }
            }
        }
    }

    /// Services one connection's readiness; all failures end at this frame.
    fn service_connection(&mut self, token: Token, readable: bool, writable: bool) {
        if readable {
            let outcome = match self.connections.get_mut(&token) {
                Some(conn) => conn.handle_readable(),
                None => return,
            };
            match outcome {
                Ok(ReadProgress::Ready(message)) => self.respond(token, &message),
                Ok(ReadProgress::Incomplete) => {}
                Ok(ReadProgress::PeerClosed) => self.close_connection(token, "peer closed"),
                Err(e) => {
                    if let Some(conn) = self.connections.get(&token) {
                        warn!(peer_addr = %conn.peer_addr(), error = %e, "read failed");
                    }
                    self.close_connection(token, "read error");
                }
            }
        }

        if writable {
            self.flush_connection(token);
        }
    }

    /// Builds, frames, and queues the response for a complete request, then
    /// tries an immediate flush before falling back to write readiness.
    fn respond(&mut self, token: Token, request: &Message) {
        let response = build_response(&self.dispatcher, request);
        let framed = match response.to_frame() {
            Ok(framed) => framed,
            Err(e) => {
                if let Some(conn) = self.connections.get(&token) {
                    warn!(peer_addr = %conn.peer_addr(), error = %e, "response framing failed");
                }
                self.close_connection(token, "framing error");
                return;
            }
        };

        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        conn.queue_response(&framed);

        match conn.handle_writable() {
            Ok(WriteProgress::Drained) => self.close_connection(token, "response sent"),
            Ok(WriteProgress::Pending) => {
                if let Err(e) =
                    self.poll
                        .registry()
                        .reregister(conn.stream_mut(), token, Interest::WRITABLE)
                {
                    warn!(error = %e, "reregister failed");
                    self.close_connection(token, "reregister error");
                }
            }
            Err(e) => {
                warn!(error = %e, "write failed");
                self.close_connection(token, "write error");
            }
        }
    }

    /// Continues draining a partially written response.
    fn flush_connection(&mut self, token: Token) {
        let outcome = match self.connections.get_mut(&token) {
            Some(conn) => conn.handle_writable(),
            None => return,
        };
        match outcome {
            Ok(WriteProgress::Drained) => self.close_connection(token, "response sent"),
            Ok(WriteProgress::Pending) => {}
            Err(e) => {
                warn!(error = %e, "write failed");
                self.close_connection(token, "write error");
            }
        }
    }

    /// Removes a connection from the poll registry and the table.
    fn close_connection(&mut self, token: Token, reason: &str) {
        if let Some(mut conn) = self.connections.remove(&token) {
            debug!(peer_addr = %conn.peer_addr(), token = token.0, reason, "closing");
            if let Err(e) = self.poll.registry().deregister(conn.stream_mut()) {
                debug!(error = %e, "deregister failed");
            }
            conn.close();
        }
    }

    /// Drops connections that have been quiet past the configured timeout.
    fn sweep_idle(&mut self) {
        let Some(timeout) = self.config.idle_timeout() else {
            return;
        };
        let now = Instant::now();
        let stale: Vec<Token> = self
            .connections
            .iter()
            .filter(|(_, conn)| now.duration_since(conn.last_activity()) > timeout)
            .map(|(token, _)| *token)
            .collect();
        for token in stale {
            self.close_connection(token, "idle timeout");
        }
    }
}

/// Maps a complete request message to its response message.
///
/// `text/json` requests go through the dispatcher; anything with a JSON body
/// that is not a valid `{action, value}` envelope gets a well-formed error
/// result. Raw-binary requests get the first-bytes echo with the server's
/// binary content type.
fn build_response(dispatcher: &Dispatcher, request: &Message) -> Message {
    match &request.payload {
        Payload::Json(value) => {
            let response = match serde_json::from_value::<Request>(value.clone()) {
                Ok(request) => dispatcher.dispatch(&request),
                Err(e) => Response::new(serde_json::Value::String(format!(
                    "Error: invalid request: {e}"
                ))),
            };
            match serde_json::to_value(&response) {
                Ok(value) => Message::json(value),
                // Response is a plain struct of JSON values; serialization
                // cannot fail, but keep the peer's reply well-formed anyway.
                Err(_) => Message::json(serde_json::json!({"result": "Error: internal"})),
            }
        }
        Payload::Binary(bytes) => {
            let take = bytes.len().min(BINARY_ECHO_LEN);
            let mut echo = Vec::with_capacity(BINARY_ECHO_PREFIX.len() + take);
            echo.extend_from_slice(BINARY_ECHO_PREFIX);
            echo.extend_from_slice(&bytes[..take]);
            Message::binary(BINARY_SERVER_TYPE, echo.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::register_builtin;
    use bytes::Bytes;
    use rowgate_protocol::BINARY_CLIENT_TYPE;
    use rowgate_store::{MemStore, Store};
    use serde_json::json;

    fn demo_dispatcher() -> Dispatcher {
        let store = MemStore::new();
        store.create_table("organization", &["name", "uni_code", "department_uni_codes"]);
        store
            .insert(
                "organization",
                &[
                    "name".to_string(),
                    "uni_code".to_string(),
                    "department_uni_codes".to_string(),
                ],
                &[json!("Corp"), json!(12345), json!([12345])],
            )
            .unwrap();

        let mut dispatcher = Dispatcher::new();
        register_builtin(&mut dispatcher, Arc::new(store));
        dispatcher
    }

    #[test]
    fn test_build_response_read_table() {
        let dispatcher = demo_dispatcher();
        let request = Message::json(json!({"action": "read_table", "value": "organization"}));

        let response = build_response(&dispatcher, &request);
        match response.payload {
            Payload::Json(value) => {
                assert_eq!(value, json!({"result": [["Corp", 12345, [12345]]]}))
            }
            Payload::Binary(_) => panic!("expected JSON response"),
        }
    }

    #[test]
    fn test_build_response_unknown_action() {
        let dispatcher = demo_dispatcher();
        let request = Message::json(json!({"action": "self_destruct", "value": null}));

        let response = build_response(&dispatcher, &request);
        match response.payload {
            Payload::Json(value) => {
                assert_eq!(value["result"], "Error: invalid action self_destruct")
            }
            Payload::Binary(_) => panic!("expected JSON response"),
        }
    }

    #[test]
    fn test_build_response_not_an_envelope() {
        let dispatcher = demo_dispatcher();
        let request = Message::json(json!(["just", "an", "array"]));

        let response = build_response(&dispatcher, &request);
        match response.payload {
            Payload::Json(value) => {
                let result = value["result"].as_str().unwrap();
                assert!(result.starts_with("Error: invalid request"), "{result}");
            }
            Payload::Binary(_) => panic!("expected JSON response"),
        }
    }

    #[test]
    fn test_build_response_binary_echo() {
        let dispatcher = demo_dispatcher();
        let request = Message::binary(
            BINARY_CLIENT_TYPE,
            Bytes::from_static(b"0123456789abcdef"),
        );

        let response = build_response(&dispatcher, &request);
        assert_eq!(response.content_type, BINARY_SERVER_TYPE);
        match response.payload {
            Payload::Json(_) => panic!("expected binary response"),
            Payload::Binary(bytes) => {
                assert_eq!(&bytes[..], b"First 10 bytes of request: 0123456789")
            }
        }
    }

    // The live-socket tests share the process fd table, so they run one at
    // a time.
    fn net_guard() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
        LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bind_reactor() -> Reactor {
        let config = NetworkConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            max_connections: 8,
            idle_timeout_secs: 0,
        };
        Reactor::bind(config, demo_dispatcher()).unwrap()
    }

    fn spawn_reactor() -> (
        std::net::SocketAddr,
        ShutdownHandle,
        std::thread::JoinHandle<Result<(), ServerError>>,
    ) {
        let mut reactor = bind_reactor();
        let addr = reactor.local_addr().unwrap();
        let handle = reactor.shutdown_handle();
        let join = std::thread::spawn(move || reactor.run());
        (addr, handle, join)
    }

    fn decode_reply(bytes: &[u8]) -> Message {
        let declared = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let header = rowgate_protocol::Header::decode(&bytes[2..2 + declared]).unwrap();
        Message::from_parts(&header, &bytes[2 + declared..]).unwrap()
    }

    #[test]
    fn test_end_to_end_exchange() {
        use std::io::{Read, Write};

        let _net = net_guard();
        let (addr, shutdown, join) = spawn_reactor();

        let mut stream = std::net::TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let frame = Message::json(json!({"action": "read_table", "value": "organization"}))
            .to_frame()
            .unwrap();
        stream.write_all(&frame).unwrap();

        // The server closes after its single response, so read to EOF.
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).unwrap();
        let message = decode_reply(&reply);
        match message.payload {
            Payload::Json(value) => {
                assert_eq!(value, json!({"result": [["Corp", 12345, [12345]]]}))
            }
            Payload::Binary(_) => panic!("expected JSON response"),
        }

        shutdown.shutdown();
        join.join().unwrap().unwrap();
    }

    #[test]
    fn test_end_to_end_malformed_header_gets_no_response() {
        use std::io::{Read, Write};

        let _net = net_guard();
        let (addr, shutdown, join) = spawn_reactor();

        let mut stream = std::net::TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let garbage = b"this is not a header";
        let mut bytes = (garbage.len() as u16).to_be_bytes().to_vec();
        bytes.extend_from_slice(garbage);
        stream.write_all(&bytes).unwrap();

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).unwrap();
        assert!(reply.is_empty());

        shutdown.shutdown();
        join.join().unwrap().unwrap();
    }

    #[test]
    fn test_accept_failure_leaves_reactor_running() {
        use std::io::{Read, Write};

        let _net = net_guard();
        let mut reactor = bind_reactor();
        let addr = reactor.local_addr().unwrap();
        let shutdown = reactor.shutdown_handle();

        // A connection already waiting in the listen backlog...
        let early = std::net::TcpStream::connect(addr).unwrap();

        // ...and no file descriptors left to accept it with.
        let mut hogs = Vec::new();
        for _ in 0..1_000_000 {
            match std::fs::File::open("/dev/null") {
                Ok(f) => hogs.push(f),
                Err(_) => break,
            }
        }

        let join = std::thread::spawn(move || reactor.run());
        std::thread::sleep(Duration::from_millis(300));
        drop(hogs);

        // The failed accept must not have taken the run loop down.
        let mut stream = std::net::TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let frame = Message::json(json!({"action": "read_table", "value": "organization"}))
            .to_frame()
            .unwrap();
        stream.write_all(&frame).unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).unwrap();
        assert!(!reply.is_empty());

        drop(early);
        shutdown.shutdown();
        join.join().unwrap().unwrap();
    }

    #[test]
    fn test_end_to_end_interleaved_clients() {
        use std::io::{Read, Write};

        let _net = net_guard();
        let (addr, shutdown, join) = spawn_reactor();

        // Two connections in flight at once; the slow one sends its frame in
        // two halves around the fast one's complete exchange.
        let frame = Message::json(json!({"action": "read_table", "value": "organization"}))
            .to_frame()
            .unwrap();
        let mut slow = std::net::TcpStream::connect(addr).unwrap();
        slow.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        slow.write_all(&frame[..5]).unwrap();

        let mut fast = std::net::TcpStream::connect(addr).unwrap();
        fast.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        fast.write_all(&frame).unwrap();
        let mut fast_reply = Vec::new();
        fast.read_to_end(&mut fast_reply).unwrap();
        assert!(!fast_reply.is_empty());

        slow.write_all(&frame[5..]).unwrap();
        let mut slow_reply = Vec::new();
        slow.read_to_end(&mut slow_reply).unwrap();
        assert_eq!(decode_reply(&slow_reply), decode_reply(&fast_reply));

        shutdown.shutdown();
        join.join().unwrap().unwrap();
    }

    #[test]
    fn test_build_response_short_binary_echo() {
        let dispatcher = demo_dispatcher();
        let request = Message::binary(BINARY_CLIENT_TYPE, Bytes::from_static(b"abc"));

        let response = build_response(&dispatcher, &request);
        match response.payload {
            Payload::Json(_) => panic!("expected binary response"),
            Payload::Binary(bytes) => {
                assert_eq!(&bytes[..], b"First 10 bytes of request: abc")
            }
        }
    }
}
