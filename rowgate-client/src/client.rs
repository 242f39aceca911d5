//! Blocking one-shot client.
//!
//! Each call opens a fresh connection, sends one framed request, reads one
//! framed response, and closes. That matches the server's one exchange per
//! connection lifecycle; there is nothing to pool or pipeline.

use crate::error::ClientError;
use bytes::Bytes;
use rowgate_protocol::{
    Header, Message, ProtocolError, Request, Response, LENGTH_PREFIX_SIZE,
};
use serde_json::Value;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use tracing::debug;

/// Blocking rowgate client.
#[derive(Debug, Clone)]
pub struct Client {
    addr: SocketAddr,
    timeout: Option<Duration>,
}

impl Client {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: None,
        }
    }

    /// Sets a read/write timeout applied to every exchange.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sends an `{action, value}` request and decodes the `{result}` reply.
    pub fn call(&self, action: &str, value: Value) -> Result<Response, ClientError> {
        let request = Request::new(action, value);
        let envelope = serde_json::to_value(&request).map_err(ProtocolError::from)?;
        let message = Message::json(envelope);
        let reply = self.exchange(&message)?;

        match reply.payload {
            rowgate_protocol::Payload::Json(value) => {
                serde_json::from_value(value.clone()).map_err(|_| {
                    ClientError::UnexpectedResponse(value.to_string())
                })
            }
            rowgate_protocol::Payload::Binary(_) => Err(ClientError::UnexpectedResponse(
                "binary reply to a JSON request".to_string(),
            )),
        }
    }

    /// Convenience wrapper for the `read_table` action.
    pub fn read_table(&self, table: &str) -> Result<Response, ClientError> {
        self.call("read_table", Value::String(table.to_string()))
    }

    /// Sends raw bytes with the client binary content type and returns the
    /// server's reply message as-is.
    pub fn send_binary(&self, bytes: &[u8]) -> Result<Message, ClientError> {
        let message = Message::binary(
            rowgate_protocol::BINARY_CLIENT_TYPE,
            Bytes::copy_from_slice(bytes),
        );
        self.exchange(&message)
    }

    /// One full request/response exchange on a fresh connection.
    fn exchange(&self, message: &Message) -> Result<Message, ClientError> {
        let mut stream = TcpStream::connect(self.addr)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;

        let framed = message.to_frame()?;
        stream.write_all(&framed)?;
        debug!(addr = %self.addr, bytes = framed.len(), "request sent");

        read_message(&mut stream)
    }
}

/// Reads one complete framed message from a blocking reader.
///
/// An orderly close before the full frame arrives maps to
/// [`ClientError::NoResponse`], which is what the server produces for a
/// request it refuses to answer.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Message, ClientError> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    read_frame_bytes(reader, &mut prefix)?;
    let header_len = u16::from_be_bytes(prefix) as usize;

    let mut header_bytes = vec![0u8; header_len];
    read_frame_bytes(reader, &mut header_bytes)?;
    let header = Header::decode(&header_bytes)?;

    let mut body = vec![0u8; header.content_length];
    read_frame_bytes(reader, &mut body)?;
    Ok(Message::from_parts(&header, &body)?)
}

fn read_frame_bytes<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), ClientError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            ClientError::NoResponse
        } else {
            ClientError::Io(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowgate_protocol::Payload;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn test_read_message_complete_frame() {
        let framed = Message::json(json!({"result": [["Corp", 12345]]}))
            .to_frame()
            .unwrap();
        let mut cursor = Cursor::new(framed.to_vec());

        let message = read_message(&mut cursor).unwrap();
        match message.payload {
            Payload::Json(value) => assert_eq!(value["result"], json!([["Corp", 12345]])),
            Payload::Binary(_) => panic!("expected JSON payload"),
        }
    }

    #[test]
    fn test_read_message_empty_stream_is_no_response() {
        let mut cursor = Cursor::new(Vec::new());
        let err = read_message(&mut cursor).unwrap_err();
        assert!(matches!(err, ClientError::NoResponse));
    }

    #[test]
    fn test_read_message_truncated_body_is_no_response() {
        let framed = Message::json(json!({"result": "ok"})).to_frame().unwrap();
        let mut cursor = Cursor::new(framed[..framed.len() - 3].to_vec());

        let err = read_message(&mut cursor).unwrap_err();
        assert!(matches!(err, ClientError::NoResponse));
    }

    #[test]
    fn test_read_message_garbage_header() {
        let header = b"not json at all";
        let mut bytes = (header.len() as u16).to_be_bytes().to_vec();
        bytes.extend_from_slice(header);
        let mut cursor = Cursor::new(bytes);

        let err = read_message(&mut cursor).unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }
}
