//! TAP frame layout.
//!
//! ```text
//! +----------------+------------------+------------------------+
//! | header length  | header           | payload                |
//! | 2 bytes, BE    | L bytes, JSON    | content-length bytes   |
//! +----------------+------------------+------------------------+
//! ```
//!
//! The 2-byte length prefix is the single fixed-size element of the
//! protocol; everything after it is self-describing. The prefix caps the
//! header at 65535 bytes, enforced at encode time.

use crate::error::ProtocolError;
use crate::header::Header;
use bytes::{BufMut, BytesMut};

/// Size of the fixed big-endian header length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Hard protocol ceiling on the encoded header, set by the 2-byte prefix.
pub const MAX_HEADER_SIZE: usize = u16::MAX as usize;

/// Produces the full wire bytes for a header/payload pair.
///
/// Rejects headers whose JSON encoding exceeds [`MAX_HEADER_SIZE`] with
/// `HeaderTooLarge`.
pub fn frame(header: &Header, payload: &[u8]) -> Result<BytesMut, ProtocolError> {
    let header_bytes = header.encode()?;
    if header_bytes.len() > MAX_HEADER_SIZE {
        return Err(ProtocolError::HeaderTooLarge {
            size: header_bytes.len(),
        });
    }

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + header_bytes.len() + payload.len());
    buf.put_u16(header_bytes.len() as u16);
    buf.put_slice(&header_bytes);
    buf.put_slice(payload);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let payload = br#"{"action":"read_table","value":"organization"}"#;
        let header = Header::new("text/json", "utf-8", payload.len());
        let framed = frame(&header, payload).unwrap();

        let declared = u16::from_be_bytes([framed[0], framed[1]]) as usize;
        assert_eq!(framed.len(), LENGTH_PREFIX_SIZE + declared + payload.len());

        let decoded = Header::decode(&framed[LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + declared])
            .unwrap();
        assert_eq!(decoded, header);
        assert_eq!(&framed[LENGTH_PREFIX_SIZE + declared..], payload);
    }

    #[test]
    fn test_frame_empty_payload() {
        let header = Header::new("binary/custom-client-binary-type", "binary", 0);
        let framed = frame(&header, &[]).unwrap();
        let declared = u16::from_be_bytes([framed[0], framed[1]]) as usize;
        assert_eq!(framed.len(), LENGTH_PREFIX_SIZE + declared);
    }

    #[test]
    fn test_frame_header_too_large() {
        // A content-type value alone pushes the encoded header over 65535.
        let header = Header::new("x".repeat(MAX_HEADER_SIZE + 1), "utf-8", 0);
        let err = frame(&header, &[]).unwrap_err();
        assert!(matches!(err, ProtocolError::HeaderTooLarge { .. }));
    }
}
