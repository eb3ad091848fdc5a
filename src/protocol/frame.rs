//! Frame struct and frame assembly for sending.
//!
//! Uses `bytes::Bytes` for the body so received frames can be shared cheaply.
//!
//! # Example
//!
//! ```
//! use pollwire::protocol::{build_frame, Frame, HEADER_SIZE};
//!
//! let bytes = build_frame("alice", b"PING").unwrap();
//! assert_eq!(bytes.len(), HEADER_SIZE + 4);
//!
//! let frame = Frame::new("alice", "PING");
//! assert_eq!(frame.body(), b"PING");
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{encode_length, pad_id, validate_message_size, HEADER_SIZE};
use crate::error::Result;

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sender id with padding removed.
    pub id: String,
    /// Body bytes.
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(id: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }

    /// Sender id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Body bytes.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body length.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Encode this frame for the wire.
    pub fn encode(&self) -> Result<Bytes> {
        build_frame(&self.id, &self.body)
    }
}

/// Build a complete frame: `length ++ padded id ++ body`.
///
/// Fails with `MessageTooBig` or `IdTooBig` before anything is allocated.
pub fn build_frame(id: &str, body: &[u8]) -> Result<Bytes> {
    validate_message_size(body.len())?;
    let padded = pad_id(id)?;
    let length = encode_length(body.len() as u32)?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
    buf.put_slice(&length);
    buf.put_slice(&padded);
    buf.put_slice(body);
    Ok(buf.freeze())
}
