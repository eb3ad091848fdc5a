//! Wire format encoding and decoding.
//!
//! Implements the 16-byte header format:
//! ```text
//! ┌──────────┬──────────────────┬────────────────┐
//! │ Length   │ Sender ID        │ Body           │
//! │ 3 bytes  │ 13 bytes         │ Length bytes   │
//! │ uint24 BE│ space-padded     │                │
//! └──────────┴──────────────────┴────────────────┘
//! ```
//!
//! The length field always carries the body length.

use crate::error::{PollwireError, Result};

/// One mebibyte, the upper bound of the length field.
pub const MEGABYTE: usize = 1024 * 1024;

/// Size of the big-endian length field.
pub const LENGTH_FIELD_SIZE: usize = 3;

/// Size of the space-padded sender id field.
pub const ID_FIELD_SIZE: usize = 13;

/// Header size in bytes (length + id, fixed, exactly 16).
pub const HEADER_SIZE: usize = LENGTH_FIELD_SIZE + ID_FIELD_SIZE;

/// Largest body a single frame may carry (1,048,560 bytes).
pub const MAX_MESSAGE_SIZE: usize = MEGABYTE - HEADER_SIZE;

/// Padding byte for short ids.
const ID_PAD: u8 = b' ';

/// Encode a body length as 3 big-endian bytes.
///
/// # Example
///
/// ```
/// use pollwire::protocol::encode_length;
///
/// assert_eq!(encode_length(0x010203).unwrap(), [0x01, 0x02, 0x03]);
/// ```
pub fn encode_length(n: u32) -> Result<[u8; LENGTH_FIELD_SIZE]> {
    if n as usize > MEGABYTE {
        return Err(PollwireError::NumberTooBig(n));
    }
    let [_, a, b, c] = n.to_be_bytes();
    Ok([a, b, c])
}

/// Decode a 3-byte big-endian length field.
pub fn decode_length(bytes: &[u8]) -> Result<u32> {
    match bytes.len() {
        n if n < LENGTH_FIELD_SIZE => Err(PollwireError::TooFewBytes(n)),
        n if n > LENGTH_FIELD_SIZE => Err(PollwireError::TooManyBytes(n)),
        _ => Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])),
    }
}

/// Right-pad an id with spaces to exactly 13 bytes.
///
/// # Example
///
/// ```
/// use pollwire::protocol::pad_id;
///
/// assert_eq!(&pad_id("alice").unwrap(), b"alice        ");
/// ```
pub fn pad_id(id: &str) -> Result<[u8; ID_FIELD_SIZE]> {
    let raw = id.as_bytes();
    if raw.len() > ID_FIELD_SIZE {
        return Err(PollwireError::IdTooBig(raw.len()));
    }
    let mut buf = [ID_PAD; ID_FIELD_SIZE];
    buf[..raw.len()].copy_from_slice(raw);
    Ok(buf)
}

/// Strip trailing padding to recover the logical id.
///
/// An all-space field becomes the empty string.
pub fn trim_id(padded: &[u8]) -> String {
    let end = padded
        .iter()
        .rposition(|&b| b != ID_PAD)
        .map_or(0, |i| i + 1);
    String::from_utf8_lossy(&padded[..end]).into_owned()
}

/// Check a body length against the protocol maximum.
#[inline]
pub fn validate_message_size(size: usize) -> Result<()> {
    if size > MAX_MESSAGE_SIZE {
        return Err(PollwireError::MessageTooBig {
            size,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}
