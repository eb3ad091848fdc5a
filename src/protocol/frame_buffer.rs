//! Frame assembler for accumulating partial reads.
//!
//! Incoming socket bytes are pushed into a [`CircularBuffer`]; frames are
//! popped out of it in three phases, each a separate barrier:
//! - `Length`: need 3 bytes
//! - `Id`: length known, need 13 bytes
//! - `Body`: length and id known, need `length` bytes
//!
//! The phase survives between calls, so a read that stops halfway through a
//! frame (e.g. on a poll timeout) resumes at the same place.
//!
//! # Example
//!
//! ```
//! use pollwire::protocol::{build_frame, FrameAssembler};
//!
//! let mut assembler = FrameAssembler::new();
//! let bytes = build_frame("alice", b"PONG").unwrap();
//!
//! assembler.push(&bytes[..10]).unwrap();
//! assert!(assembler.try_extract().unwrap().is_none());
//!
//! assembler.push(&bytes[10..]).unwrap();
//! let frame = assembler.try_extract().unwrap().unwrap();
//! assert_eq!(frame.id(), "alice");
//! ```

use std::fmt;

use bytes::Bytes;

use super::ring_buffer::CircularBuffer;
use super::wire_format::{
    decode_length, trim_id, validate_message_size, ID_FIELD_SIZE, LENGTH_FIELD_SIZE, MEGABYTE,
};
use super::Frame;
use crate::error::Result;

/// Receive buffer capacity: twice the largest frame, so cursors never lap.
pub const RECEIVE_BUFFER_CAPACITY: usize = 2 * MEGABYTE;

/// Which part of a frame is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Length,
    Id,
    Body,
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length => write!(f, "length"),
            Self::Id => write!(f, "id"),
            Self::Body => write!(f, "body"),
        }
    }
}

#[derive(Debug, Clone)]
enum State {
    WaitingForLength,
    WaitingForId { length: usize },
    WaitingForBody { length: usize, id: String },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    buffer: CircularBuffer,
    state: State,
}

impl FrameAssembler {
    /// Create an assembler with the default 2 MiB buffer.
    pub fn new() -> Self {
        Self::with_capacity(RECEIVE_BUFFER_CAPACITY)
    }

    /// Create an assembler with a custom buffer capacity.
    ///
    /// The capacity must exceed the largest frame that will be received.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: CircularBuffer::new(capacity),
            state: State::WaitingForLength,
        }
    }

    /// Append raw socket bytes. All-or-nothing, see [`CircularBuffer::push`].
    pub fn push(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.push(data)
    }

    /// Run as many phases as the buffered bytes allow.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` when a frame completed
    /// - `Ok(None)` if more data is needed
    /// - `Err(MessageTooBig)` if the length field is over the limit; the
    ///   stream cannot be resynchronised after this
    pub fn try_extract(&mut self) -> Result<Option<Frame>> {
        loop {
            if self.buffer.size() < self.phase_size() {
                return Ok(None);
            }

            match std::mem::replace(&mut self.state, State::WaitingForLength) {
                State::WaitingForLength => {
                    let raw = self.pop_exact(LENGTH_FIELD_SIZE);
                    let length = decode_length(&raw)? as usize;
                    validate_message_size(length)?;
                    self.state = State::WaitingForId { length };
                }
                State::WaitingForId { length } => {
                    let raw = self.pop_exact(ID_FIELD_SIZE);
                    let id = trim_id(&raw);
                    self.state = State::WaitingForBody { length, id };
                }
                State::WaitingForBody { length, id } => {
                    let body = self.pop_exact(length);
                    return Ok(Some(Frame {
                        id,
                        body: Bytes::from(body),
                    }));
                }
            }
        }
    }

    fn pop_exact(&mut self, count: usize) -> Vec<u8> {
        match self.buffer.pop(count) {
            Ok(bytes) => bytes,
            Err(drained) => panic!(
                "receive buffer popped {} of {} bytes after size check",
                drained.bytes.len(),
                drained.requested
            ),
        }
    }

    fn phase_size(&self) -> usize {
        match &self.state {
            State::WaitingForLength => LENGTH_FIELD_SIZE,
            State::WaitingForId { .. } => ID_FIELD_SIZE,
            State::WaitingForBody { length, .. } => *length,
        }
    }

    /// The phase currently waiting for bytes.
    pub fn phase(&self) -> FramePhase {
        match &self.state {
            State::WaitingForLength => FramePhase::Length,
            State::WaitingForId { .. } => FramePhase::Id,
            State::WaitingForBody { .. } => FramePhase::Body,
        }
    }

    /// Bytes still missing before the current phase can complete.
    pub fn needed(&self) -> usize {
        self.phase_size().saturating_sub(self.buffer.size())
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.size()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Space left for incoming bytes.
    pub fn free(&self) -> usize {
        self.buffer.free()
    }

    /// Non-destructive copy of buffered bytes, for diagnostics.
    pub fn snapshot(&self) -> Vec<u8> {
        self.buffer.contents()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForLength;
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
