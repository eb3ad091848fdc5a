//! Protocol module - wire format, buffering, and frame types.
//!
//! This module implements the binary protocol:
//! - 16-byte header encoding/decoding (3-byte length + 13-byte id)
//! - Circular buffer for receive-side byte storage
//! - Frame assembler for accumulating partial reads
//! - Frame struct with typed accessors

mod frame;
mod frame_buffer;
mod ring_buffer;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::{FrameAssembler, FramePhase, RECEIVE_BUFFER_CAPACITY};
pub use ring_buffer::{CircularBuffer, Drained};
pub use wire_format::{
    decode_length, encode_length, pad_id, trim_id, validate_message_size, HEADER_SIZE,
    ID_FIELD_SIZE, LENGTH_FIELD_SIZE, MAX_MESSAGE_SIZE, MEGABYTE,
};
