//! Fixed-capacity FIFO byte store with independent cursors.
//!
//! `push` only moves the write cursor and `pop` only moves the read cursor;
//! both wrap at `capacity`. Size the buffer larger than the biggest frame it
//! will hold so the cursors never lap each other.

use crate::error::PollwireError;

/// Bytes drained by an over-long `pop`.
///
/// The buffer is empty afterwards; the caller must wait for more data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drained {
    /// Everything that was held, in FIFO order.
    pub bytes: Vec<u8>,
    /// The count that was asked for.
    pub requested: usize,
}

impl From<Drained> for PollwireError {
    fn from(d: Drained) -> Self {
        PollwireError::OutOfCapacity {
            requested: d.requested,
            available: d.bytes.len(),
        }
    }
}

/// Circular byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularBuffer {
    storage: Box<[u8]>,
    read_cursor: usize,
    write_cursor: usize,
    length: usize,
}

impl CircularBuffer {
    /// Create a buffer holding at most `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "circular buffer capacity cannot be 0");
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            read_cursor: 0,
            write_cursor: 0,
            length: 0,
        }
    }

    /// Append all of `data`, or nothing.
    pub fn push(&mut self, data: &[u8]) -> Result<(), PollwireError> {
        if data.len() > self.free() {
            return Err(PollwireError::OutOfCapacity {
                requested: data.len(),
                available: self.free(),
            });
        }

        let cap = self.capacity();
        let first = data.len().min(cap - self.write_cursor);
        self.storage[self.write_cursor..self.write_cursor + first].copy_from_slice(&data[..first]);
        self.storage[..data.len() - first].copy_from_slice(&data[first..]);

        self.write_cursor = (self.write_cursor + data.len()) % cap;
        self.length += data.len();
        Ok(())
    }

    /// Remove `count` bytes from the front.
    ///
    /// If fewer than `count` bytes are held, everything is drained and
    /// returned inside the error.
    pub fn pop(&mut self, count: usize) -> Result<Vec<u8>, Drained> {
        if count > self.length {
            let bytes = self.take(self.length);
            return Err(Drained {
                bytes,
                requested: count,
            });
        }
        Ok(self.take(count))
    }

    fn take(&mut self, count: usize) -> Vec<u8> {
        let out = self.copy_out(self.read_cursor, count);
        self.read_cursor = (self.read_cursor + count) % self.capacity();
        self.length -= count;
        out
    }

    fn copy_out(&self, start: usize, count: usize) -> Vec<u8> {
        let cap = self.capacity();
        let first = count.min(cap - start);
        let mut out = Vec::with_capacity(count);
        out.extend_from_slice(&self.storage[start..start + first]);
        out.extend_from_slice(&self.storage[..count - first]);
        out
    }

    /// Copy of the held bytes without consuming them.
    ///
    /// # Panics
    ///
    /// Panics if the cursors disagree with the length; the buffer is corrupt.
    pub fn contents(&self) -> Vec<u8> {
        let cap = self.capacity();
        assert!(
            self.read_cursor < cap && self.write_cursor < cap && self.length <= cap,
            "circular buffer cursor out of bounds: read {} write {} length {} capacity {}",
            self.read_cursor,
            self.write_cursor,
            self.length,
            cap
        );
        let implied_end = (self.read_cursor + self.length) % cap;
        assert_eq!(
            implied_end, self.write_cursor,
            "circular buffer corrupt: implied end {} != write cursor {}",
            implied_end, self.write_cursor
        );
        self.copy_out(self.read_cursor, self.length)
    }

    /// Check if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of held bytes.
    pub fn size(&self) -> usize {
        self.length
    }

    /// Fixed capacity.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes that can still be pushed.
    pub fn free(&self) -> usize {
        self.capacity() - self.length
    }

    /// Drop all held bytes.
    pub fn clear(&mut self) {
        self.read_cursor = 0;
        self.write_cursor = 0;
        self.length = 0;
    }
}
