//! The single accepted peer socket and its framed send/receive.
//!
//! Every blocking point is a bounded readiness wait. A `PollTimedOut` from
//! [`PeerTransport::get_packet`] is resumable: partially read frames stay in
//! the assembler and the next call continues at the same phase. A timeout in
//! the middle of [`PeerTransport::send_packet`] leaves a partial frame on the
//! wire, so the connection should be dropped after one.

use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mio::net::TcpStream;
use mio::Interest;

use super::listener::Listener;
use super::poller::{Poller, Readiness};
use crate::error::{PollwireError, Result};
use crate::protocol::{build_frame, Frame, FrameAssembler};

/// Largest single socket read.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Framed transport over one accepted TCP stream.
#[derive(Default)]
pub struct PeerTransport {
    stream: Option<TcpStream>,
    peer_addr: Option<SocketAddr>,
    poller: Option<Poller>,
    assembler: Option<FrameAssembler>,
    scratch: Vec<u8>,
}

impl PeerTransport {
    /// Create an unconnected transport. Buffers are allocated on connect.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for a pending connection on `listener` and accept it.
    ///
    /// An existing peer is closed first.
    pub fn connect(&mut self, listener: &mut Listener, timeout: Duration) -> Result<()> {
        let inner = listener.inner_mut().ok_or(PollwireError::NotOpened)?;
        let mut poller = Poller::new()?;
        let deadline = Instant::now() + timeout;

        let (stream, addr) = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if poller.wait(inner, Interest::READABLE, remaining)? == Readiness::Failed {
                return Err(PollwireError::UnknownPollResult(std::io::Error::new(
                    ErrorKind::Other,
                    "listener reported an error condition",
                )));
            }

            match inner.accept() {
                Ok(accepted) => break accepted,
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                    // Connection vanished between readiness and accept.
                    if Instant::now() >= deadline {
                        return Err(PollwireError::PollTimedOut);
                    }
                }
                Err(e) => return Err(PollwireError::Io(e)),
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY on {}: {}", addr, e);
        }

        self.close();
        tracing::debug!("Accepted peer {}", addr);
        self.stream = Some(stream);
        self.peer_addr = Some(addr);
        self.poller = Some(poller);
        self.assembler = Some(FrameAssembler::new());
        self.scratch = vec![0u8; READ_CHUNK_SIZE];
        Ok(())
    }

    /// Send one frame, waiting up to `timeout` for each chunk to be writable.
    pub fn send_packet(&mut self, id: &str, message: &[u8], timeout: Duration) -> Result<()> {
        let (stream, poller) = match (self.stream.as_mut(), self.poller.as_mut()) {
            (Some(stream), Some(poller)) => (stream, poller),
            _ => return Err(PollwireError::NotConnected),
        };

        let frame = build_frame(id, message)?;
        let mut sent = 0;

        while sent < frame.len() {
            poller.wait(stream, Interest::WRITABLE, timeout)?;

            match stream.write(&frame[sent..]) {
                Ok(0) => return Err(PollwireError::ConnectionClosedOnSend),
                Ok(n) => sent += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(PollwireError::SendFailed(e)),
            }
        }

        tracing::trace!("Sent frame id={:?} len={}", id, message.len());
        Ok(())
    }

    /// Receive one frame, waiting up to `timeout` for each read.
    pub fn get_packet(&mut self, timeout: Duration) -> Result<Frame> {
        let Self {
            stream,
            poller,
            assembler,
            scratch,
            ..
        } = self;
        let (stream, poller, assembler) = match (stream.as_mut(), poller.as_mut(), assembler.as_mut())
        {
            (Some(stream), Some(poller), Some(assembler)) => (stream, poller, assembler),
            _ => return Err(PollwireError::NotConnected),
        };

        loop {
            if let Some(frame) = assembler.try_extract()? {
                tracing::trace!("Received frame id={:?} len={}", frame.id(), frame.body_len());
                return Ok(frame);
            }

            let phase = assembler.phase();
            poller.wait(stream, Interest::READABLE, timeout)?;

            // Never read more than the buffer can take, so push cannot fail.
            let room = assembler.free().min(scratch.len());
            match stream.read(&mut scratch[..room]) {
                Ok(0) => return Err(PollwireError::ConnectionClosedOnReceive { phase }),
                Ok(n) => assembler.push(&scratch[..n])?,
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {}
                Err(source) => return Err(PollwireError::ReceiveFailed { phase, source }),
            }
        }
    }

    /// Drop the peer socket and buffered bytes. Idempotent.
    pub fn close(&mut self) {
        if let Some(addr) = self.peer_addr.take() {
            tracing::debug!("Closing peer {}", addr);
        }
        self.stream = None;
        self.poller = None;
        self.assembler = None;
    }

    /// Remote address of the connected peer.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Check if a peer is connected.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Bytes received but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.assembler.as_ref().map_or(0, FrameAssembler::len)
    }
}

impl std::fmt::Debug for PeerTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerTransport")
            .field("peer_addr", &self.peer_addr)
            .field("buffered", &self.buffered())
            .finish()
    }
}
