//! Request/response connection driven by the caller.
//!
//! A [`Connection`] owns a listener and at most one peer. The caller queues a
//! request with [`Connection::input`] and drives it with [`Connection::job`];
//! nothing runs in the background.
//!
//! ```text
//!   Init ──start()──► Idle ──input()──► Busy
//!                      ▲                  │
//!                      └──────job()───────┘
//!   any ──exit()──► Exited
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pollwire::ConnectionBuilder;
//! use std::time::Duration;
//!
//! let mut conn = ConnectionBuilder::new()
//!     .port_range(9000, 9100)
//!     .poll_timeout(Duration::from_secs(2))
//!     .build()?;
//!
//! conn.start()?;
//! conn.input("alice", "PING")?;
//! conn.job()?;
//! println!("{}", conn.last_output());
//! conn.exit();
//! # Ok::<(), pollwire::PollwireError>(())
//! ```

use std::net::IpAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::config::ConnectionConfig;
use crate::error::{PollwireError, Result};
use crate::history::History;
use crate::protocol::{Frame, ID_FIELD_SIZE, MEGABYTE};
use crate::transport::{scan_ports, Listener, PeerTransport};

/// Returned by [`Connection::last_output`] before any response arrived.
pub const EMPTY_OUTPUT: &str = ">@EMPTY@<";

/// Sender id used for liveness checks.
pub const LIVENESS_ID: &str = "@liveness@";

const PING: &[u8] = b"PING";
const PONG: &[u8] = b"PONG";

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, no peer yet.
    Init,
    /// Peer connected, ready for a request.
    Idle,
    /// A request is queued for the next `job()`.
    Busy,
    /// Shut down; terminal.
    Exited,
}

#[derive(Debug)]
struct PendingRequest {
    id: String,
    message: Bytes,
}

/// Builder for a [`Connection`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    config: ConnectionConfig,
}

impl ConnectionBuilder {
    /// Start from the default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config.
    pub fn from_config(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Local address to bind.
    ///
    /// Default: 127.0.0.1
    pub fn bind_address(mut self, address: IpAddr) -> Self {
        self.config.bind_address = address;
        self
    }

    /// Inclusive range of ports `start()` will try.
    ///
    /// Default: 9000..=9100
    pub fn port_range(mut self, start: u16, end: u16) -> Self {
        self.config.port_range_start = start;
        self.config.port_range_end = end;
        self
    }

    /// Bound on each accept, send and receive wait.
    ///
    /// Default: 10 seconds
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Ping the peer from an idle `job()` once this much time has passed
    /// since the last exchange.
    ///
    /// Default: off
    pub fn liveness_interval(mut self, interval: Duration) -> Self {
        self.config.liveness_interval_ms =
            Some(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Validate the config and create the connection.
    pub fn build(self) -> Result<Connection> {
        self.config.validate()?;
        Ok(Connection::new(self.config))
    }
}

/// One listener, one peer, one outstanding request at a time.
#[derive(Debug)]
pub struct Connection {
    config: ConnectionConfig,
    state: ConnectionState,
    listener: Listener,
    peer: PeerTransport,
    pending: Option<PendingRequest>,
    last_response: Option<Frame>,
    last_exchange: Option<Instant>,
    /// A request was sent but its reply never arrived.
    reply_owed: bool,
    record: History,
}

impl Connection {
    /// Create a connection in the `Init` state. No socket is opened yet.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            listener: Listener::with_address(config.bind_address),
            config,
            state: ConnectionState::Init,
            peer: PeerTransport::new(),
            pending: None,
            last_response: None,
            last_exchange: None,
            reply_owed: false,
            record: History::new(),
        }
    }

    /// Start a [`ConnectionBuilder`] with default settings.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Open the listener on the first usable port of the configured range.
    ///
    /// Called by [`start`](Self::start) when needed; calling it first lets
    /// the caller learn the port before a peer connects. A no-op when the
    /// listener is already open.
    pub fn listen(&mut self) -> Result<u16> {
        if self.state == ConnectionState::Exited {
            return Err(PollwireError::ConnectionExited);
        }
        if let Some(port) = self.listener.port() {
            return Ok(port);
        }

        let candidates = scan_ports(self.config.port_range(), self.config.bind_address);
        for port in candidates {
            match self.listener.open(port) {
                Ok(()) => {
                    self.note(format!("listening on port {}", port));
                    return Ok(port);
                }
                Err(e @ (PollwireError::InvalidPort(_) | PollwireError::AlreadyOpen)) => {
                    self.note(format!("port {} skipped: {}", port, e));
                }
                Err(e) => return Err(e),
            }
        }

        self.fault(format!(
            "no port in {}..={} could be opened",
            self.config.port_range_start, self.config.port_range_end
        ));
        Err(PollwireError::PortPoolExhausted)
    }

    /// Make one attempt to accept a peer, opening the listener if needed.
    ///
    /// On failure the listener stays open and `start()` may be called again.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Init => {}
            ConnectionState::Exited => return Err(PollwireError::ConnectionExited),
            ConnectionState::Idle | ConnectionState::Busy => {
                return Err(PollwireError::AlreadyOpen)
            }
        }

        let port = self.listen()?;
        self.note(format!("waiting for peer on port {}", port));

        match self.peer.connect(&mut self.listener, self.config.poll_timeout()) {
            Ok(()) => {
                let addr = self
                    .peer
                    .peer_addr()
                    .map_or_else(|| "unknown".to_string(), |a| a.to_string());
                self.note(format!("peer {} connected", addr));
                self.state = ConnectionState::Idle;
                self.last_exchange = Some(Instant::now());
                Ok(())
            }
            Err(e) => {
                self.fault(format!("accept on port {} failed: {}", port, e));
                Err(e)
            }
        }
    }

    /// Queue a request for the next [`job`](Self::job).
    pub fn input(&mut self, id: &str, message: impl Into<Bytes>) -> Result<()> {
        match self.state {
            ConnectionState::Idle => {}
            ConnectionState::Busy => {
                self.note(format!("input from {:?} rejected: busy", id));
                return Err(PollwireError::AlreadyBusy);
            }
            ConnectionState::Init | ConnectionState::Exited => {
                return Err(PollwireError::NotConnected)
            }
        }

        let message = message.into();
        if id.len() > ID_FIELD_SIZE {
            let reason = format!("id {:?} is longer than {} bytes", id, ID_FIELD_SIZE);
            self.note(format!("input rejected: {}", reason));
            return Err(PollwireError::BadInput(reason));
        }
        if message.is_empty() || message.len() > MEGABYTE {
            let reason = format!("message length {} outside 1..={}", message.len(), MEGABYTE);
            self.note(format!("input rejected: {}", reason));
            return Err(PollwireError::BadInput(reason));
        }

        self.pending = Some(PendingRequest {
            id: id.to_string(),
            message,
        });
        self.state = ConnectionState::Busy;
        Ok(())
    }

    /// Advance the connection by one step.
    ///
    /// - `Busy`: send the queued request, wait for the reply, return to `Idle`
    ///   whether or not the exchange succeeded
    /// - `Idle`: run the liveness check if one is due
    /// - `Init`/`Exited`: nothing
    ///
    /// If an earlier reply timed out, it is read and discarded before the
    /// next request goes out.
    pub fn job(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Busy => self.exchange_pending(),
            ConnectionState::Idle => self.liveness_tick(),
            ConnectionState::Init | ConnectionState::Exited => Ok(()),
        }
    }

    fn exchange_pending(&mut self) -> Result<()> {
        let request = self.pending.take();
        self.state = ConnectionState::Idle;
        let Some(request) = request else {
            return Ok(());
        };

        match self.round_trip(&request.id, &request.message) {
            Ok(frame) => {
                self.note(format!(
                    "request from {:?} answered by {:?} ({} bytes)",
                    request.id,
                    frame.id(),
                    frame.body_len()
                ));
                self.last_response = Some(frame);
                self.last_exchange = Some(Instant::now());
                Ok(())
            }
            Err(e) => {
                self.fault(format!("request from {:?} failed: {}", request.id, e));
                Err(e)
            }
        }
    }

    fn liveness_tick(&mut self) -> Result<()> {
        let Some(interval) = self.config.liveness_interval() else {
            return Ok(());
        };
        let due = self
            .last_exchange
            .map_or(true, |at| at.elapsed() >= interval);
        if !due {
            return Ok(());
        }

        let result = self.verify_connection();
        if result.is_ok() {
            self.note("liveness check passed".to_string());
        }
        result
    }

    /// Send `PING` as [`LIVENESS_ID`] and require `PONG` back.
    ///
    /// The reply is not stored as the last output.
    pub fn verify_connection(&mut self) -> Result<()> {
        let outcome = self.round_trip(LIVENESS_ID, PING).and_then(|frame| {
            if frame.body() == PONG {
                Ok(())
            } else {
                Err(PollwireError::LivenessFailed(format!(
                    "expected PONG, got {:?}",
                    frame.body_text()
                )))
            }
        });

        match &outcome {
            Ok(()) => self.last_exchange = Some(Instant::now()),
            Err(e) => self.fault(format!("liveness check failed: {}", e)),
        }
        outcome
    }

    fn round_trip(&mut self, id: &str, message: &[u8]) -> Result<Frame> {
        let timeout = self.config.poll_timeout();
        self.settle_owed_reply(timeout)?;
        self.peer.send_packet(id, message, timeout)?;

        let reply = self.peer.get_packet(timeout);
        if matches!(reply, Err(PollwireError::PollTimedOut)) {
            self.reply_owed = true;
        }
        reply
    }

    /// Discard the late reply to a timed-out request so the next reply
    /// matches the next request. Drops the peer if it still does not arrive.
    fn settle_owed_reply(&mut self, timeout: Duration) -> Result<()> {
        if !self.reply_owed {
            return Ok(());
        }
        self.reply_owed = false;

        match self.peer.get_packet(timeout) {
            Ok(frame) => {
                self.note(format!(
                    "discarded late reply from {:?} ({} bytes)",
                    frame.id(),
                    frame.body_len()
                ));
                Ok(())
            }
            Err(e) => {
                self.peer.close();
                self.fault(format!("late reply never arrived, peer dropped: {}", e));
                Err(PollwireError::NotConnected)
            }
        }
    }

    /// Body of the last response, or [`EMPTY_OUTPUT`].
    pub fn last_output(&self) -> String {
        self.last_response
            .as_ref()
            .map_or_else(|| EMPTY_OUTPUT.to_string(), Frame::body_text)
    }

    /// The last response frame, if any.
    pub fn last_response(&self) -> Option<&Frame> {
        self.last_response.as_ref()
    }

    /// Close the peer and the listener. Terminal and idempotent.
    pub fn exit(&mut self) {
        if self.state == ConnectionState::Exited {
            return;
        }
        self.peer.close();
        self.listener.close();
        self.pending = None;
        self.reply_owed = false;
        self.state = ConnectionState::Exited;
        self.note("connection exited".to_string());
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Listening port, `None` before `listen()`/`start()` and after `exit()`.
    pub fn port(&self) -> Option<u16> {
        self.listener.port()
    }

    /// Diagnostic trail, newest first.
    pub fn record(&self) -> &History {
        &self.record
    }

    /// Settings this connection was built with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn note(&mut self, entry: String) {
        tracing::info!("{}", entry);
        self.record.add(entry);
    }

    fn fault(&mut self, entry: String) {
        tracing::warn!("{}", entry);
        self.record.add(entry);
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new(ConnectionConfig::default())
    }
}
