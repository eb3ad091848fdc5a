//! # pollwire
//!
//! Framed request/response over a single TCP connection, driven by explicit
//! poll-bounded steps instead of an async runtime.
//!
//! A [`Connection`] listens on a port from a configured pool, accepts one
//! peer, and exchanges frames of the form:
//!
//! ```text
//! ┌──────────────┬────────────────────────┬──────────────────┐
//! │ length (3 B) │ id (13 B, space-padded) │ body (length B)  │
//! └──────────────┴────────────────────────┴──────────────────┘
//! ```
//!
//! The length is big-endian and never exceeds 1 MiB minus the header.
//!
//! ## Example
//!
//! ```no_run
//! use pollwire::{ConnectionBuilder, ConnectionState};
//!
//! let mut conn = ConnectionBuilder::new().port_range(9000, 9100).build()?;
//! conn.start()?;
//!
//! conn.input("alice", "PING")?;
//! while conn.state() == ConnectionState::Busy {
//!     conn.job()?;
//! }
//! println!("peer said {}", conn.last_output());
//!
//! conn.exit();
//! # Ok::<(), pollwire::PollwireError>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod history;
pub mod protocol;
pub mod transport;

pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionBuilder, ConnectionState, EMPTY_OUTPUT, LIVENESS_ID};
pub use error::{PollwireError, Result};
pub use history::{History, MAX_HISTORY_SIZE};
pub use protocol::Frame;
