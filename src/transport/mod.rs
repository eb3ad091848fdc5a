//! Transport module - TCP listener, peer socket, and port pool.
//!
//! All socket waits go through a private mio poller with a timeout; sockets
//! are non-blocking and nothing here spawns threads.

mod listener;
mod peer;
mod poller;
mod ports;

pub use listener::{Listener, DEFAULT_BIND_ADDRESS, LISTEN_BACKLOG, MAX_PORT, MIN_PORT};
pub use peer::PeerTransport;
pub use ports::{scan_ports, scan_ports_into};
