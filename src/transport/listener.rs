//! Listening socket bound to a single port.
//!
//! # Example
//!
//! ```no_run
//! use pollwire::transport::Listener;
//!
//! let mut listener = Listener::new();
//! listener.open(9000)?;
//! assert_eq!(listener.port(), Some(9000));
//! listener.close();
//! # Ok::<(), pollwire::PollwireError>(())
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{PollwireError, Result};

/// Lowest port the listener will bind; everything below is privileged.
pub const MIN_PORT: u16 = 1024;

/// Highest bindable port.
pub const MAX_PORT: u16 = u16::MAX;

/// Pending connections the OS queues; only one peer is ever accepted.
pub const LISTEN_BACKLOG: i32 = 5;

/// Default bind address (loopback).
pub const DEFAULT_BIND_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Non-blocking listening socket. Owns at most one OS socket.
#[derive(Debug)]
pub struct Listener {
    inner: Option<mio::net::TcpListener>,
    port: Option<u16>,
    bind_address: IpAddr,
}

impl Listener {
    /// Create an unbound listener for the loopback address.
    pub fn new() -> Self {
        Self::with_address(DEFAULT_BIND_ADDRESS)
    }

    /// Create an unbound listener for a specific local address.
    pub fn with_address(bind_address: IpAddr) -> Self {
        Self {
            inner: None,
            port: None,
            bind_address,
        }
    }

    /// Bind and listen on `port` in non-blocking mode.
    ///
    /// Fails with `AlreadyOpen` if bound (the existing port is kept), and
    /// with `InvalidPort` if the port is out of range or bind/listen fails.
    pub fn open(&mut self, port: u16) -> Result<()> {
        if self.inner.is_some() {
            return Err(PollwireError::AlreadyOpen);
        }
        if port < MIN_PORT {
            tracing::debug!("Port {} is below {}", port, MIN_PORT);
            return Err(PollwireError::InvalidPort(port));
        }

        let addr = SocketAddr::new(self.bind_address, port);
        let listener = bind_listener(addr).map_err(|e| {
            tracing::debug!("Bind on {} failed: {}", addr, e);
            PollwireError::InvalidPort(port)
        })?;

        self.inner = Some(mio::net::TcpListener::from_std(listener));
        self.port = Some(port);
        tracing::debug!("Listening on {}", addr);
        Ok(())
    }

    /// Release the socket. Closing an unbound listener is a no-op.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!("Closed listener on port {:?}", self.port);
        }
        self.port = None;
    }

    /// Bound port, `None` when unbound.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Check if a socket is bound.
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Address the listener binds to.
    pub fn bind_address(&self) -> IpAddr {
        self.bind_address
    }

    /// Actual local address of the bound socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Raw OS handle, `None` when unbound.
    #[cfg(unix)]
    pub fn raw_fd(&self) -> Option<std::os::unix::io::RawFd> {
        use std::os::unix::io::AsRawFd;
        self.inner.as_ref().map(|l| l.as_raw_fd())
    }

    pub(crate) fn inner_mut(&mut self) -> Option<&mut mio::net::TcpListener> {
        self.inner.as_mut()
    }
}

/// Non-blocking bind+listen with [`LISTEN_BACKLOG`].
fn bind_listener(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    // Matches std: lets a restarted listener reuse a port left in TIME_WAIT.
    #[cfg(unix)]
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

impl Default for Listener {
    fn default() -> Self {
        Self::new()
    }
}
