//! Bounded readiness wait for a single socket.
//!
//! Each wait registers the source, polls until it is ready or the deadline
//! passes, then deregisters it. Registering fresh reports readiness that
//! already exists, so the wait behaves like a level-triggered `poll(2)` even
//! though mio is edge-triggered.

use std::io::ErrorKind;
use std::time::{Duration, Instant};

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};

use crate::error::{PollwireError, Result};

const SOURCE: Token = Token(0);

/// Outcome of a successful wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// The requested interest is ready (or the peer hung up).
    Ready,
    /// The socket reported an error condition.
    Failed,
}

/// A private mio poll instance owned by one transport.
pub(crate) struct Poller {
    poll: Poll,
    events: Events,
}

impl Poller {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(8),
        })
    }

    /// Wait up to `timeout` for `source` to become ready for `interest`.
    ///
    /// Returns `PollTimedOut` on expiry and `UnknownPollResult` if the poll
    /// call itself fails.
    pub(crate) fn wait<S>(
        &mut self,
        source: &mut S,
        interest: Interest,
        timeout: Duration,
    ) -> Result<Readiness>
    where
        S: Source + ?Sized,
    {
        self.poll
            .registry()
            .register(source, SOURCE, interest)
            .map_err(PollwireError::UnknownPollResult)?;

        let outcome = self.wait_registered(interest, timeout);

        if let Err(e) = self.poll.registry().deregister(source) {
            tracing::warn!("Failed to deregister socket from poller: {}", e);
        }
        outcome
    }

    fn wait_registered(&mut self, interest: Interest, timeout: Duration) -> Result<Readiness> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.poll.poll(&mut self.events, Some(remaining)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(PollwireError::UnknownPollResult(e)),
            }

            for event in self.events.iter() {
                if event.token() != SOURCE {
                    continue;
                }
                if event.is_error() {
                    return Ok(Readiness::Failed);
                }
                let readable = interest.is_readable()
                    && (event.is_readable() || event.is_read_closed());
                let writable = interest.is_writable()
                    && (event.is_writable() || event.is_write_closed());
                if readable || writable {
                    return Ok(Readiness::Ready);
                }
            }

            // Spurious wakeups loop until the deadline.
            if Instant::now() >= deadline {
                return Err(PollwireError::PollTimedOut);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_wait_times_out_without_peer() {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        std_listener.set_nonblocking(true).unwrap();
        let mut listener = mio::net::TcpListener::from_std(std_listener);

        let mut poller = Poller::new().unwrap();
        let started = Instant::now();
        let result = poller.wait(&mut listener, Interest::READABLE, Duration::from_millis(50));

        assert!(matches!(result, Err(PollwireError::PollTimedOut)));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_sees_existing_readiness() {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();
        let mut listener = mio::net::TcpListener::from_std(std_listener);

        let mut client = std::net::TcpStream::connect(addr).unwrap();
        client.write_all(b"x").unwrap();

        let mut poller = Poller::new().unwrap();
        // The connection is pending before registration and must still be seen.
        let ready = poller
            .wait(&mut listener, Interest::READABLE, Duration::from_secs(2))
            .unwrap();
        assert_eq!(ready, Readiness::Ready);

        // And again after re-registering, since nothing was accepted.
        let ready = poller
            .wait(&mut listener, Interest::READABLE, Duration::from_secs(2))
            .unwrap();
        assert_eq!(ready, Readiness::Ready);
    }
}
