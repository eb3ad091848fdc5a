//! Port pool: find ports in a range that can currently be bound.
//!
//! A port passes the probe when a bind+listen on it succeeds; the probe
//! socket is released immediately, so a later `Listener::open` can still lose
//! the port to another process. Callers treat the result as candidates.

use std::net::{IpAddr, SocketAddr, TcpListener};
use std::ops::RangeInclusive;

use super::listener::MIN_PORT;
use crate::error::{PollwireError, Result};

/// Probe every port in `range` and return the ones that bound, in order.
pub fn scan_ports(range: RangeInclusive<u16>, bind_address: IpAddr) -> Vec<u16> {
    let mut ports = Vec::new();
    probe_range(range, bind_address, &mut ports);
    ports
}

/// Probe into a caller-owned list. The list must start empty.
///
/// Returns how many ports were found.
pub fn scan_ports_into(
    range: RangeInclusive<u16>,
    bind_address: IpAddr,
    ports: &mut Vec<u16>,
) -> Result<usize> {
    if !ports.is_empty() {
        return Err(PollwireError::NonEmptyPortList);
    }
    probe_range(range, bind_address, ports);
    Ok(ports.len())
}

fn probe_range(range: RangeInclusive<u16>, bind_address: IpAddr, ports: &mut Vec<u16>) {
    for port in range {
        if port < MIN_PORT {
            continue;
        }
        match TcpListener::bind(SocketAddr::new(bind_address, port)) {
            Ok(_) => ports.push(port),
            Err(e) => tracing::trace!("Port {} unavailable: {}", port, e),
        }
    }
    tracing::debug!("Port scan found {} candidate(s)", ports.len());
}
