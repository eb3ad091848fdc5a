//! Echo peer - drives a connection against an in-process echo peer.
//!
//! This example demonstrates:
//! - Building a connection and opening a port from the pool
//! - Queuing requests with `input()` and completing them with `job()`
//! - Checking the peer with `verify_connection()`
//!
//! # Running
//!
//! ```text
//! RUST_LOG=pollwire=debug cargo run --example echo_peer
//! ```

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use pollwire::protocol::{build_frame, decode_length, trim_id, HEADER_SIZE};
use pollwire::{ConnectionBuilder, ConnectionState};
use tracing_subscriber::EnvFilter;

/// Reply to every frame: PONG for PING, the body reversed otherwise.
fn echo(port: u16) -> std::io::Result<()> {
    let mut stream = TcpStream::connect(("127.0.0.1", port))?;
    let mut header = [0u8; HEADER_SIZE];

    while stream.read_exact(&mut header).is_ok() {
        let length = decode_length(&header[..3]).map_err(std::io::Error::other)? as usize;
        let id = trim_id(&header[3..]);
        let mut body = vec![0u8; length];
        stream.read_exact(&mut body)?;

        let reply = if body == b"PING" {
            b"PONG".to_vec()
        } else {
            body.iter().rev().copied().collect()
        };
        let frame = build_frame("echo", &reply).map_err(std::io::Error::other)?;
        stream.write_all(&frame)?;
        tracing::debug!("Echoed {} bytes for {}", reply.len(), id);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut conn = ConnectionBuilder::new()
        .port_range(9000, 9100)
        .poll_timeout(Duration::from_secs(2))
        .build()?;

    let port = conn.listen()?;
    println!("listening on port {}", port);

    let peer = thread::spawn(move || echo(port));
    conn.start()?;
    conn.verify_connection()?;

    for (id, message) in [("alice", "hello"), ("bob", "pollwire"), ("carol", "PING")] {
        conn.input(id, message)?;
        while conn.state() == ConnectionState::Busy {
            conn.job()?;
        }
        println!("{} -> {:?} -> {:?}", id, message, conn.last_output());
    }

    conn.exit();
    peer.join().map_err(|_| "echo peer panicked")??;

    print!("{}", conn.record());
    Ok(())
}
