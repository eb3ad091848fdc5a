//! Integration tests for pollwire.
//!
//! Each test runs a peer on a std thread that speaks the wire format over a
//! blocking socket, and drives a `Connection` from the test thread.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use pollwire::protocol::{build_frame, decode_length, trim_id, HEADER_SIZE, MAX_MESSAGE_SIZE, MEGABYTE};
use pollwire::{
    Connection, ConnectionBuilder, ConnectionConfig, ConnectionState, PollwireError, EMPTY_OUTPUT,
    LIVENESS_ID,
};

fn connection(range_start: u16, timeout_ms: u64) -> Connection {
    ConnectionBuilder::new()
        .port_range(range_start, range_start + 200)
        .poll_timeout(Duration::from_millis(timeout_ms))
        .build()
        .unwrap()
}

fn read_frame(stream: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).ok()?;
    let length = decode_length(&header[..3]).unwrap() as usize;
    let id = trim_id(&header[3..]);
    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).ok()?;
    Some((id, body))
}

fn write_frame(stream: &mut TcpStream, id: &str, body: &[u8]) {
    stream.write_all(&build_frame(id, body).unwrap()).unwrap();
}

/// Peer that answers every PING with PONG and echoes anything else upper-cased.
fn spawn_echo_peer(port: u16) -> thread::JoinHandle<usize> {
    thread::spawn(move || {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let mut served = 0;
        while let Some((id, body)) = read_frame(&mut stream) {
            let reply = if body == b"PING" {
                b"PONG".to_vec()
            } else {
                body.to_ascii_uppercase()
            };
            let reply_id: String = format!("re:{}", id).chars().take(13).collect();
            write_frame(&mut stream, &reply_id, &reply);
            served += 1;
        }
        served
    })
}

/// Open the listener, attach an echo peer, and run `start()`.
fn started(range_start: u16, timeout_ms: u64) -> (Connection, thread::JoinHandle<usize>) {
    let mut conn = connection(range_start, timeout_ms);
    let port = conn.listen().unwrap();
    let peer = spawn_echo_peer(port);
    conn.start().unwrap();
    (conn, peer)
}

#[test]
fn test_ping_pong_round_trip() {
    let (mut conn, peer) = started(24000, 5000);
    assert_eq!(conn.state(), ConnectionState::Idle);
    assert_eq!(conn.last_output(), EMPTY_OUTPUT);

    conn.input("alice", "PING").unwrap();
    assert_eq!(conn.state(), ConnectionState::Busy);

    conn.job().unwrap();
    assert_eq!(conn.state(), ConnectionState::Idle);
    assert_eq!(conn.last_output(), "PONG");
    assert_eq!(conn.last_response().unwrap().id(), "re:alice");

    conn.exit();
    assert_eq!(peer.join().unwrap(), 1);
}

#[test]
fn test_sequential_requests() {
    let (mut conn, peer) = started(24300, 5000);

    for word in ["one", "two", "three"] {
        conn.input("seq", word).unwrap();
        conn.job().unwrap();
        assert_eq!(conn.last_output(), word.to_uppercase());
    }

    conn.exit();
    assert_eq!(peer.join().unwrap(), 3);
}

#[test]
fn test_busy_rejects_second_input() {
    let (mut conn, peer) = started(24600, 5000);

    conn.input("first", "a").unwrap();
    assert!(matches!(
        conn.input("second", "b"),
        Err(PollwireError::AlreadyBusy)
    ));

    conn.job().unwrap();
    assert_eq!(conn.last_output(), "A");

    conn.exit();
    peer.join().unwrap();
}

#[test]
fn test_bad_input_leaves_state() {
    let (mut conn, peer) = started(24900, 5000);

    assert!(matches!(
        conn.input("fourteen-bytes", "x"),
        Err(PollwireError::BadInput(_))
    ));
    assert!(matches!(
        conn.input("ok", ""),
        Err(PollwireError::BadInput(_))
    ));
    assert!(matches!(
        conn.input("ok", vec![b'x'; 1024 * 1024 + 1]),
        Err(PollwireError::BadInput(_))
    ));
    assert_eq!(conn.state(), ConnectionState::Idle);

    // A 13-byte id is the largest that fits.
    conn.input("thirteen-byte", "x").unwrap();
    conn.job().unwrap();
    assert_eq!(conn.last_response().unwrap().id(), "re:thirteen-b");

    conn.exit();
    peer.join().unwrap();
}

#[test]
fn test_large_message() {
    let (mut conn, peer) = started(25200, 5000);
    let body = vec![b'q'; 512 * 1024];

    conn.input("bulk", body.clone()).unwrap();
    conn.job().unwrap();
    let response = conn.last_response().unwrap();
    assert_eq!(response.body_len(), body.len());
    assert!(response.body().iter().all(|&b| b == b'Q'));

    conn.exit();
    peer.join().unwrap();
}

#[test]
fn test_verify_connection() {
    let (mut conn, peer) = started(25500, 5000);

    conn.verify_connection().unwrap();
    // Liveness replies are not reported as output.
    assert_eq!(conn.last_output(), EMPTY_OUTPUT);

    conn.exit();
    peer.join().unwrap();
}

#[test]
fn test_verify_connection_wrong_reply() {
    let mut conn = connection(25800, 5000);
    let port = conn.listen().unwrap();
    let peer = thread::spawn(move || {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let (id, _) = read_frame(&mut stream).unwrap();
        write_frame(&mut stream, "peer", b"NOPE");
        id
    });
    conn.start().unwrap();

    assert!(matches!(
        conn.verify_connection(),
        Err(PollwireError::LivenessFailed(_))
    ));
    assert_eq!(peer.join().unwrap(), LIVENESS_ID);
    conn.exit();
}

#[test]
fn test_idle_job_runs_due_liveness_check() {
    let mut conn = ConnectionBuilder::new()
        .port_range(26100, 26300)
        .poll_timeout(Duration::from_secs(5))
        .liveness_interval(Duration::from_millis(0))
        .build()
        .unwrap();
    let port = conn.listen().unwrap();
    let peer = spawn_echo_peer(port);
    conn.start().unwrap();

    conn.job().unwrap();
    assert_eq!(conn.record().latest(), Some("liveness check passed"));
    assert_eq!(conn.state(), ConnectionState::Idle);

    conn.exit();
    assert_eq!(peer.join().unwrap(), 1);
}

#[test]
fn test_peer_hangup_returns_to_idle() {
    let mut conn = connection(26400, 5000);
    let port = conn.listen().unwrap();
    let peer = thread::spawn(move || {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        read_frame(&mut stream).unwrap();
        // Hang up without replying.
    });
    conn.start().unwrap();

    conn.input("alice", "PING").unwrap();
    let result = conn.job();
    peer.join().unwrap();

    assert!(result.as_ref().unwrap_err().is_disconnect(), "{:?}", result);
    assert_eq!(conn.state(), ConnectionState::Idle);
    assert_eq!(conn.last_output(), EMPTY_OUTPUT);
}

#[test]
fn test_slow_peer_times_out() {
    let mut conn = connection(26700, 100);
    let port = conn.listen().unwrap();
    let peer = thread::spawn(move || {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        read_frame(&mut stream).unwrap();
        thread::sleep(Duration::from_millis(500));
    });
    while conn.start().is_err() {}

    conn.input("alice", "PING").unwrap();
    let result = conn.job();
    assert!(matches!(result, Err(PollwireError::PollTimedOut)));
    assert_eq!(conn.state(), ConnectionState::Idle);

    conn.exit();
    peer.join().unwrap();
}

#[test]
fn test_start_twice_rejected() {
    let (mut conn, peer) = started(27000, 5000);

    assert!(matches!(conn.start(), Err(PollwireError::AlreadyOpen)));

    conn.exit();
    peer.join().unwrap();
}

#[test]
fn test_start_after_timeout_accepts_late_peer() {
    let mut conn = connection(27300, 50);
    assert!(matches!(conn.start(), Err(PollwireError::PollTimedOut)));
    let port = conn.port().unwrap();

    let peer = spawn_echo_peer(port);
    let mut attempts = 0;
    while conn.start().is_err() {
        attempts += 1;
        assert!(attempts < 100, "peer never connected");
    }

    conn.input("late", "hi").unwrap();
    conn.job().unwrap();
    assert_eq!(conn.last_output(), "HI");

    conn.exit();
    peer.join().unwrap();
}

#[test]
fn test_exit_closes_peer() {
    let (mut conn, peer) = started(27600, 5000);
    let port = conn.port().unwrap();

    conn.exit();
    assert_eq!(conn.state(), ConnectionState::Exited);
    assert_eq!(conn.port(), None);
    // The peer sees end of stream and finishes.
    assert_eq!(peer.join().unwrap(), 0);

    // The port is released.
    let mut other = Connection::new(ConnectionConfig {
        port_range_start: port,
        port_range_end: port,
        ..ConnectionConfig::default()
    });
    assert_eq!(other.listen().unwrap(), port);
}

#[test]
fn test_record_tracks_lifecycle() {
    let (mut conn, peer) = started(27900, 5000);
    conn.input("alice", "hello").unwrap();
    conn.job().unwrap();
    conn.exit();
    peer.join().unwrap();

    let entries: Vec<&str> = conn.record().entries().collect();
    assert_eq!(entries[0], "connection exited");
    assert!(entries.iter().any(|e| e.starts_with("listening on port")));
    assert!(entries.iter().any(|e| e.starts_with("peer ") && e.ends_with(" connected")));
    assert!(entries.iter().any(|e| e.contains("answered by \"re:alice\"")));
}

#[test]
fn test_late_reply_is_not_paired_with_next_request() {
    let mut conn = connection(28200, 300);
    let port = conn.listen().unwrap();
    let peer = thread::spawn(move || {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let mut first = true;
        while let Some((id, body)) = read_frame(&mut stream) {
            if first {
                thread::sleep(Duration::from_millis(450));
                first = false;
            }
            write_frame(&mut stream, &id, &body.to_ascii_uppercase());
        }
    });
    while conn.start().is_err() {}

    conn.input("a", "first").unwrap();
    assert!(matches!(conn.job(), Err(PollwireError::PollTimedOut)));

    conn.input("a", "second").unwrap();
    conn.job().unwrap();
    assert_eq!(conn.last_output(), "SECOND");
    assert!(conn
        .record()
        .entries()
        .any(|e| e.starts_with("discarded late reply")));

    conn.exit();
    peer.join().unwrap();
}

#[test]
fn test_missing_late_reply_drops_peer() {
    let mut conn = connection(28500, 100);
    let port = conn.listen().unwrap();
    let peer = thread::spawn(move || {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        read_frame(&mut stream).unwrap();
        // Never reply; wait for the connection to be dropped.
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest);
    });
    while conn.start().is_err() {}

    conn.input("a", "first").unwrap();
    assert!(matches!(conn.job(), Err(PollwireError::PollTimedOut)));

    conn.input("a", "second").unwrap();
    assert!(matches!(conn.job(), Err(PollwireError::NotConnected)));
    assert_eq!(conn.state(), ConnectionState::Idle);
    assert_eq!(conn.last_output(), EMPTY_OUTPUT);

    peer.join().unwrap();
    conn.exit();
}

#[test]
fn test_message_over_wire_limit_fails_at_job() {
    let (mut conn, peer) = started(28800, 5000);
    let body = vec![b'z'; MAX_MESSAGE_SIZE + 1];
    assert!(body.len() <= MEGABYTE);

    conn.input("big", body).unwrap();
    assert_eq!(conn.state(), ConnectionState::Busy);

    assert!(matches!(
        conn.job(),
        Err(PollwireError::MessageTooBig { size, max })
            if size == MAX_MESSAGE_SIZE + 1 && max == MAX_MESSAGE_SIZE
    ));
    assert_eq!(conn.state(), ConnectionState::Idle);

    // Nothing reached the wire, so the connection is still usable.
    conn.input("small", "ok").unwrap();
    conn.job().unwrap();
    assert_eq!(conn.last_output(), "OK");

    conn.exit();
    assert_eq!(peer.join().unwrap(), 1);
}
