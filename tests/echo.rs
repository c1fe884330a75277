use std::{
    io::{ErrorKind, Read, Write},
    net::{SocketAddr, TcpStream},
    thread,
    time::Duration,
};

use tcpserver::{
    Client, ClientError, Server, ServerConfig,
    protocol::{MAX_MSG_LEN, encode},
};

/// Starts a server on an ephemeral port. The loop thread lives until the
/// test binary exits.
fn start_server() -> SocketAddr {
    let config = ServerConfig::default()
        .with_listen("127.0.0.1:0".parse().unwrap())
        .with_poll_timeout(Duration::from_millis(100));
    let mut server = Server::bind(&config).expect("bind");
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.run());
    addr
}

fn connect(addr: SocketAddr) -> Client {
    let client = Client::connect(addr).expect("connect");
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    client
}

/// True once the server has closed `client`'s connection.
fn is_closed(client: &mut Client) -> bool {
    match client.recv() {
        Err(ClientError::Closed) => true,
        Err(ClientError::Io(e)) => e.kind() == ErrorKind::ConnectionReset,
        _ => false,
    }
}

#[test]
fn echo_single() {
    let addr = start_server();
    let mut c = connect(addr);
    assert_eq!(b"hello".to_vec(), c.request(b"hello").unwrap());
}

#[test]
fn echo_zero_length_and_max_length() {
    let addr = start_server();
    let mut c = connect(addr);
    assert!(c.request(b"").unwrap().is_empty());

    let body: Vec<u8> = (0..MAX_MSG_LEN).map(|i| (i % 251) as u8).collect();
    assert_eq!(body, c.request(&body).unwrap());
}

#[test]
fn pipelined_requests_keep_order() {
    let addr = start_server();
    let mut c = connect(addr);

    let bodies: Vec<Vec<u8>> = (0..50).map(|i| format!("request {i}").into_bytes()).collect();
    let wire: Vec<u8> = bodies.iter().flat_map(|b| encode(b).unwrap()).collect();
    c.stream_mut().write_all(&wire).unwrap();

    for body in &bodies {
        assert_eq!(body, &c.recv().unwrap());
    }
}

#[test]
fn partial_header_gets_no_response() {
    let addr = start_server();
    let mut raw = TcpStream::connect(addr).unwrap();
    let frame = encode(b"split").unwrap();

    raw.write_all(&frame[..2]).unwrap();
    raw.set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();
    let mut buf = [0; 16];
    let err = raw.read(&mut buf).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut));

    raw.write_all(&frame[2..]).unwrap();
    raw.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut got = vec![0; frame.len()];
    raw.read_exact(&mut got).unwrap();
    assert_eq!(frame, got);
}

#[test]
fn interleaved_connections_do_not_mix() {
    let addr = start_server();
    let mut a = connect(addr);
    let mut b = connect(addr);

    a.send(b"foo").unwrap();
    b.send(b"bar").unwrap();
    a.send(b"foo2").unwrap();

    assert_eq!(b"bar".to_vec(), b.recv().unwrap());
    assert_eq!(b"foo".to_vec(), a.recv().unwrap());
    assert_eq!(b"foo2".to_vec(), a.recv().unwrap());
}

#[test]
fn oversized_length_closes_only_that_connection() {
    let addr = start_server();
    let mut good = connect(addr);
    let mut bad = connect(addr);
    assert_eq!(b"before".to_vec(), good.request(b"before").unwrap());

    let header = ((MAX_MSG_LEN + 1) as u32).to_le_bytes();
    bad.stream_mut().write_all(&header).unwrap();
    assert!(is_closed(&mut bad));

    assert_eq!(b"after".to_vec(), good.request(b"after").unwrap());
    let mut fresh = connect(addr);
    assert_eq!(b"fresh".to_vec(), fresh.request(b"fresh").unwrap());
}

#[test]
fn abrupt_disconnect_mid_message() {
    let addr = start_server();
    let mut other = connect(addr);

    {
        let mut raw = TcpStream::connect(addr).unwrap();
        raw.write_all(&10u32.to_le_bytes()).unwrap();
        raw.write_all(b"abc").unwrap();
    }

    assert_eq!(b"still here".to_vec(), other.request(b"still here").unwrap());
    let mut fresh = connect(addr);
    assert_eq!(b"x".to_vec(), fresh.request(b"x").unwrap());
}

#[test]
fn byte_at_a_time() {
    let addr = start_server();
    let mut c = connect(addr);
    let frame = encode(b"trickle").unwrap();
    for b in &frame {
        c.stream_mut().write_all(std::slice::from_ref(b)).unwrap();
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(b"trickle".to_vec(), c.recv().unwrap());
}

#[test]
fn slow_reader_gets_everything() {
    let addr = start_server();
    let mut reader = TcpStream::connect(addr).unwrap();
    reader
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    let mut writer = reader.try_clone().unwrap();

    const N: usize = 300;
    let body = vec![7u8; MAX_MSG_LEN];
    let frame = encode(&body).unwrap();

    // the echo of N large frames overflows the socket buffers unless the
    // server applies backpressure instead of dropping or blocking
    let frame_w = frame.clone();
    let handle = thread::spawn(move || {
        for _ in 0..N {
            writer.write_all(&frame_w).unwrap();
        }
    });

    thread::sleep(Duration::from_millis(200));
    let mut got = vec![0; frame.len()];
    for _ in 0..N {
        reader.read_exact(&mut got).unwrap();
        assert_eq!(frame, got);
    }
    handle.join().unwrap();
}

#[test]
fn many_clients() {
    let addr = start_server();
    let handles: Vec<_> = (0..16)
        .map(|i| {
            thread::spawn(move || {
                let mut c = connect(addr);
                for j in 0..20 {
                    let body = format!("client {i} msg {j}").into_bytes();
                    assert_eq!(body, c.request(&body).unwrap());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}
