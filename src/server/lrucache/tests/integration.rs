//! End-to-end tests: launch a server and drive it over real sockets with
//! both wire protocols.

use config::LrucacheConfig;
use lrucache::Lrucache;

use std::io::{Read, Write};
use std::net::{TcpStream, UdpSocket};
use std::time::{Duration, Instant};

const ADDR: &str = "127.0.0.1:12321";

fn connect() -> TcpStream {
    // the listener may still be binding when the first test runs
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match TcpStream::connect(ADDR) {
            Ok(stream) => {
                stream
                    .set_read_timeout(Some(Duration::from_millis(500)))
                    .expect("failed to set read timeout");
                stream
                    .set_write_timeout(Some(Duration::from_millis(500)))
                    .expect("failed to set write timeout");
                return stream;
            }
            Err(e) => {
                if Instant::now() > deadline {
                    panic!("failed to connect: {}", e);
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

/// Send a request and assert on the exact reply bytes.
fn transact(stream: &mut TcpStream, request: &[u8], response: &[u8]) {
    stream.write_all(request).expect("failed to send request");
    if response.is_empty() {
        expect_silence(stream);
        return;
    }
    let mut buf = vec![0; response.len()];
    stream.read_exact(&mut buf).expect("failed to read response");
    assert_eq!(
        buf,
        response,
        "request: {:?}",
        String::from_utf8_lossy(request)
    );
}

/// Assert that no bytes arrive before the read times out.
fn expect_silence(stream: &mut TcpStream) {
    let mut buf = [0; 64];
    match stream.read(&mut buf) {
        Ok(n) => panic!("expected no response, got {:?}", &buf[0..n]),
        Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::WouldBlock),
    }
}

/// Read until the buffer ends with the needle, within the deadline.
fn read_until(stream: &mut TcpStream, needle: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut chunk = [0; 4096];
    while !buf.ends_with(needle) {
        assert!(Instant::now() < deadline, "timed out waiting for response");
        match stream.read(&mut chunk) {
            Ok(0) => panic!("connection closed while waiting for response"),
            Ok(n) => buf.extend_from_slice(&chunk[0..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => panic!("read error: {}", e),
        }
    }
    buf
}

fn stat_text(stats: &[u8], name: &str) -> String {
    let text = String::from_utf8_lossy(stats);
    let prefix = format!("STAT {} ", name);
    for line in text.lines() {
        if let Some(value) = line.strip_prefix(&prefix) {
            return value.trim().to_string();
        }
    }
    panic!("missing stat: {}", name);
}

fn stat_value(stats: &[u8], name: &str) -> u64 {
    stat_text(stats, name).parse().expect("non-numeric stat")
}

fn bin_request(opcode: u8, extras: &[u8], key: &[u8], value: &[u8]) -> Vec<u8> {
    let bodylen = (extras.len() + key.len() + value.len()) as u32;
    let mut buf = vec![0x80, opcode];
    buf.extend_from_slice(&(key.len() as u16).to_be_bytes());
    buf.push(extras.len() as u8);
    buf.push(0);
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf.extend_from_slice(&bodylen.to_be_bytes());
    buf.extend_from_slice(&0x01020304u32.to_be_bytes());
    buf.extend_from_slice(&0u64.to_be_bytes());
    buf.extend_from_slice(extras);
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    buf
}

#[test]
fn server() {
    let config: LrucacheConfig = toml::from_str(
        r#"
        [server]
        host = "127.0.0.1"
        port = "12321"

        [worker]
        threads = 2

        [udp]
        enabled = true
        host = "127.0.0.1"
        port = "12321"
        "#,
    )
    .expect("bad test config");

    let server = Lrucache::new(config).expect("failed to launch server");

    // wait for the listener to come up
    std::thread::sleep(Duration::from_millis(500));

    set_and_get();
    delete_hit_then_miss();
    incr_and_decr();
    gets_and_cas();
    append_inherits_flags();
    noreply_is_silent();
    errors_keep_the_connection();
    stats_reporting();
    flush_all();
    binary_roundtrip();
    binary_quiet_miss_is_silent();
    udp_single_packet();

    server.shutdown();
}

fn set_and_get() {
    let mut stream = connect();
    transact(&mut stream, b"set foo 0 0 6\r\nfooval\r\n", b"STORED\r\n");
    transact(
        &mut stream,
        b"get foo\r\n",
        b"VALUE foo 0 6\r\nfooval\r\nEND\r\n",
    );
    // a repeated identical set leaves the same observable state
    transact(&mut stream, b"set foo 0 0 6\r\nfooval\r\n", b"STORED\r\n");
    transact(
        &mut stream,
        b"get foo\r\n",
        b"VALUE foo 0 6\r\nfooval\r\nEND\r\n",
    );
}

fn delete_hit_then_miss() {
    let mut stream = connect();
    transact(&mut stream, b"set togo 0 0 1\r\nx\r\n", b"STORED\r\n");
    transact(&mut stream, b"delete togo\r\n", b"DELETED\r\n");
    transact(&mut stream, b"delete togo\r\n", b"NOT_FOUND\r\n");
}

fn incr_and_decr() {
    let mut stream = connect();
    transact(&mut stream, b"incr i 1\r\n", b"NOT_FOUND\r\n");
    transact(&mut stream, b"set n 0 0 1\r\n0\r\n", b"STORED\r\n");
    transact(&mut stream, b"incr n 3\r\n", b"3\r\n");
    transact(&mut stream, b"decr n 1\r\n", b"2\r\n");
    transact(&mut stream, b"decr n 100\r\n", b"0\r\n");
}

fn gets_and_cas() {
    let mut stream = connect();
    transact(&mut stream, b"set a 5 0 3\r\nbar\r\n", b"STORED\r\n");

    stream.write_all(b"gets a\r\n").expect("failed to send");
    let response = read_until(&mut stream, b"END\r\n");
    // VALUE a 5 3 <cas>
    let text = String::from_utf8_lossy(&response);
    let cas: u64 = text
        .lines()
        .next()
        .and_then(|line| line.split(' ').nth(4))
        .and_then(|cas| cas.parse().ok())
        .expect("missing cas id");

    let stale = format!("cas a 5 0 3 {}\r\nbaz\r\n", cas + 1);
    transact(&mut stream, stale.as_bytes(), b"EXISTS\r\n");

    let current = format!("cas a 5 0 3 {}\r\nbaz\r\n", cas);
    transact(&mut stream, current.as_bytes(), b"STORED\r\n");

    transact(&mut stream, b"cas nope 0 0 1 1\r\nx\r\n", b"NOT_FOUND\r\n");
}

fn append_inherits_flags() {
    let mut stream = connect();
    transact(&mut stream, b"set x 7 0 3\r\nabc\r\n", b"STORED\r\n");
    transact(&mut stream, b"append x 0 0 3\r\ndef\r\n", b"STORED\r\n");
    transact(
        &mut stream,
        b"get x\r\n",
        b"VALUE x 7 6\r\nabcdef\r\nEND\r\n",
    );
    transact(&mut stream, b"prepend x 0 0 2\r\n->\r\n", b"STORED\r\n");
    transact(
        &mut stream,
        b"get x\r\n",
        b"VALUE x 7 8\r\n->abcdef\r\nEND\r\n",
    );
}

fn noreply_is_silent() {
    let mut stream = connect();
    stream
        .write_all(b"set quiet 0 0 1 noreply\r\nq\r\n")
        .expect("failed to send");
    expect_silence(&mut stream);
    transact(
        &mut stream,
        b"get quiet\r\n",
        b"VALUE quiet 0 1\r\nq\r\nEND\r\n",
    );
}

fn errors_keep_the_connection() {
    let mut stream = connect();
    transact(&mut stream, b"frobnicate key\r\n", b"ERROR\r\n");
    transact(
        &mut stream,
        b"set bad zero 0 1\r\n",
        b"CLIENT_ERROR bad command line format\r\n",
    );
    // the same connection still works
    transact(&mut stream, b"set ok 0 0 2\r\nok\r\n", b"STORED\r\n");
}

fn stats_reporting() {
    let mut stream = connect();

    stream.write_all(b"stats\r\n").expect("failed to send");
    let stats = read_until(&mut stream, b"END\r\n");

    for required in [
        "pid",
        "uptime",
        "time",
        "version",
        "pointer_size",
        "rusage_user",
        "rusage_system",
        "curr_connections",
        "total_connections",
        "connection_structures",
        "cmd_get",
        "cmd_set",
        "get_hits",
        "get_misses",
        "delete_misses",
        "delete_hits",
        "incr_misses",
        "incr_hits",
        "decr_misses",
        "decr_hits",
        "bytes_read",
        "bytes_written",
        "limit_maxbytes",
        "threads",
    ] {
        let _ = stat_text(&stats, required);
    }

    assert!(stat_value(&stats, "curr_connections") >= 1);
    assert_eq!(stat_value(&stats, "threads"), 2);

    // command counters increase monotonically
    let cmd_get = stat_value(&stats, "cmd_get");
    transact(&mut stream, b"get statprobe\r\nstats\r\n", b"END\r\n");
    let stats = read_until(&mut stream, b"END\r\n");
    assert!(stat_value(&stats, "cmd_get") > cmd_get);

    // stats reset zeroes the counters
    transact(&mut stream, b"stats reset\r\n", b"RESET\r\n");
    stream.write_all(b"stats\r\n").expect("failed to send");
    let stats = read_until(&mut stream, b"END\r\n");
    assert_eq!(stat_value(&stats, "cmd_get"), 0);
}

fn flush_all() {
    let mut stream = connect();
    transact(&mut stream, b"set doomed 0 0 1\r\nx\r\n", b"STORED\r\n");
    transact(&mut stream, b"flush_all\r\n", b"OK\r\n");
    transact(&mut stream, b"get doomed\r\n", b"END\r\n");
}

fn binary_roundtrip() {
    let mut stream = connect();

    // set with flags
    let mut extras = Vec::new();
    extras.extend_from_slice(&9u32.to_be_bytes());
    extras.extend_from_slice(&0u32.to_be_bytes());
    let request = bin_request(0x01, &extras, b"bkey", b"bvalue");
    stream.write_all(&request).expect("failed to send");

    let mut header = [0; 24];
    stream.read_exact(&mut header).expect("no set response");
    assert_eq!(header[0], 0x81);
    assert_eq!(header[1], 0x01);
    assert_eq!(u16::from_be_bytes([header[6], header[7]]), 0);

    // get returns flags in extras and the value as the body
    let request = bin_request(0x00, &[], b"bkey", &[]);
    stream.write_all(&request).expect("failed to send");

    let mut header = [0; 24];
    stream.read_exact(&mut header).expect("no get response");
    assert_eq!(header[0], 0x81);
    assert_eq!(header[1], 0x00);
    assert_eq!(u16::from_be_bytes([header[6], header[7]]), 0);
    let bodylen = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
    assert_eq!(bodylen, 4 + 6);
    let mut body = vec![0; bodylen as usize];
    stream.read_exact(&mut body).expect("no get body");
    assert_eq!(u32::from_be_bytes([body[0], body[1], body[2], body[3]]), 9);
    assert_eq!(&body[4..], b"bvalue");

    // a miss is a key-not-found status
    let request = bin_request(0x00, &[], b"absent", &[]);
    stream.write_all(&request).expect("failed to send");
    let mut header = [0; 24];
    stream.read_exact(&mut header).expect("no miss response");
    assert_eq!(u16::from_be_bytes([header[6], header[7]]), 0x0001);
    let bodylen = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
    let mut body = vec![0; bodylen as usize];
    stream.read_exact(&mut body).expect("no miss body");
}

fn binary_quiet_miss_is_silent() {
    let mut stream = connect();

    // GETQ for an absent key produces no response bytes; the NOOP which
    // follows is answered alone
    let mut request = bin_request(0x09, &[], b"absent", &[]);
    request.extend_from_slice(&bin_request(0x0a, &[], &[], &[]));
    stream.write_all(&request).expect("failed to send");

    let mut header = [0; 24];
    stream.read_exact(&mut header).expect("no noop response");
    assert_eq!(header[0], 0x81);
    assert_eq!(header[1], 0x0a);
    assert_eq!(u16::from_be_bytes([header[6], header[7]]), 0);
    expect_silence(&mut stream);
}

fn udp_single_packet() {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("failed to bind");
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("failed to set timeout");

    // frame header: request id 7, sequence 0, total 1
    let mut datagram = vec![0, 7, 0, 0, 0, 1, 0, 0];
    datagram.extend_from_slice(b"set u 0 0 1\r\nu\r\n");
    socket.send_to(&datagram, ADDR).expect("failed to send");

    let mut buf = [0; 1500];
    let (len, _) = socket.recv_from(&mut buf).expect("no udp response");
    assert_eq!(&buf[0..2], &[0, 7]); // request id echoed
    assert_eq!(&buf[2..4], &[0, 0]); // sequence 0
    assert_eq!(&buf[4..6], &[0, 1]); // single datagram reply
    assert_eq!(&buf[8..len], b"STORED\r\n");

    // multi-packet requests are refused
    let mut datagram = vec![0, 8, 0, 0, 0, 2, 0, 0];
    datagram.extend_from_slice(b"get u\r\n");
    socket.send_to(&datagram, ADDR).expect("failed to send");
    let (len, _) = socket.recv_from(&mut buf).expect("no udp error response");
    assert_eq!(
        &buf[8..len],
        &b"SERVER_ERROR multi-packet request not supported\r\n"[..]
    );
}
