//! Synchronous delivery against the threaded test server.

mod harness;

use std::thread;
use std::time::{Duration, Instant};

use harness::{Behavior, TestServer};
use wsclient::protocol::OpCode;
use wsclient::{
    Client, CloseCode, CloseFrame, Config, ConnectionState, DeliveryMode, Error, Message,
    Timeouts,
};

const WINDOW: Duration = Duration::from_millis(200);

fn connected(server: &TestServer) -> Client {
    let client = Client::new(Config::default());
    client.connect(Some(&server.url("/echo"))).unwrap();
    client
}

/// Call `receive` until the client reports closed or the deadline passes.
fn wait_closed(client: &Client) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while client.is_open() && Instant::now() < deadline {
        let _ = client.receive(Duration::from_millis(50));
    }
}

#[test]
fn test_echo_returns_exactly_one_text() {
    let server = TestServer::spawn(Behavior::Echo);
    let client = connected(&server);

    assert!(client.is_open());
    assert_eq!(client.state(), ConnectionState::Open);

    let replies = client
        .send_and_wait("ping-text", Duration::from_millis(50))
        .unwrap();
    assert_eq!(replies, vec![Message::text("ping-text")]);
    assert_eq!(client.delivery_mode(), DeliveryMode::Sync);
}

#[test]
fn test_binary_echo() {
    let server = TestServer::spawn(Behavior::Echo);
    let client = connected(&server);

    let payload: Vec<u8> = (0..=255).cycle().take(70_000).collect();
    let replies = client
        .send_and_wait(payload.clone(), Duration::from_secs(1))
        .unwrap();
    assert_eq!(replies, vec![Message::Binary(payload)]);
}

#[test]
fn test_client_frames_are_masked() {
    let server = TestServer::spawn(Behavior::Echo);
    let client = connected(&server);

    client.send_and_wait("one", WINDOW).unwrap();
    client.send_and_wait(vec![1u8, 2, 3], WINDOW).unwrap();

    let received = server.received();
    assert!(received.len() >= 2);
    assert!(received.iter().all(|r| r.masked));
}

#[test]
fn test_upgrade_request_carries_headers() {
    let server = TestServer::spawn(Behavior::Echo);
    let client = Client::new(Config::default().with_header("X-Trace", "abc123"));
    client
        .connect(Some(&format!("{}?room=7", server.url("/chat"))))
        .unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.starts_with("GET /chat?room=7 HTTP/1.1\r\n"));
    assert!(request.contains(&format!("Host: {}\r\n", server.addr())));
    assert!(request.contains("Sec-WebSocket-Version: 13\r\n"));
    assert!(request.contains("X-Trace: abc123\r\n"));
}

#[test]
fn test_server_ping_is_answered_and_hidden() {
    let server = TestServer::spawn(Behavior::PingFirst);
    let client = connected(&server);

    let replies = client.send_and_wait("hello", WINDOW).unwrap();
    assert_eq!(replies, vec![Message::text("hello")]);
    assert!(!replies.iter().any(|m| matches!(m, Message::Ping(_))));

    let deadline = Instant::now() + Duration::from_secs(2);
    let pong = loop {
        let pong = server
            .received()
            .into_iter()
            .find(|r| r.frame.opcode == OpCode::Pong);
        if pong.is_some() || Instant::now() > deadline {
            break pong;
        }
        thread::sleep(Duration::from_millis(10));
    };
    let pong = pong.expect("server never saw a pong");
    assert!(pong.masked);
    assert_eq!(pong.frame.payload(), b"are-you-there");
}

#[test]
fn test_fragmented_reply_is_reassembled() {
    let server = TestServer::spawn(Behavior::EchoFragmented);
    let client = connected(&server);

    let mut replies = client.send_and_wait("split me please", WINDOW).unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while replies.len() < 2 && Instant::now() < deadline {
        replies.extend(client.receive(Duration::from_millis(50)).unwrap());
    }
    assert_eq!(
        replies,
        vec![Message::text("split me please"), Message::text("split me please")]
    );
}

#[test]
fn test_explicit_ping_gets_pong() {
    let server = TestServer::spawn(Behavior::Echo);
    let client = connected(&server);

    let replies = client.send_and_wait(Message::ping("abc"), WINDOW).unwrap();
    assert_eq!(replies, vec![Message::pong("abc")]);
}

#[test]
fn test_close_is_idempotent() {
    let server = TestServer::spawn(Behavior::Echo);
    let client = connected(&server);

    client.close();
    assert!(!client.is_open());
    assert!(client.is_closed());
    assert_eq!(client.state(), ConnectionState::Closed);

    client.close();
    client.close();
    assert!(client.is_closed());

    let err = client.send_and_wait("late", WINDOW).unwrap_err();
    assert_eq!(err, Error::ConnectionClosed);
}

#[test]
fn test_close_sends_normal_close_frame() {
    let server = TestServer::spawn(Behavior::Echo);
    let client = connected(&server);
    client.close();

    let deadline = Instant::now() + Duration::from_secs(2);
    let close = loop {
        let close = server
            .received()
            .into_iter()
            .find(|r| r.frame.opcode == OpCode::Close);
        if close.is_some() || Instant::now() > deadline {
            break close;
        }
        thread::sleep(Duration::from_millis(10));
    };
    let close = close.expect("server never saw a close frame");
    assert_eq!(&close.frame.payload()[..2], &1000u16.to_be_bytes());
}

#[test]
fn test_user_close_frame_is_not_repeated() {
    let server = TestServer::spawn(Behavior::Echo);
    let client = connected(&server);

    let replies = client
        .send_and_wait(Message::close(CloseCode::Normal, "bye"), WINDOW)
        .unwrap();
    assert!(matches!(replies.as_slice(), [Message::Close(_)]));
    client.close();
    assert!(client.is_closed());

    thread::sleep(Duration::from_millis(100));
    let closes: Vec<_> = server
        .received()
        .into_iter()
        .filter(|r| r.frame.opcode == OpCode::Close)
        .collect();
    assert_eq!(closes.len(), 1);
    assert_eq!(&closes[0].frame.payload()[2..], b"bye");

    let err = client.send_and_wait("late", WINDOW).unwrap_err();
    assert_eq!(err, Error::ConnectionClosed);
}

#[test]
fn test_connect_when_open_is_noop() {
    let server = TestServer::spawn(Behavior::Echo);
    let client = connected(&server);

    client.connect(None).unwrap();
    client.connect(Some(&server.url("/other"))).unwrap();
    assert!(client.is_open());
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn test_connect_without_url() {
    let client = Client::default();
    let err = client.connect(None).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(client.is_closed());
}

#[test]
fn test_unsupported_scheme() {
    let client = Client::default();
    let err = client.connect(Some("ftp://127.0.0.1:21/")).unwrap_err();
    assert!(matches!(err, Error::Configuration(msg) if msg.contains("ftp")));
}

#[test]
fn test_refused_connection_is_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = Client::default();
    let err = client
        .connect(Some(&format!("ws://127.0.0.1:{port}/")))
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(client.is_closed());
}

#[test]
fn test_handshake_timeout() {
    let server = TestServer::spawn(Behavior::Silent);
    let timeouts = Timeouts::default().with_handshake(Some(Duration::from_millis(200)));
    let client = Client::new(Config::default().with_timeouts(timeouts));

    let started = Instant::now();
    let err = client.connect(Some(&server.url("/"))).unwrap_err();
    assert_eq!(err, Error::HandshakeTimeout(200));
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(client.is_closed());
}

#[test]
fn test_server_close_is_delivered() {
    let server = TestServer::spawn(Behavior::CloseOnMessage);
    let client = connected(&server);

    let mut replies = client.send_and_wait("hi", WINDOW).unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while replies.is_empty() && Instant::now() < deadline {
        replies.extend(client.receive(Duration::from_millis(50)).unwrap_or_default());
    }
    assert_eq!(
        replies,
        vec![Message::Close(Some(CloseFrame::new(CloseCode::Normal, "bye")))]
    );

    wait_closed(&client);
    assert!(client.is_closed());
}

#[test]
fn test_dropped_stream_closes_client() {
    let server = TestServer::spawn(Behavior::DropAfterHandshake);
    let client = connected(&server);

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut last = Ok(Vec::new());
    while client.is_open() && Instant::now() < deadline {
        last = client.receive(Duration::from_millis(50));
    }
    assert!(client.is_closed());
    assert!(last.is_err());
}

#[test]
fn test_reconnect_after_close() {
    let server = TestServer::spawn(Behavior::Echo);
    let client = connected(&server);
    client.close();
    assert!(client.is_closed());

    client.reconnect().unwrap();
    assert!(client.is_open());
    assert_eq!(server.requests().len(), 2);

    let replies = client.send_and_wait("again", WINDOW).unwrap();
    assert_eq!(replies, vec![Message::text("again")]);
}

#[test]
fn test_async_send_rejected_in_sync_mode() {
    let server = TestServer::spawn(Behavior::Echo);
    let client = connected(&server);

    client.send_and_wait("first", WINDOW).unwrap();
    let err = client.send("second").unwrap_err();
    assert!(matches!(err, Error::DeliveryModeConflict { active: "sync", .. }));
    assert!(client.is_open());
}
