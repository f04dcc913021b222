//! Blocking test server. Each accepted connection runs on its own thread and
//! follows one [`Behavior`].

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wsclient::protocol::{Frame, OpCode, compute_accept_key};

/// What the server does once a client connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Echo text and binary messages, answer pings, answer close.
    Echo,
    /// Send a ping right after the handshake, then echo.
    PingFirst,
    /// Echo every message twice: once whole, once split into two fragments
    /// with a ping in between.
    EchoFragmented,
    /// On the first data message, send a close frame and end the stream.
    CloseOnMessage,
    /// Read the upgrade request and never answer it.
    Silent,
    /// Complete the handshake, then drop the TCP connection.
    DropAfterHandshake,
}

/// A frame the server received from the client.
#[derive(Debug, Clone)]
pub struct Received {
    pub masked: bool,
    pub frame: Frame,
}

pub struct TestServer {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    received: Arc<Mutex<Vec<Received>>>,
    requests: Arc<Mutex<Vec<String>>>,
    acceptor: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn spawn(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        listener.set_nonblocking(true).expect("nonblocking listener");
        let addr = listener.local_addr().expect("local addr");

        let stop = Arc::new(AtomicBool::new(false));
        let received = Arc::new(Mutex::new(Vec::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let acceptor = {
            let stop = Arc::clone(&stop);
            let received = Arc::clone(&received);
            let requests = Arc::clone(&requests);
            thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    match listener.accept() {
                        Ok((stream, _)) => {
                            let conn = Connection {
                                stream,
                                stop: Arc::clone(&stop),
                                received: Arc::clone(&received),
                                requests: Arc::clone(&requests),
                                buffer: Vec::new(),
                            };
                            thread::spawn(move || {
                                let _ = conn.serve(behavior);
                            });
                        }
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                            thread::sleep(Duration::from_millis(5));
                        }
                        Err(_) => break,
                    }
                }
            })
        };

        Self {
            addr,
            stop,
            received,
            requests,
            acceptor: Some(acceptor),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Frames received from clients so far.
    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    /// Raw upgrade requests received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.acceptor.take() {
            let _ = handle.join();
        }
    }
}

struct Connection {
    stream: TcpStream,
    stop: Arc<AtomicBool>,
    received: Arc<Mutex<Vec<Received>>>,
    requests: Arc<Mutex<Vec<String>>>,
    buffer: Vec<u8>,
}

impl Connection {
    fn serve(mut self, behavior: Behavior) -> io::Result<()> {
        self.stream.set_nonblocking(false)?;
        self.stream
            .set_read_timeout(Some(Duration::from_millis(50)))?;

        let Some(key) = self.read_request()? else {
            return Ok(());
        };
        if behavior == Behavior::Silent {
            // hold the socket until the client gives up
            while self.fill()? {}
            return Ok(());
        }

        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\r\n",
            compute_accept_key(&key)
        );
        self.stream.write_all(response.as_bytes())?;

        match behavior {
            Behavior::DropAfterHandshake => {
                thread::sleep(Duration::from_millis(20));
                self.stream.shutdown(Shutdown::Both)?;
                return Ok(());
            }
            Behavior::PingFirst => self.send(Frame::ping(b"are-you-there".to_vec()))?,
            _ => {}
        }

        while let Some(frame) = self.next_frame()? {
            match frame.opcode {
                OpCode::Text | OpCode::Binary => match behavior {
                    Behavior::CloseOnMessage => {
                        let mut payload = 1000u16.to_be_bytes().to_vec();
                        payload.extend_from_slice(b"bye");
                        self.send(Frame::new(true, OpCode::Close, payload))?;
                        thread::sleep(Duration::from_millis(20));
                        self.stream.shutdown(Shutdown::Both)?;
                        return Ok(());
                    }
                    Behavior::EchoFragmented => {
                        self.send(Frame::new(true, frame.opcode, frame.payload().to_vec()))?;
                        let (head, tail) = frame.payload().split_at(frame.payload().len() / 2);
                        let mut bytes = Frame::new(false, frame.opcode, head.to_vec()).encode(None);
                        bytes.extend(Frame::ping(b"mid".to_vec()).encode(None));
                        bytes.extend(Frame::new(true, OpCode::Continuation, tail.to_vec()).encode(None));
                        self.stream.write_all(&bytes)?;
                    }
                    _ => self.send(Frame::new(true, frame.opcode, frame.payload().to_vec()))?,
                },
                OpCode::Ping => self.send(Frame::new(true, OpCode::Pong, frame.payload().to_vec()))?,
                OpCode::Close => {
                    self.send(Frame::new(true, OpCode::Close, frame.payload().to_vec()))?;
                    self.stream.shutdown(Shutdown::Both)?;
                    return Ok(());
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn send(&mut self, frame: Frame) -> io::Result<()> {
        self.stream.write_all(&frame.encode(None))
    }

    /// Read more bytes. `Ok(false)` on EOF or server stop.
    fn fill(&mut self) -> io::Result<bool> {
        let mut chunk = [0u8; 4096];
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return Ok(false);
            }
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    return Ok(true);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn read_request(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(end) = self.buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                let head: Vec<u8> = self.buffer.drain(..end + 4).collect();
                let text = String::from_utf8_lossy(&head).into_owned();
                let key = text.lines().find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.trim()
                        .eq_ignore_ascii_case("sec-websocket-key")
                        .then(|| value.trim().to_string())
                });
                self.requests.lock().unwrap().push(text);
                return Ok(key);
            }
            if !self.fill()? {
                return Ok(None);
            }
        }
    }

    fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        loop {
            if self.buffer.len() >= 2 {
                let masked = self.buffer[1] & 0x80 != 0;
                if let Ok((frame, consumed)) = Frame::parse(&self.buffer) {
                    self.buffer.drain(..consumed);
                    self.received.lock().unwrap().push(Received {
                        masked,
                        frame: frame.clone(),
                    });
                    return Ok(Some(frame));
                }
            }
            if !self.fill()? {
                return Ok(None);
            }
        }
    }
}
