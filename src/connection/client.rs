use std::io;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use url::{Host, Url};

use crate::channel::{ByteChannel, Interest, PlainChannel, Transfer};
use crate::codec::{FrameDecoder, FrameEncoder};
use crate::config::Config;
use crate::connection::mode::{DeliveryMode, ModeCell};
use crate::connection::outbox::Outbox;
use crate::connection::poller;
use crate::connection::{ConnectionState, MessageQueue};
use crate::error::{Error, Result};
use crate::events::{Event, EventEmitter, EventKind};
use crate::message::{CloseCode, Message};
use crate::protocol::ClientHandshake;

#[cfg(feature = "tls-rustls")]
use crate::channel::{TlsChannel, build_client_config};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T: Clone>(rw: &RwLock<T>) -> T {
    rw.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn replace<T>(rw: &RwLock<T>, value: T) -> T {
    std::mem::replace(
        &mut *rw.write().unwrap_or_else(PoisonError::into_inner),
        value,
    )
}

fn is_broken_pipe(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::WriteZero
    )
}

/// Result of one read-pump pass that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PumpStatus {
    /// Nothing more to read right now.
    Idle,
    /// The server sent a close frame and then ended the stream.
    PeerClosed,
}

/// State shared between a [`Client`] and its poller thread.
#[derive(Debug)]
pub(crate) struct Inner {
    url: Mutex<Option<Url>>,
    config: RwLock<Arc<Config>>,
    state: Mutex<ConnectionState>,
    channel: RwLock<Option<Arc<dyn ByteChannel>>>,
    // clone of the TCP socket, kept for shutdown only
    raw_socket: Mutex<Option<TcpStream>>,
    handshake: Mutex<Option<ClientHandshake>>,
    encoder: Mutex<FrameEncoder>,
    decoder: Mutex<FrameDecoder>,
    pub(crate) queue: MessageQueue,
    pub(crate) events: EventEmitter,
    mode: ModeCell,
    closed: AtomicBool,
    closing: AtomicBool,
    pipe_broken: AtomicBool,
    peer_closed: AtomicBool,
    connect_lock: Mutex<()>,
    outbox: Mutex<Outbox>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn new(config: Config) -> Self {
        Self {
            url: Mutex::new(None),
            decoder: Mutex::new(FrameDecoder::new(config.limits.clone())),
            config: RwLock::new(Arc::new(config)),
            state: Mutex::new(ConnectionState::Idle),
            channel: RwLock::new(None),
            raw_socket: Mutex::new(None),
            handshake: Mutex::new(None),
            encoder: Mutex::new(FrameEncoder::default()),
            queue: MessageQueue::new(),
            events: EventEmitter::new(),
            mode: ModeCell::new(),
            closed: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            pipe_broken: AtomicBool::new(false),
            peer_closed: AtomicBool::new(false),
            connect_lock: Mutex::new(()),
            outbox: Mutex::new(Outbox::default()),
            poller: Mutex::new(None),
        }
    }

    pub(crate) fn config(&self) -> Arc<Config> {
        read(&self.config)
    }

    fn channel(&self) -> Option<Arc<dyn ByteChannel>> {
        read(&self.channel)
    }

    fn set_state(&self, state: ConnectionState) {
        let mut current = lock(&self.state);
        if *current != state {
            trace!("state {} -> {}", *current, state);
            *current = state;
        }
    }

    pub(crate) fn is_closed_flag(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn shutting_down(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.closing.load(Ordering::Acquire)
    }

    fn handshake_finished(&self) -> bool {
        lock(&self.handshake)
            .as_ref()
            .is_some_and(ClientHandshake::is_finished)
    }

    fn is_open(&self) -> bool {
        self.handshake_finished() && !self.is_closed_flag()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::ConnectionClosed)
        }
    }

    // ---- connect ---------------------------------------------------------

    fn connect(&self, url: Option<&str>) -> Result<()> {
        let _guard = lock(&self.connect_lock);
        if self.is_open() {
            debug!("connect ignored: connection already open");
            return Ok(());
        }

        if let Some(url) = url {
            *lock(&self.url) = Some(Url::parse(url)?);
        }
        let url = lock(&self.url)
            .clone()
            .ok_or_else(|| Error::Configuration("no URL to connect to".into()))?;
        let config = self.config();

        self.set_state(ConnectionState::Connecting);
        debug!("connecting to {url}");
        match self.open(&url, &config) {
            Ok(()) => {
                self.set_state(ConnectionState::Open);
                debug!("connection to {url} open");
                self.events.emit(&Event::Open);
                Ok(())
            }
            Err(e) => {
                warn!("connect to {url} failed: {e}");
                self.close();
                Err(e)
            }
        }
    }

    fn open(&self, url: &Url, config: &Config) -> Result<()> {
        let secure = match url.scheme() {
            "ws" | "http" => false,
            "wss" | "https" => true,
            other => {
                return Err(Error::Configuration(format!(
                    "unsupported URL scheme: {other}"
                )));
            }
        };
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(Error::Configuration(format!("URL has no host: {url}"))),
        };
        let port = url
            .port_or_known_default()
            .unwrap_or(if secure { 443 } else { 80 });

        // cleared before dialing so a close() from here on sticks
        self.closed.store(false, Ordering::Release);
        self.pipe_broken.store(false, Ordering::Release);
        self.peer_closed.store(false, Ordering::Release);
        *lock(&self.handshake) = None;
        lock(&self.outbox).reset();

        let transport = |e: io::Error| Error::Transport(format!("{host}:{port}: {e}"));
        let stream = tcp_connect(&host, port, config.connect_timeout).map_err(transport)?;
        stream.set_nodelay(true).map_err(transport)?;
        *lock(&self.raw_socket) = Some(stream.try_clone().map_err(transport)?);
        if self.is_closed_flag() {
            return Err(Error::ConnectionClosed);
        }

        let channel: Result<Arc<dyn ByteChannel>> = if secure {
            self.open_tls(stream, &host, config)
        } else {
            PlainChannel::new(stream)
                .map(|plain| Arc::new(plain) as Arc<dyn ByteChannel>)
                .map_err(Error::from)
        };
        let channel = match channel {
            Ok(channel) => channel,
            Err(_) if self.is_closed_flag() => return Err(Error::ConnectionClosed),
            Err(e) => return Err(e),
        };

        {
            let mut slot = self.channel.write().unwrap_or_else(PoisonError::into_inner);
            if self.is_closed_flag() {
                debug!("closed while dialing {url}");
                channel.shutdown();
                return Err(Error::ConnectionClosed);
            }
            *slot = Some(Arc::clone(&channel));
        }

        self.drive_handshake(&channel, url, config)
    }

    #[cfg(feature = "tls-rustls")]
    fn open_tls(
        &self,
        stream: TcpStream,
        host: &str,
        config: &Config,
    ) -> Result<Arc<dyn ByteChannel>> {
        let tls_config = build_client_config(&config.tls)?;
        let channel = TlsChannel::connect(stream, host, tls_config, config.timeouts.handshake)
            .map_err(|e| Error::Transport(format!("{host}: {e}")))?;
        Ok(Arc::new(channel))
    }

    #[cfg(not(feature = "tls-rustls"))]
    fn open_tls(
        &self,
        _stream: TcpStream,
        _host: &str,
        _config: &Config,
    ) -> Result<Arc<dyn ByteChannel>> {
        Err(Error::Configuration(
            "secure URL requires the `tls-rustls` feature".into(),
        ))
    }

    fn drive_handshake(
        &self,
        channel: &Arc<dyn ByteChannel>,
        url: &Url,
        config: &Config,
    ) -> Result<()> {
        let mut handshake =
            ClientHandshake::new(url, &config.headers, config.limits.max_handshake_size)?;
        self.write_bytes(channel.as_ref(), handshake.request_bytes(), false)?;

        let timeouts = &config.timeouts;
        let started = Instant::now();
        let mut buf = vec![0u8; config.chunk_size];

        while !handshake.is_finished() {
            if self.is_closed_flag() {
                return Err(Error::ConnectionClosed);
            }
            let wait = match timeouts.handshake {
                Some(deadline) => {
                    let left = deadline.saturating_sub(started.elapsed());
                    if left.is_zero() {
                        return Err(Error::HandshakeTimeout(deadline.as_millis()));
                    }
                    left.min(timeouts.handshake_poll)
                }
                None => timeouts.handshake_poll,
            };

            if !channel.has_buffered_bytes() && !channel.wait_readable(wait)? {
                continue;
            }
            match channel.read(&mut buf)? {
                Transfer::Ready(0) => {
                    return Err(Error::InvalidHandshake(
                        "connection closed during handshake".into(),
                    ));
                }
                Transfer::Ready(n) => handshake.feed(&buf[..n])?,
                Transfer::Blocked(Interest::Read) => {}
                Transfer::Blocked(Interest::Write) => {
                    channel.wait_writable(timeouts.write_retry)?;
                }
            }
        }

        let leftover = handshake.take_leftover();
        {
            let mut decoder = lock(&self.decoder);
            *decoder = FrameDecoder::new(config.limits.clone());
            decoder.extend(&leftover);
        }
        *lock(&self.encoder) = FrameEncoder::new(handshake.version())?;
        *lock(&self.handshake) = Some(handshake);
        debug!(
            "handshake with {url} finished ({} leftover bytes)",
            leftover.len()
        );
        Ok(())
    }

    // ---- write pump ------------------------------------------------------

    /// Encode and write one message, returning once the channel has taken it.
    ///
    /// Nothing is written after a close frame; later calls fail with
    /// `Error::ConnectionClosed`.
    pub(crate) fn write_message(&self, message: Message) -> Result<()> {
        let is_close = matches!(message, Message::Close(_));
        let bytes = lock(&self.encoder).encode(message)?;
        let channel = self.channel().ok_or(Error::ConnectionClosed)?;
        self.write_bytes(channel.as_ref(), &bytes, is_close)
    }

    fn write_bytes(&self, channel: &dyn ByteChannel, bytes: &[u8], is_close: bool) -> Result<()> {
        let target = lock(&self.outbox)
            .push(bytes, is_close)
            .ok_or(Error::ConnectionClosed)?;
        self.drain_until(channel, target)
            .map_err(|e| self.write_failed(e))
    }

    /// Keep handing the backlog to the channel until everything up to
    /// `target` is accepted, then flush. Waits hold no lock, so the read pump
    /// and other writers keep running.
    fn drain_until(&self, channel: &dyn ByteChannel, target: u64) -> io::Result<()> {
        let retry = self.config().timeouts.write_retry;

        loop {
            if self.is_closed_flag() {
                return Ok(());
            }
            let blocked = self.drain_outbox(channel)?;
            if lock(&self.outbox).reached(target) {
                break;
            }
            match blocked {
                Some(Interest::Read) => {
                    channel.wait_readable(retry)?;
                }
                _ => {
                    channel.wait_writable(retry)?;
                }
            }
        }

        loop {
            if self.is_closed_flag() {
                return Ok(());
            }
            match channel.flush()? {
                Transfer::Ready(_) => return Ok(()),
                Transfer::Blocked(Interest::Read) => {
                    channel.wait_readable(retry)?;
                }
                Transfer::Blocked(Interest::Write) => {
                    channel.wait_writable(retry)?;
                }
            }
        }
    }

    /// One non-blocking pass over the backlog. Returns the readiness the
    /// channel is waiting for, or `None` once the backlog is empty.
    fn drain_outbox(&self, channel: &dyn ByteChannel) -> io::Result<Option<Interest>> {
        let mut outbox = lock(&self.outbox);
        while !outbox.is_empty() {
            match channel.write(outbox.pending())? {
                Transfer::Ready(0) => return Err(io::ErrorKind::WriteZero.into()),
                Transfer::Ready(n) => outbox.advance(n),
                Transfer::Blocked(interest) => return Ok(Some(interest)),
            }
        }
        Ok(None)
    }

    /// Push out what the channel accepts right now without waiting.
    /// Returns whether anything is still held back.
    fn push_backlog(&self, channel: &dyn ByteChannel) -> io::Result<bool> {
        if self.drain_outbox(channel)?.is_some() {
            return Ok(true);
        }
        Ok(matches!(channel.flush()?, Transfer::Blocked(_)))
    }

    /// Queue a pong behind whatever is being written. The read pump never
    /// waits on a writer.
    fn queue_pong(&self, channel: &dyn ByteChannel, payload: Vec<u8>) -> Result<()> {
        let bytes = lock(&self.encoder).encode(Message::Pong(payload))?;
        if lock(&self.outbox).push(&bytes, false).is_none() {
            trace!("pong dropped, close frame already sent");
            return Ok(());
        }
        self.push_backlog(channel)
            .map(drop)
            .map_err(|e| self.write_failed(e))
    }

    /// Best-effort close frame: queued once per connection, written only as
    /// far as the channel accepts it without waiting.
    fn send_close_frame(&self, channel: &dyn ByteChannel) -> Result<()> {
        let bytes = lock(&self.encoder).encode(Message::close(CloseCode::Normal, ""))?;
        if lock(&self.outbox).push(&bytes, true).is_none() {
            trace!("close frame already sent");
            return Ok(());
        }
        if self.push_backlog(channel)? {
            debug!("close frame left partly unsent");
        }
        Ok(())
    }

    fn write_failed(&self, err: io::Error) -> Error {
        if is_broken_pipe(&err) {
            warn!("write failed, peer gone: {err}");
            self.pipe_broken.store(true, Ordering::Release);
            self.close();
            Error::PipeBroken
        } else {
            warn!("write failed: {err}");
            self.close();
            Error::from(err)
        }
    }

    // ---- read pump -------------------------------------------------------

    /// One read-pump pass. Failures close the connection before returning.
    pub(crate) fn pump(&self, timeout: Duration) -> Result<PumpStatus> {
        match self.pump_inner(timeout) {
            Ok(status) => Ok(status),
            Err(e) => {
                if !self.is_closed_flag() {
                    warn!("read pump failed: {e}");
                    self.close();
                }
                Err(e)
            }
        }
    }

    fn pump_inner(&self, timeout: Duration) -> Result<PumpStatus> {
        let Some(channel) = self.channel() else {
            return Ok(PumpStatus::Idle);
        };
        let config = self.config();
        let retry = config.timeouts.write_retry;
        let mut buf = vec![0u8; config.chunk_size];
        let mut deadline = Instant::now() + timeout;

        // frames that arrived together with the handshake response
        let pending = lock(&self.decoder).buffered();
        if pending > 0 && self.dispatch(channel.as_ref())? {
            deadline = Instant::now() + config.timeouts.follow_up;
        }

        loop {
            if self.is_closed_flag() {
                return Ok(PumpStatus::Idle);
            }
            // queued pongs go out between reads
            let backlog = match self.push_backlog(channel.as_ref()) {
                Ok(backlog) => backlog,
                Err(e) => return Err(self.write_failed(e)),
            };
            if !channel.has_buffered_bytes() {
                let left = deadline.saturating_duration_since(Instant::now());
                let wait = if backlog { left.min(retry) } else { left };
                match channel.wait_readable(wait) {
                    Ok(true) => {}
                    Ok(false) if backlog && !left.is_zero() => continue,
                    Ok(false) => return Ok(PumpStatus::Idle),
                    Err(e) => return self.read_failed(e),
                }
            }
            if self.is_closed_flag() {
                return Ok(PumpStatus::Idle);
            }

            match channel.read(&mut buf) {
                Ok(Transfer::Ready(0)) => return self.end_of_stream(),
                Ok(Transfer::Ready(n)) => {
                    trace!("read {n} bytes");
                    lock(&self.decoder).extend(&buf[..n]);
                }
                Ok(Transfer::Blocked(Interest::Read)) => continue,
                Ok(Transfer::Blocked(Interest::Write)) => {
                    if let Err(e) = channel.wait_writable(config.timeouts.write_retry) {
                        return self.read_failed(e);
                    }
                    continue;
                }
                Err(e) => return self.read_failed(e),
            }

            let wait = if self.dispatch(channel.as_ref())? {
                config.timeouts.follow_up
            } else {
                timeout
            };
            deadline = Instant::now() + wait;
        }
    }

    /// Route every complete message out of the decoder. Returns whether any
    /// message was produced.
    fn dispatch(&self, channel: &dyn ByteChannel) -> Result<bool> {
        let mut produced = false;
        loop {
            let next = lock(&self.decoder).next_message()?;
            let Some(message) = next else {
                return Ok(produced);
            };
            produced = true;

            match message {
                Message::Ping(payload) => {
                    trace!("ping ({} bytes), answering", payload.len());
                    self.queue_pong(channel, payload)?;
                }
                Message::Close(frame) => {
                    debug!("close frame from server: {frame:?}");
                    self.peer_closed.store(true, Ordering::Release);
                    self.queue.push(Message::Close(frame));
                }
                other => self.queue.push(other),
            }
        }
    }

    fn end_of_stream(&self) -> Result<PumpStatus> {
        if self.shutting_down() {
            return Ok(PumpStatus::Idle);
        }
        if self.peer_closed.load(Ordering::Acquire) {
            debug!("server ended the stream after its close frame");
            return Ok(PumpStatus::PeerClosed);
        }
        Err(Error::ConnectionClosed)
    }

    fn read_failed(&self, err: io::Error) -> Result<PumpStatus> {
        if self.shutting_down() {
            return Ok(PumpStatus::Idle);
        }
        if is_broken_pipe(&err) {
            self.pipe_broken.store(true, Ordering::Release);
        }
        Err(Error::from(err))
    }

    // ---- poller & close --------------------------------------------------

    fn ensure_poller(self: &Arc<Self>) -> Result<()> {
        let mut slot = lock(&self.poller);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }
        *slot = Some(poller::spawn(Arc::clone(self))?);
        Ok(())
    }

    fn stop_poller(&self) {
        let Some(handle) = lock(&self.poller).take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            // the poller is closing its own connection and exits on the closed flag
            return;
        }
        if handle.join().is_err() {
            warn!("poller thread panicked");
        }
    }

    /// Idempotent teardown.
    pub(crate) fn close(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }

        match self.channel() {
            None => {
                // a dial in progress sees the flag and gives up
                self.closed.store(true, Ordering::Release);
                if let Some(raw) = lock(&self.raw_socket).take() {
                    let _ = raw.shutdown(Shutdown::Both);
                }
                let mut state = lock(&self.state);
                if *state != ConnectionState::Idle {
                    *state = ConnectionState::Closed;
                }
            }
            Some(channel) => {
                let was_open = self.is_open();
                self.set_state(ConnectionState::Closing);

                if was_open && !self.pipe_broken.load(Ordering::Acquire) {
                    if let Err(e) = self.send_close_frame(channel.as_ref()) {
                        debug!("close frame not sent: {e}");
                    }
                }

                self.closed.store(true, Ordering::Release);
                if let Some(channel) = replace(&self.channel, None) {
                    channel.shutdown();
                }
                if let Some(raw) = lock(&self.raw_socket).take() {
                    let _ = raw.shutdown(Shutdown::Both);
                }
                self.stop_poller();
                self.set_state(ConnectionState::Closed);
                debug!("connection closed");

                if was_open {
                    self.events.emit(&Event::Close);
                }
            }
        }

        self.closing.store(false, Ordering::Release);
    }
}

fn tcp_connect(host: &str, port: u16, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let Some(timeout) = timeout else {
        return TcpStream::connect((host, port));
    };

    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    }))
}

/// A WebSocket client connection.
///
/// A `Client` is driven in one of two delivery modes, chosen by the first
/// call that sends or receives:
///
/// - **sync**: [`send_and_wait`](Client::send_and_wait) and
///   [`receive`](Client::receive) run the read pump on the caller's thread
///   and return whatever messages arrived.
/// - **async**: [`send`](Client::send) starts a background poller that
///   delivers messages as [`Event::Message`] to listeners registered with
///   [`on`](Client::on).
///
/// Pings from the server are answered automatically in both modes and never
/// reach the caller. Dropping the client closes it.
///
/// ```no_run
/// use std::time::Duration;
/// use wsclient::{Client, Config, Message};
///
/// let client = Client::new(Config::default());
/// client.connect(Some("ws://127.0.0.1:9001/echo"))?;
/// let replies = client.send_and_wait("ping-text", Duration::from_millis(50))?;
/// for reply in replies {
///     if let Message::Text(text) = reply {
///         println!("{text}");
///     }
/// }
/// client.close();
/// # Ok::<(), wsclient::Error>(())
/// ```
#[derive(Debug)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Create an unconnected client.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(Inner::new(config)),
        }
    }

    /// Open the connection. With `None`, the URL from the previous connect is
    /// reused. Does nothing if the connection is already open.
    ///
    /// # Errors
    ///
    /// - `Error::Configuration` if there is no URL or it cannot be used
    /// - `Error::Transport` if the TCP or TLS connection fails
    /// - `Error::HandshakeTimeout` / `Error::InvalidHandshake` for a failed upgrade
    ///
    /// The connection is closed again before any error is returned.
    pub fn connect(&self, url: Option<&str>) -> Result<()> {
        self.inner.connect(url)
    }

    /// Replace the configuration, then [`connect`](Client::connect).
    ///
    /// # Errors
    ///
    /// See [`Client::connect`].
    pub fn connect_with(&self, url: Option<&str>, config: Config) -> Result<()> {
        if !self.inner.is_open() {
            replace(&self.inner.config, Arc::new(config));
        }
        self.inner.connect(url)
    }

    /// Connect again with the stored URL and configuration.
    ///
    /// # Errors
    ///
    /// See [`Client::connect`].
    pub fn reconnect(&self) -> Result<()> {
        self.inner.connect(None)
    }

    /// Close the connection. Safe to call any number of times.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Handshake finished and not closed since.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *lock(&self.inner.state)
    }

    /// URL of the last connect attempt.
    #[must_use]
    pub fn url(&self) -> Option<Url> {
        lock(&self.inner.url).clone()
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        self.inner.config()
    }

    #[must_use]
    pub fn delivery_mode(&self) -> DeliveryMode {
        self.inner.mode.get()
    }

    /// Send one message, run one read-pump pass of up to `timeout`, and return
    /// every message received in arrival order.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the connection is not open
    /// - `Error::DeliveryModeConflict` if the poller drives this connection
    /// - write and read pump failures, after which the connection is closed
    pub fn send_and_wait(
        &self,
        message: impl Into<Message>,
        timeout: Duration,
    ) -> Result<Vec<Message>> {
        self.inner.ensure_open()?;
        self.inner.mode.claim(DeliveryMode::Sync)?;
        self.inner.write_message(message.into())?;
        self.collect(timeout)
    }

    /// [`send_and_wait`](Client::send_and_wait) with the configured response
    /// window.
    ///
    /// # Errors
    ///
    /// See [`Client::send_and_wait`].
    pub fn send_and_wait_default(&self, message: impl Into<Message>) -> Result<Vec<Message>> {
        let timeout = self.inner.config().timeouts.response;
        self.send_and_wait(message, timeout)
    }

    /// Run one read-pump pass of up to `timeout` without sending.
    ///
    /// Messages queued before the connection closed are still returned.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if closed with nothing left to deliver
    /// - `Error::DeliveryModeConflict` if the poller drives this connection
    pub fn receive(&self, timeout: Duration) -> Result<Vec<Message>> {
        self.inner.mode.claim(DeliveryMode::Sync)?;
        if !self.inner.is_open() {
            let pending = self.inner.queue.drain();
            return if pending.is_empty() {
                Err(Error::ConnectionClosed)
            } else {
                Ok(pending)
            };
        }
        self.collect(timeout)
    }

    fn collect(&self, timeout: Duration) -> Result<Vec<Message>> {
        if self.inner.pump(timeout)? == PumpStatus::PeerClosed {
            self.inner.close();
        }
        Ok(self.inner.queue.drain())
    }

    /// Send one message; replies arrive as [`Event::Message`] from the
    /// background poller, which this call starts on first use.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the connection is not open
    /// - `Error::DeliveryModeConflict` if the connection is used synchronously
    /// - `Error::Io` if the poller thread cannot be spawned
    /// - write pump failures, after which the connection is closed
    pub fn send(&self, message: impl Into<Message>) -> Result<()> {
        self.inner.ensure_open()?;
        self.inner.mode.claim(DeliveryMode::Async)?;
        self.inner.ensure_poller()?;
        self.inner.write_message(message.into())
    }

    /// Register a listener. Listeners may be added before connecting.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> &Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, listener);
        self
    }

    pub fn on_open<F>(&self, listener: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on(EventKind::Open, move |_| listener())
    }

    pub fn on_message<F>(&self, listener: F) -> &Self
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.on(EventKind::Message, move |event| {
            if let Event::Message(message) = event {
                listener(message);
            }
        })
    }

    pub fn on_close<F>(&self, listener: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on(EventKind::Close, move |_| listener())
    }

    pub fn on_error<F>(&self, listener: F) -> &Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on(EventKind::Error, move |event| {
            if let Event::Error(error) = event {
                listener(error);
            }
        })
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.inner.close();
    }
}
