//! Polled relay client.
//!
//! The socket is non-blocking: [`Transport::poll`] drains whatever has
//! arrived, completes the auth handshake, and reconnects on schedule
//! after the link drops. Subscriptions are remembered and replayed on
//! every successful handshake.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use multimeter_types::backend::{Profile, Transport, TransportEvent};
use multimeter_types::config::MultimeterConfig;
use multimeter_types::error::{MultimeterError, Result};

use crate::backoff::Backoff;
use crate::frame::{Inbound, LineBuffer, Outbound};

/// TCP connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum bytes queued for a relay that is not reading.
pub const MAX_OUTBOUND: usize = 4 * 1024 * 1024;

/// Relay connection settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// `host:port` of the relay.
    pub server: String,
    pub token: Option<String>,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RelayConfig {
    pub fn from_config(config: &MultimeterConfig) -> Self {
        Self {
            server: config.server.clone(),
            token: config.token.clone(),
            initial_backoff: config.reconnect.initial(),
            max_backoff: config.reconnect.max(),
        }
    }
}

/// State of the relay connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// No socket.
    Disconnected,
    /// Socket open, waiting for the auth reply.
    Authenticating,
    /// Authenticated and subscribed.
    Connected,
}

pub struct RelayClient {
    config: RelayConfig,
    stream: Option<TcpStream>,
    state: RelayState,
    lines: LineBuffer,
    channels: Vec<String>,
    backoff: Backoff,
    /// Set by `connect`; the client only reconnects once started.
    active: bool,
    retry_at: Option<Instant>,
    /// Events raised outside `poll`, delivered on the next one.
    pending: Vec<TransportEvent>,
    /// Encoded frames the socket has not accepted yet.
    outbox: Vec<u8>,
    /// Set when a write fails; `poll` tears the link down.
    broken: Option<String>,
}

impl RelayClient {
    pub fn new(config: RelayConfig) -> Self {
        let backoff = Backoff::new(config.initial_backoff, config.max_backoff);
        Self {
            config,
            stream: None,
            state: RelayState::Disconnected,
            lines: LineBuffer::new(),
            channels: Vec::new(),
            backoff,
            active: false,
            retry_at: None,
            pending: Vec::new(),
            outbox: Vec::new(),
            broken: None,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Bytes queued but not yet written to the socket.
    pub fn outbound_pending(&self) -> usize {
        self.outbox.len()
    }

    /// Channels replayed after every handshake.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    fn open(&mut self) -> Result<()> {
        let addr = self
            .config
            .server
            .to_socket_addrs()
            .map_err(|e| {
                MultimeterError::Transport(format!("resolve {}: {e}", self.config.server))
            })?
            .next()
            .ok_or_else(|| {
                MultimeterError::Transport(format!("no addresses for {}", self.config.server))
            })?;
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|e| MultimeterError::Transport(format!("connect {addr}: {e}")))?;
        stream
            .set_nonblocking(true)
            .map_err(|e| MultimeterError::Transport(format!("set non-blocking: {e}")))?;
        // Frames are small and latency-sensitive.
        let _ = stream.set_nodelay(true);

        self.reset_link();
        self.stream = Some(stream);
        self.state = RelayState::Authenticating;
        let token = self.config.token.clone();
        self.send(&Outbound::Auth {
            token: token.as_deref(),
        })
    }

    fn try_connect(&mut self, now: Instant) {
        log::info!("connecting to relay {}", self.config.server);
        if let Err(e) = self.open() {
            log::warn!("{e}");
            self.reset_link();
            self.schedule_retry(now);
        }
    }

    fn schedule_retry(&mut self, now: Instant) {
        let delay = self.backoff.next_delay();
        log::info!("retrying {} in {delay:?}", self.config.server);
        self.retry_at = Some(now + delay);
    }

    fn reset_link(&mut self) {
        self.stream = None;
        self.state = RelayState::Disconnected;
        self.lines.clear();
        self.outbox.clear();
        self.broken = None;
    }

    /// Queue a whole frame, then write as much as the socket accepts.
    fn send(&mut self, frame: &Outbound<'_>) -> Result<()> {
        if self.stream.is_none() {
            return Err(MultimeterError::Transport("not connected".to_string()));
        }
        if let Some(reason) = &self.broken {
            return Err(MultimeterError::Transport(format!("link failed: {reason}")));
        }
        let line = frame.encode()?;
        if self.outbox.len() + line.len() > MAX_OUTBOUND {
            let reason = format!("more than {MAX_OUTBOUND} bytes queued for the relay");
            self.broken = Some(reason.clone());
            return Err(MultimeterError::Transport(reason));
        }
        self.outbox.extend_from_slice(line.as_bytes());
        self.flush_outbox();
        match &self.broken {
            Some(reason) => Err(MultimeterError::Transport(format!("send: {reason}"))),
            None => Ok(()),
        }
    }

    /// Write queued bytes until the socket would block.
    fn flush_outbox(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        while !self.outbox.is_empty() && self.broken.is_none() {
            match stream.write(&self.outbox) {
                Ok(0) => self.broken = Some("relay stopped accepting data".to_string()),
                Ok(n) => {
                    self.outbox.drain(..n);
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => self.broken = Some(e.to_string()),
            }
        }
    }

    fn require_connected(&self) -> Result<()> {
        if self.state == RelayState::Connected {
            Ok(())
        } else {
            Err(MultimeterError::Transport("not connected".to_string()))
        }
    }

    /// Tear down the socket. `Disconnected` is only reported for a link
    /// that had completed its handshake.
    fn drop_connection(&mut self, reason: &str, events: &mut Vec<TransportEvent>, now: Instant) {
        let was_connected = self.state == RelayState::Connected;
        if self.stream.is_some() {
            log::warn!("relay {} dropped: {reason}", self.config.server);
        }
        self.reset_link();
        if was_connected {
            events.push(TransportEvent::Disconnected);
        }
        self.schedule_retry(now);
    }

    /// Read until the socket would block. `Err` carries the reason the
    /// link is gone.
    fn read_available(&mut self) -> std::result::Result<(), String> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return Err("closed by relay".to_string()),
                Ok(n) => self.lines.push(&chunk[..n]).map_err(|e| e.to_string())?,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => return Err(e.to_string()),
            }
        }
    }

    fn process_lines(
        &mut self,
        events: &mut Vec<TransportEvent>,
    ) -> std::result::Result<(), String> {
        while let Some(line) = self.lines.next_line() {
            let frame = match Inbound::decode(&line) {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("discarding relay frame: {e}");
                    continue;
                },
            };
            match frame {
                Inbound::Auth { ok: true, .. } => self.on_authenticated(events),
                Inbound::Auth { ok: false, reason } => {
                    let reason = reason.unwrap_or_else(|| "no reason given".to_string());
                    log::error!("relay rejected authentication: {reason}");
                    return Err(format!("authentication rejected: {reason}"));
                },
                Inbound::Me { cpu } => events.push(TransportEvent::Profile(Profile { cpu })),
                Inbound::Event { channel, data } => {
                    if self.state == RelayState::Connected {
                        events.push(TransportEvent::Message { channel, data });
                    } else {
                        log::debug!("dropping {channel} event before handshake");
                    }
                },
            }
        }
        Ok(())
    }

    fn on_authenticated(&mut self, events: &mut Vec<TransportEvent>) {
        self.state = RelayState::Connected;
        self.backoff.reset();
        for channel in self.channels.clone() {
            if let Err(e) = self.send(&Outbound::Subscribe { channel: &channel }) {
                log::warn!("subscribe {channel}: {e}");
            }
        }
        log::info!(
            "connected to relay {} ({} channels)",
            self.config.server,
            self.channels.len()
        );
        events.push(TransportEvent::Connected);
    }
}

impl Transport for RelayClient {
    fn endpoint(&self) -> String {
        self.config.server.clone()
    }

    fn subscribe(&mut self, channel: &str) -> Result<()> {
        if self.channels.iter().any(|c| c == channel) {
            return Ok(());
        }
        self.channels.push(channel.to_string());
        if self.state == RelayState::Connected {
            self.send(&Outbound::Subscribe { channel })?;
        }
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        self.active = true;
        self.retry_at = None;
        if self.stream.is_none() {
            self.try_connect(Instant::now());
        }
        Ok(())
    }

    fn request_profile(&mut self) -> Result<()> {
        self.require_connected()?;
        self.send(&Outbound::Me)
    }

    fn submit_command(&mut self, command: &str, shard: Option<&str>) -> Result<()> {
        self.require_connected()?;
        self.send(&Outbound::Console {
            expression: command,
            shard,
        })
    }

    fn close_socket(&mut self) {
        let was_connected = self.state == RelayState::Connected;
        if self.stream.is_some() {
            log::info!("closing relay socket");
        }
        self.reset_link();
        if was_connected {
            self.pending.push(TransportEvent::Disconnected);
        }
        self.backoff.reset();
        if self.active {
            self.retry_at = Some(Instant::now());
        }
    }

    fn is_connected(&self) -> bool {
        self.state == RelayState::Connected && self.broken.is_none()
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let now = Instant::now();
        let mut events = std::mem::take(&mut self.pending);

        if self.stream.is_none() {
            let due = self.active && self.retry_at.is_some_and(|at| now >= at);
            if !due {
                return events;
            }
            self.retry_at = None;
            self.try_connect(now);
            if self.stream.is_none() {
                return events;
            }
        }

        let read = self.read_available();
        let outcome = self.process_lines(&mut events).and(read);
        self.flush_outbox();
        let outcome = match self.broken.take() {
            Some(reason) => Err(reason),
            None => outcome,
        };
        if let Err(reason) = outcome {
            self.drop_connection(&reason, &mut events, now);
        }
        events
    }
}
