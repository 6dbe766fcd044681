//! Collaborator traits consumed by the console core.
//!
//! The core never touches a socket or a tty directly. It talks to a
//! [`Terminal`] for display and line input, and to a [`Transport`] for the
//! remote service. Both are polled from the session loop, so neither needs
//! to be thread-safe.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// Tag attached to every line appended to the console display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// `console.log` output from the game.
    Log,
    /// Result of an evaluated console command.
    Result,
    /// Error raised by the game while evaluating.
    Error,
    /// Echo of a pass-through line the operator typed.
    Console,
    /// Local status messages.
    System,
}

impl LineKind {
    /// Short tag name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Result => "result",
            Self::Error => "error",
            Self::Console => "console",
            Self::System => "system",
        }
    }
}

/// Rendered state of the two gauges.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeReadout {
    /// Label text (e.g. `CPU:   5/ 20` or `CPU: ERROR`).
    pub cpu_label: String,
    /// CPU bar fill in percent, `0.0..=100.0`.
    pub cpu_fill: f64,
    /// Label text (e.g. `Mem:  512K/2048K`).
    pub mem_label: String,
    /// Memory bar fill in percent, `0.0..=100.0`.
    pub mem_fill: f64,
}

/// Input produced by the terminal layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// The operator completed a line of input.
    Line(String),
    /// Ctrl-C or end of input.
    Interrupt,
    /// Ctrl-L: repaint everything, no state change.
    Redraw,
    /// Tab pressed on a partial line: show completions for it.
    Complete(String),
}

/// Display and line-input collaborator.
pub trait Terminal {
    /// Append a tagged line to the console display.
    fn add_line(&mut self, kind: LineKind, text: &str);

    /// Replace the gauge readout.
    fn set_gauges(&mut self, readout: &GaugeReadout);

    /// Flush pending output to the screen.
    fn render(&mut self) -> Result<()>;

    /// Force a full repaint.
    fn redraw(&mut self) -> Result<()>;

    /// Drain input events received since the last poll.
    fn poll_events(&mut self) -> Vec<TerminalEvent>;
}

/// Account details returned by the identity fetch.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Profile {
    /// CPU limit in CPU units per tick.
    pub cpu: f64,
}

/// Asynchronous completion or message delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The session handshake finished.
    Connected,
    /// The identity fetch resolved.
    Profile(Profile),
    /// A message on a subscribed channel.
    Message { channel: String, data: Value },
    /// The connection dropped. The transport reconnects on its own.
    Disconnected,
}

/// Remote service collaborator.
pub trait Transport {
    /// Human-readable address, shown while connecting.
    fn endpoint(&self) -> String;

    /// Subscribe to a channel. Subscriptions survive reconnects.
    fn subscribe(&mut self, channel: &str) -> Result<()>;

    /// Begin connecting. Completion is reported as [`TransportEvent::Connected`].
    fn connect(&mut self) -> Result<()>;

    /// Request the account profile. Completion is reported as
    /// [`TransportEvent::Profile`].
    fn request_profile(&mut self) -> Result<()>;

    /// Submit a console expression for evaluation on `shard`.
    fn submit_command(&mut self, command: &str, shard: Option<&str>) -> Result<()>;

    /// Forcibly close the underlying socket.
    fn close_socket(&mut self);

    /// Whether the handshake has completed and the link is up.
    fn is_connected(&self) -> bool;

    /// Drain events received since the last poll, in delivery order.
    fn poll(&mut self) -> Vec<TransportEvent>;
}
