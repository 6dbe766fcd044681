//! The console session: sole owner of every other piece of state.
//!
//! A [`Session`] is also the capability object handed to plugins. Its
//! public methods are everything a plugin may do: register and remove
//! commands, subscribe to channels and session events, write to the
//! console, submit remote commands, and keep typed state.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use multimeter_types::backend::{LineKind, Terminal, TerminalEvent, Transport};
use multimeter_types::config::MultimeterConfig;
use multimeter_types::error::{MultimeterError, Result};

use crate::gauges::GaugeModel;
use crate::help;
use crate::plugin::{self, PluginCatalog};
use crate::registry::{Command, CommandRegistry};
use crate::router::{EventRouter, SessionEvent};

/// Shown once after the first successful connection.
pub const MOTD: &str = "Now showing Screeps console. Type /help for help.";

/// Maximum depth of lines dispatched from inside a command (aliases, scripts).
pub const MAX_NESTING: usize = 8;

/// Sleep between loop iterations when nothing is pending.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Connection lifecycle as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `connect` has not been called yet.
    Idle,
    /// Waiting for the transport handshake.
    Connecting,
    /// Handshake completed.
    Connected,
    /// The link dropped; the transport is reconnecting.
    Disconnected,
}

pub struct Session {
    config: MultimeterConfig,
    registry: CommandRegistry,
    pub(crate) gauges: GaugeModel,
    pub(crate) router: EventRouter,
    terminal: Box<dyn Terminal>,
    pub(crate) transport: Box<dyn Transport>,
    extensions: HashMap<TypeId, Box<dyn Any>>,
    pub(crate) phase: Phase,
    pub(crate) greeted: bool,
    exit_requested: bool,
    nesting: usize,
}

impl Session {
    /// Build a session with the built-in `/help`, `/reconnect` and `/quit`.
    pub fn new(
        config: MultimeterConfig,
        terminal: Box<dyn Terminal>,
        transport: Box<dyn Transport>,
    ) -> Self {
        let mut session = Self {
            config,
            registry: CommandRegistry::new(),
            gauges: GaugeModel::new(),
            router: EventRouter::new(),
            terminal,
            transport,
            extensions: HashMap::new(),
            phase: Phase::Idle,
            greeted: false,
            exit_requested: false,
            nesting: 0,
        };
        help::register_builtins(&mut session);
        session
    }

    pub fn config(&self) -> &MultimeterConfig {
        &self.config
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn gauges(&self) -> &GaugeModel {
        &self.gauges
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    // -- Commands --

    /// Register a slash-command. Last writer wins on a case-insensitive
    /// name collision.
    pub fn add_command(&mut self, name: &str, command: impl Command + 'static) {
        log::debug!("registering /{}", name.to_lowercase());
        self.registry.register(name, Box::new(command));
    }

    pub fn remove_command(&mut self, name: &str) {
        self.registry.unregister(name);
    }

    // -- Output --

    /// Append a system line (one per line of `message`).
    pub fn log(&mut self, message: &str) {
        self.add_lines(LineKind::System, message);
    }

    /// Append `text` to the console, one display line per line of text.
    pub fn add_lines(&mut self, kind: LineKind, text: &str) {
        for line in text.split('\n') {
            self.terminal.add_line(kind, line);
        }
    }

    pub(crate) fn render(&mut self) {
        if let Err(e) = self.terminal.render() {
            log::warn!("render failed: {e}");
        }
    }

    pub(crate) fn show_gauges(&mut self) {
        let readout = self.gauges.readout();
        self.terminal.set_gauges(&readout);
    }

    // -- Remote --

    /// Forward a console expression to the remote service with the
    /// configured shard. Best effort: returns `false` without reporting
    /// anything when disconnected or when the send fails.
    pub fn submit_command(&mut self, command: &str) -> bool {
        if !self.transport.is_connected() {
            log::debug!("not connected, dropping {command:?}");
            return false;
        }
        let shard = self.config.shard.as_deref();
        match self.transport.submit_command(command, shard) {
            Ok(()) => {
                log::debug!("forwarded {command:?} (shard {shard:?})");
                true
            },
            Err(e) => {
                log::debug!("forwarding {command:?} failed: {e}");
                false
            },
        }
    }

    /// Interpret `line` as if typed, from inside a running command.
    ///
    /// Fails once [`MAX_NESTING`] dispatches are stacked, which stops
    /// self-referencing aliases and scripts.
    pub fn dispatch_nested(&mut self, line: &str) -> Result<()> {
        if self.nesting >= MAX_NESTING {
            return Err(MultimeterError::Command(format!(
                "expansion nested too deeply: {line}"
            )));
        }
        self.nesting += 1;
        self.handle_console_line(line);
        self.nesting -= 1;
        Ok(())
    }

    // -- Subscriptions --

    /// Call `listener` with the payload of every message on `channel`.
    ///
    /// Built-in routing for the channel runs first. Channels the session
    /// doesn't already follow are subscribed on the transport.
    pub fn on_channel<F>(&mut self, channel: &str, listener: F)
    where
        F: Fn(&mut Session, &Value) + 'static,
    {
        let is_new = self.router.add_channel_listener(channel, listener);
        if is_new && self.phase != Phase::Idle {
            if let Err(e) = self.transport.subscribe(channel) {
                log::warn!("subscribe {channel} failed: {e}");
            }
        }
    }

    /// Call `listener` whenever `event` fires.
    pub fn on_event<F>(&mut self, event: SessionEvent, listener: F)
    where
        F: Fn(&mut Session) + 'static,
    {
        self.router.add_session_listener(event, listener);
    }

    /// Shorthand for `on_event(SessionEvent::Exit, ..)`.
    pub fn on_exit<F>(&mut self, listener: F)
    where
        F: Fn(&mut Session) + 'static,
    {
        self.on_event(SessionEvent::Exit, listener);
    }

    pub(crate) fn emit(&mut self, event: SessionEvent) {
        for listener in self.router.session_listeners(event) {
            listener(self);
        }
    }

    // -- Plugin state --

    /// Typed state slot for plugins, created on first use.
    pub fn extension_mut<T: Default + 'static>(&mut self) -> &mut T {
        self.extensions
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()) as Box<dyn Any>)
            .downcast_mut::<T>()
            .unwrap_or_else(|| unreachable!("extension slot holds a foreign type"))
    }

    pub fn extension<T: 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_ref::<T>())
    }

    // -- Lifecycle --

    /// Ask the session to stop. Exit listeners run once.
    pub fn request_exit(&mut self) {
        if self.exit_requested {
            return;
        }
        log::info!("exit requested");
        self.exit_requested = true;
        self.emit(SessionEvent::Exit);
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Drop the socket so the transport reconnects and resubscribes.
    pub fn reconnect(&mut self) {
        log::info!("forcing reconnect to {}", self.transport.endpoint());
        self.transport.close_socket();
    }

    /// Subscribe every followed channel and start connecting.
    pub fn connect(&mut self) -> Result<()> {
        let endpoint = self.transport.endpoint();
        self.log(&format!("Connecting to ({endpoint}) ..."));
        self.render();
        for channel in self.router.channels().to_vec() {
            self.transport.subscribe(&channel)?;
        }
        self.transport.connect()?;
        self.phase = Phase::Connecting;
        Ok(())
    }

    /// Load plugins, then connect. Any plugin failure aborts startup.
    pub fn start(&mut self, catalog: &PluginCatalog) -> Result<()> {
        plugin::load_plugins(self, catalog)?;
        self.show_gauges();
        self.connect()
    }

    /// Start, then pump terminal and transport events until exit.
    pub fn run(&mut self, catalog: &PluginCatalog) -> Result<()> {
        self.start(catalog)?;
        while !self.exit_requested {
            if !self.poll() {
                std::thread::sleep(POLL_INTERVAL);
            }
        }
        Ok(())
    }

    /// Handle everything pending once. Returns whether anything arrived.
    ///
    /// Input goes first. Once it requests exit, remote events stay queued
    /// in the transport.
    pub fn poll(&mut self) -> bool {
        let input = self.terminal.poll_events();
        let mut busy = !input.is_empty();
        for event in input {
            self.handle_terminal_event(event);
            if self.exit_requested {
                return true;
            }
        }
        let remote = self.transport.poll();
        busy |= !remote.is_empty();
        for event in remote {
            self.handle_transport_event(event);
        }
        busy
    }

    pub fn handle_terminal_event(&mut self, event: TerminalEvent) {
        match event {
            TerminalEvent::Line(line) => self.handle_console_line(&line),
            TerminalEvent::Interrupt => self.request_exit(),
            TerminalEvent::Redraw => {
                if let Err(e) = self.terminal.redraw() {
                    log::warn!("redraw failed: {e}");
                }
            },
            TerminalEvent::Complete(line) => {
                let (options, _) = self.handle_complete(&line);
                if !options.is_empty() {
                    self.log(&options.join("  "));
                    self.render();
                }
            },
        }
    }
}
