//! Recording terminal and scripted transport shared by the unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use multimeter_types::backend::{
    GaugeReadout, LineKind, Terminal, TerminalEvent, Transport, TransportEvent,
};
use multimeter_types::config::MultimeterConfig;
use multimeter_types::error::{MultimeterError, Result};

use crate::session::Session;

#[derive(Default)]
pub struct Screen {
    pub lines: Vec<(LineKind, String)>,
    pub gauges: Option<GaugeReadout>,
    pub renders: usize,
    pub redraws: usize,
    pub input: VecDeque<TerminalEvent>,
}

impl Screen {
    pub fn texts(&self) -> Vec<String> {
        self.lines.iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn of_kind(&self, kind: LineKind) -> Vec<String> {
        self.lines
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

pub struct RecordingTerminal(pub Rc<RefCell<Screen>>);

impl Terminal for RecordingTerminal {
    fn add_line(&mut self, kind: LineKind, text: &str) {
        self.0.borrow_mut().lines.push((kind, text.to_string()));
    }

    fn set_gauges(&mut self, readout: &GaugeReadout) {
        self.0.borrow_mut().gauges = Some(readout.clone());
    }

    fn render(&mut self) -> Result<()> {
        self.0.borrow_mut().renders += 1;
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        self.0.borrow_mut().redraws += 1;
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<TerminalEvent> {
        self.0.borrow_mut().input.drain(..).collect()
    }
}

#[derive(Default)]
pub struct Remote {
    pub connected: bool,
    pub connect_calls: usize,
    pub subscribed: Vec<String>,
    pub submitted: Vec<(String, Option<String>)>,
    pub profile_requests: usize,
    pub closes: usize,
    pub fail_submit: bool,
    pub inbound: VecDeque<TransportEvent>,
}

pub struct ScriptedTransport(pub Rc<RefCell<Remote>>);

impl Transport for ScriptedTransport {
    fn endpoint(&self) -> String {
        "test://relay".to_string()
    }

    fn subscribe(&mut self, channel: &str) -> Result<()> {
        self.0.borrow_mut().subscribed.push(channel.to_string());
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        self.0.borrow_mut().connect_calls += 1;
        Ok(())
    }

    fn request_profile(&mut self) -> Result<()> {
        self.0.borrow_mut().profile_requests += 1;
        Ok(())
    }

    fn submit_command(&mut self, command: &str, shard: Option<&str>) -> Result<()> {
        let mut remote = self.0.borrow_mut();
        if remote.fail_submit {
            return Err(MultimeterError::Transport("send failed".into()));
        }
        remote
            .submitted
            .push((command.to_string(), shard.map(str::to_string)));
        Ok(())
    }

    fn close_socket(&mut self) {
        let mut remote = self.0.borrow_mut();
        remote.closes += 1;
        remote.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.0.borrow().connected
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        self.0.borrow_mut().inbound.drain(..).collect()
    }
}

/// A session wired to recording doubles, with no plugins loaded.
pub fn session_with(
    config: MultimeterConfig,
) -> (Session, Rc<RefCell<Screen>>, Rc<RefCell<Remote>>) {
    let screen = Rc::new(RefCell::new(Screen::default()));
    let remote = Rc::new(RefCell::new(Remote::default()));
    let session = Session::new(
        config,
        Box::new(RecordingTerminal(Rc::clone(&screen))),
        Box::new(ScriptedTransport(Rc::clone(&remote))),
    );
    (session, screen, remote)
}

pub fn session() -> (Session, Rc<RefCell<Screen>>, Rc<RefCell<Remote>>) {
    session_with(MultimeterConfig::default())
}

/// A session that already finished its handshake.
pub fn connected_session() -> (Session, Rc<RefCell<Screen>>, Rc<RefCell<Remote>>) {
    let (mut session, screen, remote) = session();
    remote.borrow_mut().connected = true;
    session.handle_transport_event(TransportEvent::Connected);
    screen.borrow_mut().clear();
    (session, screen, remote)
}
