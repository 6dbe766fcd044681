//! Routing of transport events to display sinks and plugin listeners.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use multimeter_types::backend::{LineKind, Profile, TransportEvent};

use crate::gauges::{DEFAULT_MEMORY_LIMIT, Reading};
use crate::session::{MOTD, Phase, Session};

/// Channels with built-in routing, subscribed on every connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Console output: log lines, results, errors.
    Console,
    /// Per-tick CPU and memory usage.
    Cpu,
    /// Code upload notifications.
    Code,
}

impl Channel {
    pub const ALL: &[Channel] = &[Channel::Console, Channel::Cpu, Channel::Code];

    pub fn name(self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Cpu => "cpu",
            Self::Code => "code",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

/// Session-level notifications plugins can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    Exit,
}

pub type ChannelListener = Rc<dyn Fn(&mut Session, &Value)>;
pub type SessionListener = Rc<dyn Fn(&mut Session)>;

/// Followed channels and the listeners attached to them.
pub struct EventRouter {
    channels: Vec<String>,
    channel_listeners: HashMap<String, Vec<ChannelListener>>,
    session_listeners: HashMap<SessionEvent, Vec<SessionListener>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            channels: Channel::ALL.iter().map(|c| c.name().to_string()).collect(),
            channel_listeners: HashMap::new(),
            session_listeners: HashMap::new(),
        }
    }

    /// Followed channels in subscription order.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Attach a listener. Returns `true` if the channel was not followed yet.
    pub fn add_channel_listener<F>(&mut self, channel: &str, listener: F) -> bool
    where
        F: Fn(&mut Session, &Value) + 'static,
    {
        self.channel_listeners
            .entry(channel.to_string())
            .or_default()
            .push(Rc::new(listener));
        if self.channels.iter().any(|c| c == channel) {
            false
        } else {
            self.channels.push(channel.to_string());
            true
        }
    }

    /// Listeners for `channel`, cloned so they can run against the session.
    pub fn channel_listeners(&self, channel: &str) -> Vec<ChannelListener> {
        self.channel_listeners
            .get(channel)
            .map(|ls| ls.iter().map(Rc::clone).collect())
            .unwrap_or_default()
    }

    pub fn add_session_listener<F>(&mut self, event: SessionEvent, listener: F)
    where
        F: Fn(&mut Session) + 'static,
    {
        self.session_listeners
            .entry(event)
            .or_default()
            .push(Rc::new(listener));
    }

    pub fn session_listeners(&self, event: SessionEvent) -> Vec<SessionListener> {
        self.session_listeners
            .get(&event)
            .map(|ls| ls.iter().map(Rc::clone).collect())
            .unwrap_or_default()
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Route one transport event, then re-render.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::Profile(profile) => self.on_profile(profile),
            TransportEvent::Message { channel, data } => self.route_message(&channel, &data),
            TransportEvent::Disconnected => {
                self.phase = Phase::Disconnected;
                self.log("Disconnected. Reconnecting...");
                self.emit(SessionEvent::Disconnected);
            },
        }
        self.render();
    }

    fn on_connected(&mut self) {
        self.phase = Phase::Connected;
        log::info!("connected to {}", self.transport.endpoint());
        if !self.greeted {
            self.greeted = true;
            if let Err(e) = self.transport.request_profile() {
                log::warn!("profile request failed: {e}");
            }
            self.log(MOTD);
        }
        self.emit(SessionEvent::Connected);
    }

    fn on_profile(&mut self, profile: Profile) {
        log::debug!("profile: cpu limit {}", profile.cpu);
        self.gauges.set_cpu_limit(profile.cpu);
        self.gauges.set_memory_limit(DEFAULT_MEMORY_LIMIT);
        self.show_gauges();
    }

    fn route_message(&mut self, channel: &str, data: &Value) {
        match Channel::from_name(channel) {
            Some(Channel::Console) => self.route_console(data),
            Some(Channel::Cpu) => self.route_cpu(data),
            Some(Channel::Code) => self.log("Code updated"),
            None => {},
        }
        for listener in self.router.channel_listeners(channel) {
            listener(self, data);
        }
    }

    fn route_console(&mut self, data: &Value) {
        if let Some(messages) = data.get("messages") {
            self.route_console_list(messages.get("log"), LineKind::Log);
            self.route_console_list(messages.get("results"), LineKind::Result);
        }
        match data.get("error") {
            None | Some(Value::Null) => {},
            Some(Value::String(error)) => self.add_lines(LineKind::Error, error),
            Some(other) => self.add_lines(LineKind::Error, &other.to_string()),
        }
    }

    /// Non-string entries are shown as JSON; a non-array field is skipped.
    fn route_console_list(&mut self, field: Option<&Value>, kind: LineKind) {
        match field {
            None | Some(Value::Null) => {},
            Some(Value::Array(entries)) => {
                for entry in entries {
                    match entry {
                        Value::String(line) => self.add_lines(kind, line),
                        other => self.add_lines(kind, &other.to_string()),
                    }
                }
            },
            Some(other) => log::warn!("console {kind:?} field is not a list: {other}"),
        }
    }

    fn route_cpu(&mut self, data: &Value) {
        let cpu = Reading::from_json(data.get("cpu").unwrap_or(&Value::Null));
        let memory = Reading::from_json(data.get("memory").unwrap_or(&Value::Null));
        let readout = self.gauges.update(cpu, memory);
        log::debug!("{} | {}", readout.cpu_label, readout.mem_label);
        self.show_gauges();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;
    use crate::testing::{connected_session, session};

    fn message(channel: &str, data: Value) -> TransportEvent {
        TransportEvent::Message {
            channel: channel.to_string(),
            data,
        }
    }

    #[test]
    fn channel_names_round_trip() {
        for c in Channel::ALL {
            assert_eq!(Channel::from_name(c.name()), Some(*c));
        }
        assert_eq!(Channel::from_name("memory"), None);
    }

    #[test]
    fn console_routes_every_present_field() {
        let (mut session, screen, _) = connected_session();
        session.handle_transport_event(message(
            "console",
            json!({
                "messages": { "log": ["a", "b"], "results": ["42"] },
                "error": "ReferenceError: x is not defined",
            }),
        ));
        assert_eq!(
            screen.borrow().lines,
            vec![
                (LineKind::Log, "a".to_string()),
                (LineKind::Log, "b".to_string()),
                (LineKind::Result, "42".to_string()),
                (LineKind::Error, "ReferenceError: x is not defined".to_string()),
            ]
        );
    }

    #[test]
    fn console_skips_absent_fields() {
        let (mut session, screen, _) = connected_session();
        session.handle_transport_event(message("console", json!({ "error": "boom" })));
        let data = json!({ "messages": { "results": ["1"] } });
        session.handle_transport_event(message("console", data));
        session.handle_transport_event(message("console", json!({})));
        assert_eq!(
            screen.borrow().lines,
            vec![
                (LineKind::Error, "boom".to_string()),
                (LineKind::Result, "1".to_string()),
            ]
        );
    }

    #[test]
    fn non_list_console_field_is_skipped() {
        let (mut session, screen, _) = connected_session();
        let data = json!({ "messages": { "log": 3, "results": ["ok"] } });
        session.handle_transport_event(message("console", data));
        assert_eq!(screen.borrow().texts(), vec!["ok"]);
    }

    #[test]
    fn mixed_console_payload_keeps_every_field() {
        let (mut session, screen, _) = connected_session();
        let data = json!({
            "messages": { "log": ["tick 1", 42, { "x": 1 }], "results": ["ok"] },
            "error": "boom",
        });
        session.handle_transport_event(message("console", data));
        let screen = screen.borrow();
        assert_eq!(screen.of_kind(LineKind::Log), vec!["tick 1", "42", "{\"x\":1}"]);
        assert_eq!(screen.of_kind(LineKind::Result), vec!["ok"]);
        assert_eq!(screen.of_kind(LineKind::Error), vec!["boom"]);
    }

    #[test]
    fn non_string_console_error_is_shown() {
        let (mut session, screen, _) = connected_session();
        let data = json!({ "messages": "none", "error": { "code": 7 } });
        session.handle_transport_event(message("console", data));
        assert_eq!(screen.borrow().texts(), vec!["{\"code\":7}"]);
    }

    #[test]
    fn code_channel_logs_fixed_line() {
        let (mut session, screen, _) = connected_session();
        session.handle_transport_event(message("code", json!({ "branch": "default" })));
        assert_eq!(screen.borrow().of_kind(LineKind::System), vec!["Code updated"]);
    }

    #[test]
    fn cpu_updates_gauges() {
        let (mut session, screen, _) = connected_session();
        session.handle_transport_event(message("cpu", json!({ "cpu": 1, "memory": 1024 })));
        let gauges = screen.borrow().gauges.clone().unwrap();
        assert_eq!(gauges.cpu_label, "CPU:   1/  1");
        assert_eq!(gauges.mem_label, "Mem:    1K/2048K");
        assert!(screen.borrow().lines.is_empty());
    }

    #[test]
    fn profile_limit_applies_to_later_telemetry() {
        let (mut session, screen, _) = connected_session();
        session.handle_transport_event(TransportEvent::Profile(Profile { cpu: 20.0 }));
        session.handle_transport_event(message("cpu", json!({ "cpu": 5, "memory": 0 })));
        let gauges = screen.borrow().gauges.clone().unwrap();
        assert!((gauges.cpu_fill - 25.0).abs() < 1e-9);
        assert_eq!(gauges.cpu_label, "CPU:   5/ 20");
    }

    #[test]
    fn malformed_cpu_then_valid_recovers() {
        let (mut session, screen, _) = connected_session();
        session.handle_transport_event(TransportEvent::Profile(Profile { cpu: 20.0 }));
        session.handle_transport_event(message("cpu", json!({ "cpu": "abc", "memory": 0 })));
        {
            let gauges = screen.borrow().gauges.clone().unwrap();
            assert_eq!(gauges.cpu_label, "CPU: ERROR");
            assert!((gauges.cpu_fill - 100.0).abs() < 1e-9);
        }
        session.handle_transport_event(message("cpu", json!({ "cpu": 10, "memory": 0 })));
        let gauges = screen.borrow().gauges.clone().unwrap();
        assert_eq!(gauges.cpu_label, "CPU:  10/ 20");
        assert!((gauges.cpu_fill - 50.0).abs() < 1e-9);
    }

    #[test]
    fn first_connect_greets_and_fetches_profile_once() {
        let (mut session, screen, remote) = session();
        session.handle_transport_event(TransportEvent::Connected);
        session.handle_transport_event(TransportEvent::Disconnected);
        session.handle_transport_event(TransportEvent::Connected);
        assert_eq!(remote.borrow().profile_requests, 1);
        assert_eq!(
            screen.borrow().of_kind(LineKind::System),
            vec![MOTD, "Disconnected. Reconnecting..."]
        );
        assert_eq!(session.phase(), Phase::Connected);
    }

    #[test]
    fn disconnect_sets_phase_and_notifies() {
        let (mut session, _, _) = connected_session();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        session.on_event(SessionEvent::Disconnected, move |_| sink.borrow_mut().push("down"));
        session.handle_transport_event(TransportEvent::Disconnected);
        assert_eq!(session.phase(), Phase::Disconnected);
        assert_eq!(*seen.borrow(), vec!["down"]);
    }

    #[test]
    fn plugin_listener_runs_after_builtin_routing() {
        let (mut session, screen, _) = connected_session();
        session.on_channel("console", |s, data| {
            let n = data["messages"]["log"].as_array().map_or(0, Vec::len);
            s.log(&format!("saw {n} log lines"));
        });
        session.handle_transport_event(message("console", json!({ "messages": { "log": ["x"] } })));
        assert_eq!(screen.borrow().texts(), vec!["x", "saw 1 log lines"]);
    }

    #[test]
    fn unknown_channel_reaches_only_listeners() {
        let (mut session, screen, _) = connected_session();
        session.on_channel("room:W1N1", |s, _| s.log("room event"));
        session.handle_transport_event(message("room:W1N1", json!({ "objects": {} })));
        session.handle_transport_event(message("other", json!(null)));
        assert_eq!(screen.borrow().texts(), vec!["room event"]);
    }

    #[test]
    fn router_tracks_new_channels_once() {
        let mut router = EventRouter::new();
        assert!(!router.add_channel_listener("cpu", |_, _| {}));
        assert!(router.add_channel_listener("memory", |_, _| {}));
        assert!(!router.add_channel_listener("memory", |_, _| {}));
        assert_eq!(router.channels(), &["console", "cpu", "code", "memory"]);
        assert_eq!(router.channel_listeners("memory").len(), 2);
        assert!(router.channel_listeners("code").is_empty());
    }
}
