//! `watch` plugin: expressions re-evaluated remotely every tick.
//!
//! Each `cpu` message marks a tick. Watched expressions are submitted
//! without echo; their values come back as ordinary console results.

use multimeter_types::error::{MultimeterError, Result};

use crate::registry::Command;
use crate::session::Session;

#[derive(Debug, Default)]
pub struct WatchList {
    expressions: Vec<String>,
}

impl WatchList {
    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }

    /// Add `expr`. Returns `false` if it is already watched.
    pub fn add(&mut self, expr: &str) -> bool {
        if self.expressions.iter().any(|e| e == expr) {
            return false;
        }
        self.expressions.push(expr.to_string());
        true
    }

    pub fn remove(&mut self, expr: &str) -> bool {
        let before = self.expressions.len();
        self.expressions.retain(|e| e != expr);
        self.expressions.len() != before
    }

    pub fn clear(&mut self) {
        self.expressions.clear();
    }
}

pub fn register(session: &mut Session) -> Result<()> {
    session.add_command("watch", WatchCmd);
    session.add_command("unwatch", UnwatchCmd);
    session.on_channel("cpu", |session, _| {
        let pending = session.extension_mut::<WatchList>().expressions.clone();
        for expr in &pending {
            session.submit_command(expr);
        }
    });
    Ok(())
}

struct WatchCmd;
impl Command for WatchCmd {
    fn description(&self) -> &str {
        "Evaluate an expression every tick."
    }
    fn help_text(&self) -> Option<&str> {
        Some(
            "Usage: /watch EXPRESSION\tEvaluate EXPRESSION after every tick.\n\
             Usage: /watch           \tList watched expressions.",
        )
    }
    fn execute(&self, args: &[&str], session: &mut Session) -> Result<()> {
        let expr = args.join(" ");
        let expr = expr.trim();
        if expr.is_empty() {
            let list = session.extension_mut::<WatchList>();
            if list.expressions.is_empty() {
                session.log("Not watching anything.");
                return Ok(());
            }
            let mut out = String::from("Watching:");
            for e in &list.expressions {
                out.push_str(&format!("\n{e}"));
            }
            session.log(&out);
            return Ok(());
        }
        if session.extension_mut::<WatchList>().add(expr) {
            session.log(&format!("Watching {expr}"));
        } else {
            session.log(&format!("Already watching {expr}"));
        }
        Ok(())
    }
}

struct UnwatchCmd;
impl Command for UnwatchCmd {
    fn description(&self) -> &str {
        "Stop watching an expression."
    }
    fn help_text(&self) -> Option<&str> {
        Some(
            "Usage: /unwatch EXPRESSION\tStop evaluating EXPRESSION.\n\
             Usage: /unwatch all       \tStop watching everything.",
        )
    }
    fn execute(&self, args: &[&str], session: &mut Session) -> Result<()> {
        let expr = args.join(" ");
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(MultimeterError::Command(
                "usage: /unwatch EXPRESSION|all".to_string(),
            ));
        }
        let list = session.extension_mut::<WatchList>();
        if expr == "all" {
            list.clear();
            session.log("Cleared all watches.");
            return Ok(());
        }
        if !list.remove(expr) {
            return Err(MultimeterError::Command(format!("not watching {expr}")));
        }
        session.log(&format!("Stopped watching {expr}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use multimeter_types::backend::{LineKind, TransportEvent};
    use serde_json::json;

    use super::*;
    use crate::testing::connected_session;

    fn tick(session: &mut Session) {
        session.handle_transport_event(TransportEvent::Message {
            channel: "cpu".into(),
            data: json!({"cpu": 3, "memory": 1024}),
        });
    }

    #[test]
    fn watched_expressions_submit_each_tick() {
        let (mut session, _, remote) = connected_session();
        register(&mut session).unwrap();
        session.handle_console_line("/watch Game.time");
        session.handle_console_line("/watch Memory.stats.gcl");
        tick(&mut session);
        tick(&mut session);
        let submitted: Vec<String> = remote
            .borrow()
            .submitted
            .iter()
            .map(|(c, _)| c.clone())
            .collect();
        assert_eq!(
            submitted,
            vec!["Game.time", "Memory.stats.gcl", "Game.time", "Memory.stats.gcl"]
        );
    }

    #[test]
    fn ticks_are_not_echoed() {
        let (mut session, screen, _) = connected_session();
        register(&mut session).unwrap();
        session.handle_console_line("/watch Game.time");
        screen.borrow_mut().clear();
        tick(&mut session);
        assert!(screen.borrow().of_kind(LineKind::Console).is_empty());
        assert_eq!(screen.borrow().gauges.as_ref().unwrap().cpu_label, "CPU:   3/  1");
    }

    #[test]
    fn duplicate_and_listing() {
        let (mut session, screen, _) = connected_session();
        register(&mut session).unwrap();
        session.handle_console_line("/watch");
        session.handle_console_line("/watch Game.time");
        session.handle_console_line("/watch Game.time");
        session.handle_console_line("/watch");
        assert_eq!(
            screen.borrow().texts(),
            vec![
                "Not watching anything.",
                "Watching Game.time",
                "Already watching Game.time",
                "Watching:",
                "Game.time",
            ]
        );
    }

    #[test]
    fn multi_word_expression_is_joined() {
        let (mut session, _, _) = connected_session();
        register(&mut session).unwrap();
        session.handle_console_line("/watch Object.keys(Game.creeps) .length");
        assert_eq!(
            session.extension::<WatchList>().unwrap().expressions(),
            ["Object.keys(Game.creeps) .length"]
        );
    }

    #[test]
    fn unwatch_one_and_all() {
        let (mut session, _, remote) = connected_session();
        register(&mut session).unwrap();
        session.handle_console_line("/watch a");
        session.handle_console_line("/watch b");
        session.handle_console_line("/unwatch a");
        tick(&mut session);
        session.handle_console_line("/unwatch all");
        tick(&mut session);
        assert_eq!(remote.borrow().submitted, vec![("b".to_string(), None)]);
    }

    #[test]
    fn unwatch_errors() {
        let (mut session, screen, _) = connected_session();
        register(&mut session).unwrap();
        session.handle_console_line("/unwatch");
        session.handle_console_line("/unwatch nope");
        assert_eq!(
            screen.borrow().of_kind(LineKind::Error),
            vec![
                "command error: usage: /unwatch EXPRESSION|all",
                "command error: not watching nope"
            ]
        );
    }

    #[test]
    fn nothing_submitted_while_disconnected() {
        let (mut session, _, remote) = connected_session();
        register(&mut session).unwrap();
        session.handle_console_line("/watch Game.time");
        remote.borrow_mut().connected = false;
        tick(&mut session);
        assert!(remote.borrow().submitted.is_empty());
    }
}
