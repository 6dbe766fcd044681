//! Line interpretation: slash-command or pass-through text.

use multimeter_types::backend::LineKind;

use crate::session::Session;

/// How a submitted line is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine<'a> {
    /// Nothing typed.
    Empty,
    /// `/name arg arg ...`, split on single spaces.
    Command { name: &'a str, args: Vec<&'a str> },
    /// Anything else, forwarded verbatim.
    Text(&'a str),
}

/// Classify a line without touching any state.
///
/// Splitting is on every single space, so `/a  b` yields an empty argument
/// between `a` and `b`, and a lone `/` yields an empty command name.
pub fn classify(line: &str) -> ConsoleLine<'_> {
    if let Some(rest) = line.strip_prefix('/') {
        let mut words = rest.split(' ');
        let name = words.next().unwrap_or_default();
        ConsoleLine::Command {
            name,
            args: words.collect(),
        }
    } else if line.is_empty() {
        ConsoleLine::Empty
    } else {
        ConsoleLine::Text(line)
    }
}

impl Session {
    /// Interpret a line as if the operator had typed it.
    pub fn handle_console_line(&mut self, line: &str) {
        match classify(line) {
            ConsoleLine::Empty => {},
            ConsoleLine::Command { name, args } => self.run_command(name, &args),
            ConsoleLine::Text(text) => {
                self.add_lines(LineKind::Console, text);
                self.submit_command(text);
            },
        }
        self.render();
    }

    fn run_command(&mut self, name: &str, args: &[&str]) {
        let Some(command) = self.commands().lookup(name) else {
            self.log(&format!("Invalid command: {name}"));
            return;
        };
        log::debug!("running /{} with {} args", name.to_lowercase(), args.len());
        if let Err(e) = command.execute(args, self) {
            self.add_lines(LineKind::Error, &e.to_string());
        }
    }

    /// Completion hints for the input widget: `/`-prefixed names matching
    /// the typed prefix, plus the line unchanged.
    pub fn handle_complete(&self, line: &str) -> (Vec<String>, String) {
        let options = match line.strip_prefix('/') {
            Some(prefix) => self
                .commands()
                .completions(prefix)
                .into_iter()
                .map(|name| format!("/{name}"))
                .collect(),
            None => Vec::new(),
        };
        (options, line.to_string())
    }
}
