//! Built-in `/help`, `/reconnect` and `/quit`.

use multimeter_types::error::Result;

use crate::registry::{Command, CommandRegistry};
use crate::session::Session;

/// Register the commands every session starts with.
pub fn register_builtins(session: &mut Session) {
    session.add_command("help", HelpCmd);
    session.add_command("reconnect", ReconnectCmd);
    session.add_command("quit", QuitCmd);
}

/// `Available commands:` followed by one padded line per command, sorted.
pub fn command_list(registry: &CommandRegistry) -> String {
    let commands = registry.sorted();
    let longest = commands
        .iter()
        .map(|(name, _)| name.chars().count())
        .max()
        .unwrap_or(0);
    let mut out = String::from("Available commands:");
    for (name, cmd) in &commands {
        out.push_str(&format!("\n/{name:<longest$}  {}", cmd.description()));
    }
    out
}

/// Help for a single command. `query` may carry a leading `/`.
pub fn command_help(registry: &CommandRegistry, query: &str) -> String {
    let name = query.strip_prefix('/').unwrap_or(query).to_lowercase();
    match registry.get(&name) {
        Some(cmd) => match cmd.help_text() {
            Some(text) => format!("Help for /{name}:\n{text}"),
            None => format!("/{name}\t{}", cmd.description()),
        },
        None => format!("No help available for /{name}: not a valid command"),
    }
}

// ---------------------------------------------------------------------------
// help
// ---------------------------------------------------------------------------

struct HelpCmd;
impl Command for HelpCmd {
    fn description(&self) -> &str {
        "List the available commands. Try \"/help help\"."
    }
    fn help_text(&self) -> Option<&str> {
        Some(
            "Usage: /help COMMAND\tFind out the usage for COMMAND.\n\
             Usage: /help        \tList all available commands.",
        )
    }
    fn execute(&self, args: &[&str], session: &mut Session) -> Result<()> {
        let text = match args.first() {
            Some(query) => command_help(session.commands(), query),
            None => command_list(session.commands()),
        };
        session.log(&text);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// reconnect
// ---------------------------------------------------------------------------

struct ReconnectCmd;
impl Command for ReconnectCmd {
    fn description(&self) -> &str {
        "Force a reconnection."
    }
    fn execute(&self, _args: &[&str], session: &mut Session) -> Result<()> {
        session.reconnect();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// quit
// ---------------------------------------------------------------------------

struct QuitCmd;
impl Command for QuitCmd {
    fn description(&self) -> &str {
        "Exit the program."
    }
    fn execute(&self, _args: &[&str], session: &mut Session) -> Result<()> {
        session.request_exit();
        Ok(())
    }
}
