//! Script plugins: TOML files declaring commands that expand into lines.
//!
//! ```toml
//! [[command]]
//! name = "spawn"
//! description = "Spawn a creep"
//! help = "Usage: /spawn BODY"
//! run = "Game.spawns.Spawn1.spawnCreep({args})"
//! ```

use std::path::Path;

use serde::Deserialize;

use multimeter_types::error::{MultimeterError, Result};

use crate::registry::Command;
use crate::session::Session;

/// Placeholder replaced with the space-joined arguments.
const ARGS_PLACEHOLDER: &str = "{args}";

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptPlugin {
    #[serde(default, rename = "command")]
    pub commands: Vec<ScriptCommand>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptCommand {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub help: Option<String>,
    /// Line dispatched as if typed.
    pub run: String,
}

impl ScriptPlugin {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| MultimeterError::Plugin(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MultimeterError::Plugin(format!("{}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| MultimeterError::Plugin(format!("{}: {e}", path.display())))
    }

    /// Register every declared command.
    pub fn register(self, session: &mut Session) -> Result<()> {
        for cmd in self.commands {
            let name = cmd.name.trim().trim_start_matches('/').to_string();
            if name.is_empty() || name.contains(' ') {
                return Err(MultimeterError::Plugin(format!(
                    "invalid command name {:?}",
                    cmd.name
                )));
            }
            session.add_command(
                &name,
                ScriptCmd {
                    description: cmd.description,
                    help: cmd.help,
                    run: cmd.run,
                },
            );
        }
        Ok(())
    }
}

struct ScriptCmd {
    description: String,
    help: Option<String>,
    run: String,
}

impl ScriptCmd {
    fn expand(&self, args: &[&str]) -> String {
        self.run.replace(ARGS_PLACEHOLDER, &args.join(" "))
    }
}

impl Command for ScriptCmd {
    fn description(&self) -> &str {
        &self.description
    }
    fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }
    fn execute(&self, args: &[&str], session: &mut Session) -> Result<()> {
        session.dispatch_nested(&self.expand(args))
    }
}
