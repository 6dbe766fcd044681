//! Slash-command trait and registry.

use std::collections::HashMap;
use std::rc::Rc;

use multimeter_types::error::Result;

use crate::session::Session;

/// A single slash-command.
///
/// The session is handed to `execute` explicitly; commands never hold a
/// reference to it.
pub trait Command {
    /// One-line description for `/help`.
    fn description(&self) -> &str;

    /// Full documentation for `/help NAME`.
    fn help_text(&self) -> Option<&str> {
        None
    }

    /// Run the command with the words that followed its name.
    fn execute(&self, args: &[&str], session: &mut Session) -> Result<()>;
}

type Handler = dyn Fn(&[&str], &mut Session) -> Result<()>;

/// A command built from a closure, for plugins that don't need a type.
pub struct FnCommand {
    description: String,
    help_text: Option<String>,
    handler: Box<Handler>,
}

impl FnCommand {
    pub fn new<F>(description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[&str], &mut Session) -> Result<()> + 'static,
    {
        Self {
            description: description.into(),
            help_text: None,
            handler: Box::new(handler),
        }
    }

    /// Attach full help text.
    pub fn with_help(mut self, help_text: impl Into<String>) -> Self {
        self.help_text = Some(help_text.into());
        self
    }
}

impl Command for FnCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn help_text(&self) -> Option<&str> {
        self.help_text.as_deref()
    }

    fn execute(&self, args: &[&str], session: &mut Session) -> Result<()> {
        (self.handler)(args, session)
    }
}

/// Registry of slash-commands keyed by lowercase name.
///
/// Commands are stored behind `Rc` so a handler can be cloned out and run
/// while it mutates the session that owns this registry.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Rc<dyn Command>>,
}

impl CommandRegistry {
    /// Create an empty command registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. Replaces any existing command with the same
    /// lowercase name.
    pub fn register(&mut self, name: &str, command: Box<dyn Command>) {
        self.commands.insert(name.to_lowercase(), Rc::from(command));
    }

    /// Remove a command. Returns whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.commands.remove(&name.to_lowercase()).is_some()
    }

    /// Case-insensitive lookup returning a handle that outlives the borrow.
    pub fn lookup(&self, name: &str) -> Option<Rc<dyn Command>> {
        self.commands.get(&name.to_lowercase()).map(Rc::clone)
    }

    /// Case-insensitive lookup by reference.
    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(&name.to_lowercase()).map(|c| &**c)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_lowercase())
    }

    /// All commands with their registered names, in no particular order.
    pub fn list(&self) -> Vec<(&str, &dyn Command)> {
        self.commands
            .iter()
            .map(|(name, cmd)| (name.as_str(), &**cmd))
            .collect()
    }

    /// All commands sorted by name.
    pub fn sorted(&self) -> Vec<(&str, &dyn Command)> {
        let mut cmds = self.list();
        cmds.sort_by_key(|(name, _)| *name);
        cmds
    }

    /// Sorted names starting with `partial` (case-insensitive).
    pub fn completions(&self, partial: &str) -> Vec<String> {
        let lower = partial.to_lowercase();
        let mut names: Vec<String> = self
            .commands
            .keys()
            .filter(|name| name.starts_with(&lower))
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
