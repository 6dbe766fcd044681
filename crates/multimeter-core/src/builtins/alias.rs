//! `alias` plugin: operator-defined shorthand commands.
//!
//! `/alias NAME EXPANSION...` registers `/NAME`. Running it dispatches
//! `EXPANSION` followed by any arguments, exactly as if typed.

use std::collections::BTreeMap;

use multimeter_types::error::{MultimeterError, Result};

use crate::registry::Command;
use crate::session::Session;

/// Aliases defined this session, by lowercase name.
#[derive(Debug, Default)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn register(session: &mut Session) -> Result<()> {
    session.add_command("alias", AliasCmd);
    session.add_command("unalias", UnaliasCmd);
    Ok(())
}

fn alias_name(raw: &str) -> String {
    raw.strip_prefix('/').unwrap_or(raw).to_lowercase()
}

struct AliasCmd;
impl Command for AliasCmd {
    fn description(&self) -> &str {
        "Define a shorthand command."
    }
    fn help_text(&self) -> Option<&str> {
        Some(
            "Usage: /alias NAME COMMAND...\tRun COMMAND when /NAME is typed.\n\
             Usage: /alias NAME           \tShow what /NAME expands to.\n\
             Usage: /alias                \tList all aliases.",
        )
    }
    fn execute(&self, args: &[&str], session: &mut Session) -> Result<()> {
        let Some((raw, rest)) = args.split_first().filter(|(raw, _)| !raw.is_empty()) else {
            let table = session.extension_mut::<AliasTable>();
            if table.is_empty() {
                session.log("No aliases defined.");
                return Ok(());
            }
            let mut out = String::from("Aliases:");
            for (name, expansion) in table.iter() {
                out.push_str(&format!("\n/{name} -> {expansion}"));
            }
            session.log(&out);
            return Ok(());
        };

        let name = alias_name(raw);
        if rest.is_empty() {
            let shown = session
                .extension_mut::<AliasTable>()
                .get(&name)
                .map(|expansion| format!("/{name} -> {expansion}"))
                .ok_or_else(|| MultimeterError::Command(format!("/{name} is not an alias")))?;
            session.log(&shown);
            return Ok(());
        }

        if name == "alias" || name == "unalias" {
            return Err(MultimeterError::Command(format!("cannot redefine /{name}")));
        }
        let expansion = rest.join(" ");
        session
            .extension_mut::<AliasTable>()
            .entries
            .insert(name.clone(), expansion.clone());
        session.add_command(
            &name,
            AliasExpansion {
                description: format!("Alias for {expansion}"),
                expansion: expansion.clone(),
            },
        );
        session.log(&format!("/{name} is now an alias for {expansion}"));
        Ok(())
    }
}

struct UnaliasCmd;
impl Command for UnaliasCmd {
    fn description(&self) -> &str {
        "Remove an alias."
    }
    fn execute(&self, args: &[&str], session: &mut Session) -> Result<()> {
        let Some(raw) = args.first().filter(|raw| !raw.is_empty()) else {
            return Err(MultimeterError::Command("usage: /unalias NAME".to_string()));
        };
        let name = alias_name(raw);
        if session
            .extension_mut::<AliasTable>()
            .entries
            .remove(&name)
            .is_none()
        {
            return Err(MultimeterError::Command(format!("/{name} is not an alias")));
        }
        session.remove_command(&name);
        session.log(&format!("Removed alias /{name}"));
        Ok(())
    }
}

struct AliasExpansion {
    description: String,
    expansion: String,
}

impl Command for AliasExpansion {
    fn description(&self) -> &str {
        &self.description
    }
    fn execute(&self, args: &[&str], session: &mut Session) -> Result<()> {
        let line = if args.is_empty() {
            self.expansion.clone()
        } else {
            format!("{} {}", self.expansion, args.join(" "))
        };
        session.dispatch_nested(&line)
    }
}
