//! Plugin host: built-in plugins, the named-plugin catalog, and TOML
//! script plugins loaded from disk.
//!
//! A plugin is a registration function run once, synchronously, before
//! the connection starts. Built-ins always run first, then the operator's
//! list in configuration order. Any failure aborts startup: a half-loaded
//! plugin may have left commands partially registered.

mod script;

use std::path::Path;

use multimeter_types::error::{MultimeterError, Result};

use crate::builtins::{alias, watch};
use crate::session::Session;

pub use script::{ScriptCommand, ScriptPlugin};

/// A plugin's registration function.
pub type PluginInit = fn(&mut Session) -> Result<()>;

/// Loaded before anything the operator configures, in this order.
pub const BUILTIN_PLUGINS: &[(&str, PluginInit)] =
    &[("alias", alias::register), ("watch", watch::register)];

/// Named plugins an embedding binary makes available to the configuration.
#[derive(Default)]
pub struct PluginCatalog {
    named: Vec<(String, PluginInit)>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `init` loadable as `name`. A later registration shadows an
    /// earlier one.
    pub fn register(&mut self, name: &str, init: PluginInit) {
        self.named.retain(|(n, _)| n != name);
        self.named.push((name.to_string(), init));
    }

    /// Resolve a name against this catalog, then the built-ins.
    pub fn get(&self, name: &str) -> Option<PluginInit> {
        self.named
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, init)| *init)
            .or_else(|| {
                BUILTIN_PLUGINS
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, init)| *init)
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.named.iter().map(|(n, _)| n.as_str()).collect()
    }
}

/// Whether a configured plugin entry names a file rather than a catalog
/// entry.
pub fn is_plugin_path(entry: &str) -> bool {
    entry.contains('/')
        || entry.contains('\\')
        || Path::new(entry)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Run the built-ins, then every configured plugin. Returns how many
/// plugins were loaded.
pub fn load_plugins(session: &mut Session, catalog: &PluginCatalog) -> Result<usize> {
    for (name, init) in BUILTIN_PLUGINS {
        log::debug!("loading built-in plugin {name}");
        init(session).map_err(|e| plugin_error(name, &e))?;
    }

    let configured = session.config().plugins.clone();
    for entry in &configured {
        load_configured(session, catalog, entry)?;
    }

    let total = BUILTIN_PLUGINS.len() + configured.len();
    log::info!("loaded {total} plugins ({} configured)", configured.len());
    Ok(total)
}

fn load_configured(session: &mut Session, catalog: &PluginCatalog, entry: &str) -> Result<()> {
    if is_plugin_path(entry) {
        let path = session.config().resolve_relative(entry);
        log::info!("loading script plugin {}", path.display());
        let plugin = ScriptPlugin::load(&path)?;
        plugin.register(session).map_err(|e| plugin_error(entry, &e))
    } else {
        let init = catalog
            .get(entry)
            .ok_or_else(|| MultimeterError::Plugin(format!("{entry}: unknown plugin")))?;
        log::info!("loading plugin {entry}");
        init(session).map_err(|e| plugin_error(entry, &e))
    }
}

fn plugin_error(name: &str, err: &MultimeterError) -> MultimeterError {
    match err {
        MultimeterError::Plugin(msg) => MultimeterError::Plugin(msg.clone()),
        other => MultimeterError::Plugin(format!("{name}: {other}")),
    }
}
