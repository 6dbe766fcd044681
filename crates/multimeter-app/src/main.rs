//! screeps-multimeter terminal entry point.
//!
//! Loads the configuration, wires the stdio terminal and the relay
//! transport into a console session, and runs it until `/quit` or end of
//! input.

mod stdio;

use std::path::PathBuf;

use anyhow::{Context, Result};

use multimeter_core::config::{DEFAULT_CONFIG_FILE, MultimeterConfig};
use multimeter_core::{PluginCatalog, Session};
use multimeter_net::{RelayClient, RelayConfig};

use stdio::StdioTerminal;

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "MULTIMETER_CONFIG";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Resolve config from CLI arg, MULTIMETER_CONFIG env var, or the default file.
    let path = config_path(std::env::args().nth(1), std::env::var(CONFIG_ENV).ok());
    let config = MultimeterConfig::load_or_default(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    log::info!(
        "Starting screeps-multimeter (server {}, {} plugins configured)",
        config.server,
        config.plugins.len()
    );

    let history = config.base_dir().join(&config.history_file);
    let terminal = StdioTerminal::new(Some(history));
    let transport = RelayClient::new(RelayConfig::from_config(&config));

    let mut session = Session::new(config, Box::new(terminal), Box::new(transport));
    session
        .run(&PluginCatalog::new())
        .context("console session failed")?;

    log::info!("screeps-multimeter exiting");
    Ok(())
}

fn config_path(arg: Option<String>, env: Option<String>) -> PathBuf {
    arg.or(env)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}
