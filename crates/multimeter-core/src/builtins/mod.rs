//! Plugins bundled with the console and loaded before any configured ones.

pub mod alias;
pub mod watch;
