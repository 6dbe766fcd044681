//! screeps-multimeter console core.
//!
//! Owns the command registry, line dispatch, plugin host, CPU/memory
//! gauges and routing of remote events. Display and networking are
//! reached only through the [`backend::Terminal`] and
//! [`backend::Transport`] traits, so this crate has no I/O of its own.

// Re-exports from multimeter-types.
pub use multimeter_types::backend;
pub use multimeter_types::config;
pub use multimeter_types::error;

pub mod builtins;
pub mod dispatch;
pub mod gauges;
pub mod help;
pub mod plugin;
pub mod registry;
pub mod router;
pub mod session;

#[cfg(test)]
mod testing;

pub use plugin::{PluginCatalog, PluginInit};
pub use registry::{Command, CommandRegistry, FnCommand};
pub use router::{Channel, SessionEvent};
pub use session::{Phase, Session};
