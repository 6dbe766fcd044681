//! Networking for screeps-multimeter: the relay transport.
//!
//! The relay speaks newline-delimited JSON over TCP. [`RelayClient`] is a
//! non-blocking, polled implementation of
//! [`Transport`](multimeter_types::backend::Transport) that reconnects
//! with exponential backoff.

mod backoff;
mod frame;
mod relay;

pub use backoff::Backoff;
pub use frame::{Inbound, LineBuffer, Outbound};
pub use relay::{RelayClient, RelayConfig, RelayState};
