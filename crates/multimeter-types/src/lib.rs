//! Foundation types and traits for screeps-multimeter.
//!
//! This crate holds the pieces shared by every multimeter crate: the error
//! type, the TOML configuration, and the traits the console core uses to
//! talk to its two collaborators (the terminal and the remote transport).

pub mod backend;
pub mod config;
pub mod error;
