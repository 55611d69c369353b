//! Command-line interface
//!
//! Argument parsing for the node binary: `ahmiyat <listen_port>` plus the
//! wallet keygen subcommand.

pub mod commands;

pub use commands::{Command, Opt};
