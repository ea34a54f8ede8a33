//! Command-line interface
//!
//! Argument parsing for the `chainlog` binary.

pub mod commands;

pub use commands::{Command, Opt};
