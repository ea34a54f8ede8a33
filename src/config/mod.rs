//! Configuration management
//!
//! Node address, data directory and mining settings, read from the
//! environment once at startup.

pub mod settings;

pub use settings::Config;
