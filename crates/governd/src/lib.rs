//! Governance daemon: lifecycle orchestration and configuration
//!
//! Library surface for embedding the daemon; the binary in `main.rs` is a
//! thin wrapper around [`Manager`].

pub mod config;
pub mod manager;

pub use config::Config;
pub use manager::Manager;
