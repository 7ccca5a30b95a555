//! Dwell-time tracker CLI library.
//!
//! This crate provides the CLI interface for the dwell engine.

mod cli;
pub mod commands;
mod config;
pub mod script;

pub use cli::{Cli, Commands};
pub use config::Config;
