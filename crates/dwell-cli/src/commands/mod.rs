//! CLI subcommand implementations.

pub mod config;
pub mod simulate;
pub mod util;
pub mod watch;
