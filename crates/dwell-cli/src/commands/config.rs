//! Implementation of the `dwell config` command.

use std::io::Write;

use anyhow::{Context, Result};

use crate::Config;

/// Prints the effective configuration after all layers are merged.
pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, config).context("failed to serialize configuration")?;
    writeln!(writer)?;
    Ok(())
}
