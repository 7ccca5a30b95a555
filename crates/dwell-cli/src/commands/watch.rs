//! Implementation of the `dwell watch` command.
//!
//! Live mode: one input per stdin line. Signal names (`scroll`, `blur`,
//! `mousemove`, ...) go through the signal feed; `start`, `stop`, `resume`,
//! `reset`, `reset-idle` call the tracker directly; `status` prints the
//! current state; `end` or EOF tears the engine down.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use dwell_core::{DwellDriver, DwellHandle, DwellTracker, MonotonicClock, SignalFeed};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::util::{Firing, FiringSink, format_ms, state_name, with_configured_callbacks};
use crate::Config;
use crate::script::Action;

/// Run the watch command.
pub fn run(config: &Config) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    runtime.block_on(watch(config))
}

async fn watch(config: &Config) -> Result<()> {
    let clock = MonotonicClock::new();
    let sink: FiringSink = Arc::new(|firing: Firing| {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{firing}");
    });
    let builder = DwellTracker::builder().config(config.tracker()).clock(clock);
    let tracker = with_configured_callbacks(builder, config, &clock, &sink)
        .build()
        .context("invalid tracker configuration")?;

    let feed = SignalFeed::new();
    let mut driver =
        DwellDriver::spawn(tracker, feed.clone()).context("failed to start dwell driver")?;
    let handle = driver.handle();
    handle.start_timer();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let word = line.split('#').next().unwrap_or_default().trim();
        if word.is_empty() {
            continue;
        }
        if word == "status" {
            write_status(&mut std::io::stdout().lock(), &handle)?;
            continue;
        }
        let action = match word.parse::<Action>() {
            Ok(action) => action,
            Err(err) => {
                tracing::warn!("ignoring input: {err:#}");
                continue;
            }
        };
        if !apply(&handle, &feed, action) {
            break;
        }
    }

    let total = handle.time_in_ms();
    driver.destroy();
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "Total dwell time: {}", format_ms(total))?;
    Ok(())
}

/// Applies one live input. Returns `false` when watching should stop.
fn apply(handle: &DwellHandle, feed: &SignalFeed, action: Action) -> bool {
    match action {
        Action::Signal(signal) => {
            if !feed.emit(signal) {
                tracing::warn!(%signal, "signal not delivered");
            }
        }
        Action::Start => handle.start_timer(),
        Action::Stop => handle.stop_timer(),
        Action::Resume => handle.resume_timer(),
        Action::Reset => handle.reset(),
        Action::ResetIdle => handle.reset_idle_time(),
        Action::Destroy | Action::End => return false,
    }
    true
}

fn write_status<W: Write>(writer: &mut W, handle: &DwellHandle) -> Result<()> {
    writeln!(
        writer,
        "state: {}, dwell: {}, spans: {}",
        state_name(handle.state()),
        format_ms(handle.time_in_ms()),
        handle.times().len()
    )?;
    Ok(())
}
