//! Implementation of the `dwell simulate` command.
//!
//! Replays a timeline script against a manual clock. The poller ticks every
//! `check_callbacks_interval_ms` of simulated time; a tick scheduled at the
//! same instant as a script step runs first.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use dwell_core::{DwellTracker, ManualClock, TimeSpan};
use serde::Serialize;

use super::util::{Firing, FiringSink, format_ms, state_name, with_configured_callbacks};
use crate::Config;
use crate::script::{Action, Script};

/// Result of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// Simulated time at which the run stopped.
    pub ended_at_ms: u64,
    pub total_dwell_ms: u64,
    pub state: String,
    pub spans: Vec<TimeSpan>,
    pub firings: Vec<Firing>,
    /// Callbacks that returned an error.
    pub failures: usize,
}

/// Run the simulate command.
pub fn run<W: Write>(writer: &mut W, config: &Config, script_path: &Path, json: bool) -> Result<()> {
    let input = read_script(script_path)?;
    let script = Script::parse(&input)
        .with_context(|| format!("failed to parse {}", script_path.display()))?;
    let outcome = simulate(config, &script)?;

    if json {
        serde_json::to_writer_pretty(&mut *writer, &outcome)
            .context("failed to serialize simulation outcome")?;
        writeln!(writer)?;
    } else {
        render(writer, config, &outcome)?;
    }
    Ok(())
}

fn read_script(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("failed to read script from stdin")?;
        return Ok(input);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Replays `script` and collects every callback invocation.
pub fn simulate(config: &Config, script: &Script) -> Result<Outcome> {
    let clock = ManualClock::new();
    let firings = Arc::new(Mutex::new(Vec::new()));
    let sink: FiringSink = {
        let firings = Arc::clone(&firings);
        Arc::new(move |firing: Firing| {
            firings
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(firing);
        })
    };

    let builder = DwellTracker::builder()
        .config(config.tracker())
        .clock(clock.clone());
    let mut tracker = with_configured_callbacks(builder, config, &clock, &sink)
        .build()
        .context("invalid tracker configuration")?;

    let mut timeline = Timeline {
        clock,
        period_ms: config.check_callbacks_interval_ms,
        next_tick_ms: config.check_callbacks_interval_ms,
        failures: 0,
    };
    let end_ms = script.end_ms();

    for step in &script.steps {
        timeline.advance_to(&mut tracker, step.at_ms);
        tracing::debug!(at_ms = step.at_ms, action = %step.action, "applying step");
        match step.action {
            Action::Signal(signal) => timeline.failures += tracker.handle_signal(signal).len(),
            Action::Start => tracker.start_timer(),
            Action::Stop => tracker.stop_timer(),
            Action::Resume => tracker.resume_timer(),
            Action::Reset => tracker.reset(),
            Action::ResetIdle => tracker.reset_idle_time(),
            Action::Destroy => tracker.destroy(),
            Action::End => break,
        }
    }
    timeline.advance_to(&mut tracker, end_ms);

    let firings = std::mem::take(&mut *firings.lock().unwrap_or_else(PoisonError::into_inner));
    Ok(Outcome {
        ended_at_ms: end_ms,
        total_dwell_ms: tracker.time_in_ms(),
        state: state_name(tracker.state()).to_string(),
        spans: tracker.times().to_vec(),
        firings,
        failures: timeline.failures,
    })
}

/// Simulated time plus the poller schedule.
struct Timeline {
    clock: ManualClock,
    period_ms: u64,
    next_tick_ms: u64,
    failures: usize,
}

impl Timeline {
    /// Runs every tick due up to and including `target_ms`, then moves the
    /// clock to `target_ms`.
    fn advance_to(&mut self, tracker: &mut DwellTracker, target_ms: u64) {
        while self.next_tick_ms <= target_ms {
            self.clock.set(self.next_tick_ms);
            self.failures += tracker.tick().failures.len();
            self.next_tick_ms += self.period_ms;
        }
        self.clock.set(target_ms);
    }
}

fn render<W: Write>(writer: &mut W, config: &Config, outcome: &Outcome) -> Result<()> {
    writeln!(
        writer,
        "Simulated {} (idle timeout {}, tick {})",
        format_ms(outcome.ended_at_ms),
        format_ms(config.idle_timeout_ms),
        format_ms(config.check_callbacks_interval_ms)
    )?;

    if outcome.firings.is_empty() {
        writeln!(writer, "No callbacks fired.")?;
    } else {
        for firing in &outcome.firings {
            writeln!(writer, "{firing}")?;
        }
    }

    writeln!(writer, "Spans:")?;
    for span in &outcome.spans {
        match span.stop_ms {
            Some(stop_ms) => writeln!(
                writer,
                "- {} -> {} ({})",
                format_ms(span.start_ms),
                format_ms(stop_ms),
                format_ms(span.duration_ms(stop_ms))
            )?,
            None => writeln!(
                writer,
                "- {} -> open ({})",
                format_ms(span.start_ms),
                format_ms(span.duration_ms(outcome.ended_at_ms))
            )?,
        }
    }

    writeln!(writer, "State: {}", outcome.state)?;
    writeln!(writer, "Total dwell time: {}", format_ms(outcome.total_dwell_ms))?;
    if outcome.failures > 0 {
        writeln!(writer, "Callback failures: {}", outcome.failures)?;
    }
    Ok(())
}
