//! Shared utilities for CLI commands.

use std::fmt;
use std::sync::Arc;

use dwell_core::{
    AbsoluteTrigger, Clock, DwellTrackerBuilder, IntervalTrigger, SessionState, TransitionListener,
};
use serde::Serialize;

use crate::Config;

/// Which callback produced a [`Firing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FiringKind {
    Absolute,
    Interval,
    TabActive,
    TabInactive,
}

impl fmt::Display for FiringKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absolute => "absolute",
            Self::Interval => "interval",
            Self::TabActive => "tab-active",
            Self::TabInactive => "tab-inactive",
        };
        write!(f, "{s}")
    }
}

/// One observed callback invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Firing {
    /// Clock reading when the callback ran.
    pub at_ms: u64,
    pub kind: FiringKind,
    pub label: String,
    /// Elapsed active time passed to the callback.
    pub elapsed_ms: u64,
}

impl fmt::Display for Firing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} \"{}\" (dwell {})",
            format_ms(self.at_ms),
            self.kind,
            self.label,
            format_ms(self.elapsed_ms)
        )
    }
}

/// Receives every firing.
pub type FiringSink = Arc<dyn Fn(Firing) + Send + Sync>;

/// Registers the configured triggers plus one listener per tab transition,
/// all reporting to `sink`.
pub fn with_configured_callbacks<C>(
    mut builder: DwellTrackerBuilder,
    config: &Config,
    clock: &C,
    sink: &FiringSink,
) -> DwellTrackerBuilder
where
    C: Clock + Clone + 'static,
{
    for (index, spec) in config.absolute.iter().enumerate() {
        let label = spec
            .label
            .clone()
            .unwrap_or_else(|| format!("absolute #{}", index + 1));
        builder = builder.absolute_trigger(AbsoluteTrigger::new(
            spec.at_ms,
            reporter(FiringKind::Absolute, label, clock, sink),
        ));
    }

    for (index, spec) in config.interval.iter().enumerate() {
        let label = spec
            .label
            .clone()
            .unwrap_or_else(|| format!("interval #{}", index + 1));
        let growth = spec.growth;
        builder = builder.interval_trigger(IntervalTrigger::new(
            spec.start_ms,
            move |threshold| growth.next(threshold),
            reporter(FiringKind::Interval, label, clock, sink),
        ));
    }

    builder
        .tab_active_listener(TransitionListener::new(reporter(
            FiringKind::TabActive,
            "tab active".to_string(),
            clock,
            sink,
        )))
        .tab_inactive_listener(TransitionListener::new(reporter(
            FiringKind::TabInactive,
            "tab inactive".to_string(),
            clock,
            sink,
        )))
}

fn reporter<C>(
    kind: FiringKind,
    label: String,
    clock: &C,
    sink: &FiringSink,
) -> impl FnMut(u64) -> dwell_core::CallbackResult + Send + 'static
where
    C: Clock + Clone + 'static,
{
    let clock = clock.clone();
    let sink = Arc::clone(sink);
    move |elapsed_ms| {
        sink(Firing {
            at_ms: clock.now_ms(),
            kind,
            label: label.clone(),
            elapsed_ms,
        });
        Ok(())
    }
}

/// Lowercase name of a session state, as printed by every command.
pub const fn state_name(state: SessionState) -> &'static str {
    match state {
        SessionState::Stopped => "stopped",
        SessionState::Running => "running",
        SessionState::Idle => "idle",
        SessionState::Destroyed => "destroyed",
    }
}

/// Formats milliseconds as seconds with millisecond precision, e.g. `3.100s`.
pub fn format_ms(ms: u64) -> String {
    format!("{}.{:03}s", ms / 1000, ms % 1000)
}
