//! Timeline scripts for `dwell simulate`.
//!
//! One step per line: `<at_ms> <action>`. Blank lines and `#` comments are
//! skipped. Times must not go backwards.
//!
//! ```text
//! # user reads, switches tab, comes back
//! 0     start
//! 1200  scroll
//! 4000  blur
//! 9000  focus
//! 12000 end
//! ```

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use dwell_core::Signal;

/// Something that can happen at a point on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// An input signal, by canonical or browser event name.
    Signal(Signal),
    Start,
    Stop,
    Resume,
    Reset,
    ResetIdle,
    Destroy,
    /// Ends the simulation.
    End,
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let action = match s {
            "start" => Self::Start,
            "stop" => Self::Stop,
            "resume" => Self::Resume,
            "reset" => Self::Reset,
            "reset-idle" => Self::ResetIdle,
            "destroy" => Self::Destroy,
            "end" => Self::End,
            other => Self::Signal(other.parse().with_context(|| {
                format!(
                    "unknown action '{other}' (expected start, stop, resume, reset, reset-idle, destroy, end or a signal name)"
                )
            })?),
        };
        Ok(action)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(signal) => write!(f, "{signal}"),
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
            Self::Resume => write!(f, "resume"),
            Self::Reset => write!(f, "reset"),
            Self::ResetIdle => write!(f, "reset-idle"),
            Self::Destroy => write!(f, "destroy"),
            Self::End => write!(f, "end"),
        }
    }
}

/// A timed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub at_ms: u64,
    pub action: Action,
}

/// A parsed timeline, ordered by time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    pub fn parse(input: &str) -> Result<Self> {
        let mut steps: Vec<Step> = Vec::new();

        for (index, raw) in input.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            let mut parts = line.split_whitespace();
            let (Some(at), Some(action), None) = (parts.next(), parts.next(), parts.next()) else {
                bail!("line {line_no}: expected '<at_ms> <action>', got '{line}'");
            };
            let at_ms: u64 = at
                .parse()
                .with_context(|| format!("line {line_no}: invalid time '{at}'"))?;
            let action: Action = action
                .parse()
                .with_context(|| format!("line {line_no}: invalid action"))?;

            if let Some(previous) = steps.last() {
                if at_ms < previous.at_ms {
                    bail!(
                        "line {line_no}: time {at_ms}ms is before previous step at {}ms",
                        previous.at_ms
                    );
                }
            }
            steps.push(Step { at_ms, action });
        }

        Ok(Self { steps })
    }

    /// Where the simulation stops: the first `end`, else the last step.
    pub fn end_ms(&self) -> u64 {
        self.steps
            .iter()
            .find(|step| step.action == Action::End)
            .or_else(|| self.steps.last())
            .map_or(0, |step| step.at_ms)
    }
}
