//! Idle detection by tick accounting.
//!
//! Silence is measured in ticks, not wall time: if ticks are delayed the
//! accumulated idle time reflects ticks observed.

/// Outcome of advancing the detector by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleStep {
    /// Session is not running; nothing accumulated.
    Paused,
    /// Silence grew by one tick period.
    Accumulated,
    /// The timeout was reached; the session must stop.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleDetector {
    idle: bool,
    current_idle_time_ms: u64,
    idle_timeout_ms: u64,
}

impl IdleDetector {
    pub const fn new(idle_timeout_ms: u64) -> Self {
        Self {
            idle: false,
            current_idle_time_ms: 0,
            idle_timeout_ms,
        }
    }

    /// Advances silence accounting by one tick.
    pub const fn advance(&mut self, running: bool, tick_ms: u64) -> IdleStep {
        if !running {
            return IdleStep::Paused;
        }
        if self.current_idle_time_ms >= self.idle_timeout_ms {
            self.idle = true;
            return IdleStep::TimedOut;
        }
        self.current_idle_time_ms = self.current_idle_time_ms.saturating_add(tick_ms);
        IdleStep::Accumulated
    }

    /// Clears silence and the idle flag.
    ///
    /// Returns whether the session was idle, i.e. whether the caller has to
    /// resume counting.
    pub const fn reset(&mut self) -> bool {
        let was_idle = self.idle;
        self.idle = false;
        self.current_idle_time_ms = 0;
        was_idle
    }

    pub const fn is_idle(&self) -> bool {
        self.idle
    }

    pub const fn current_idle_time_ms(&self) -> u64 {
        self.current_idle_time_ms
    }

    pub const fn idle_timeout_ms(&self) -> u64 {
        self.idle_timeout_ms
    }
}
