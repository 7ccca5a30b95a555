//! Interval ledger: the ordered record of active-time spans.
//!
//! Every operation takes the current clock reading explicitly, so the
//! ledger itself holds no clock and is trivially testable.

use serde::{Deserialize, Serialize};

/// One contiguous period during which the session counted as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    /// Clock reading when the span opened.
    pub start_ms: u64,

    /// Clock reading when the span closed. `None` while open.
    pub stop_ms: Option<u64>,
}

impl TimeSpan {
    pub const fn is_open(&self) -> bool {
        self.stop_ms.is_none()
    }

    /// Length of the span, measuring an open span up to `now_ms`.
    pub fn duration_ms(&self, now_ms: u64) -> u64 {
        self.stop_ms.unwrap_or(now_ms).saturating_sub(self.start_ms)
    }
}

/// Ordered, non-overlapping spans with at most one open span (the last).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalLedger {
    spans: Vec<TimeSpan>,
    running: bool,
}

impl IntervalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a span at `now_ms` unless one is already open.
    ///
    /// Returns `true` if a span was opened.
    pub fn start(&mut self, now_ms: u64) -> bool {
        if self.open_span().is_some() {
            return false;
        }
        // A span can never begin before the previous one ended.
        let start_ms = self
            .spans
            .last()
            .and_then(|span| span.stop_ms)
            .map_or(now_ms, |stop| now_ms.max(stop));
        self.spans.push(TimeSpan {
            start_ms,
            stop_ms: None,
        });
        self.running = true;
        true
    }

    /// Closes the open span at `now_ms`.
    ///
    /// Returns `true` if a span was closed. Closed spans are never rewritten.
    pub fn stop(&mut self, now_ms: u64) -> bool {
        if self.spans.is_empty() {
            return false;
        }
        self.running = false;
        match self.spans.last_mut() {
            Some(span) if span.is_open() => {
                span.stop_ms = Some(now_ms.max(span.start_ms));
                true
            }
            _ => false,
        }
    }

    /// Total active time: closed spans plus the open span measured to `now_ms`.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        self.spans.iter().map(|span| span.duration_ms(now_ms)).sum()
    }

    /// Discards every span. The running flag is left untouched.
    pub fn reset(&mut self) {
        self.spans.clear();
    }

    pub fn spans(&self) -> &[TimeSpan] {
        &self.spans
    }

    pub fn open_span(&self) -> Option<&TimeSpan> {
        self.spans.last().filter(|span| span.is_open())
    }

    pub const fn is_running(&self) -> bool {
        self.running
    }
}
