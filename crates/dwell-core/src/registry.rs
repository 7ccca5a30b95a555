//! Callback registry: elapsed-time triggers and tab transition listeners.
//!
//! Registration is append-only. Each list grows by one entry per
//! registration for the lifetime of the tracker, so hosts registering from
//! inside repeating callbacks should expect [`Registry::len`] to grow.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{CallbackPanic, CallbackResult};

/// Callback receiving the current elapsed active time in milliseconds.
pub type ElapsedCallback = Box<dyn FnMut(u64) -> CallbackResult + Send>;

/// Computes the next threshold of an interval trigger from the previous one.
pub type GrowthFn = Box<dyn Fn(u64) -> u64 + Send + Sync>;

/// Runs `callback`, reporting a panic as an error.
fn invoke(callback: &mut ElapsedCallback, elapsed_ms: u64) -> CallbackResult {
    panic::catch_unwind(AssertUnwindSafe(|| callback(elapsed_ms)))
        .unwrap_or_else(|payload| Err(CallbackPanic::from_payload(payload.as_ref()).into()))
}

/// A one-shot trigger.
pub struct AbsoluteTrigger {
    callback: ElapsedCallback,
    threshold_ms: u64,
    pending: bool,
}

impl AbsoluteTrigger {
    /// Creates an armed trigger firing once elapsed time reaches `threshold_ms`.
    pub fn new<F>(threshold_ms: u64, callback: F) -> Self
    where
        F: FnMut(u64) -> CallbackResult + Send + 'static,
    {
        Self {
            callback: Box::new(callback),
            threshold_ms,
            pending: true,
        }
    }

    /// Creates a trigger that is already disarmed and will never fire.
    #[must_use]
    pub const fn disarmed(mut self) -> Self {
        self.pending = false;
        self
    }

    pub const fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }

    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    pub(crate) const fn is_due(&self, elapsed_ms: u64) -> bool {
        self.pending && self.threshold_ms <= elapsed_ms
    }

    /// Runs the callback and disarms the trigger permanently.
    pub(crate) fn fire(mut self, elapsed_ms: u64) -> (Self, CallbackResult) {
        let result = invoke(&mut self.callback, elapsed_ms);
        self.pending = false;
        (self, result)
    }
}

impl fmt::Debug for AbsoluteTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbsoluteTrigger")
            .field("threshold_ms", &self.threshold_ms)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

/// A repeating trigger whose next threshold comes from a growth function.
///
/// The growth function should not return less than its input; one that
/// returns its input unchanged fires on every tick once due.
pub struct IntervalTrigger {
    callback: ElapsedCallback,
    threshold_ms: u64,
    growth: GrowthFn,
}

impl IntervalTrigger {
    pub fn new<G, F>(threshold_ms: u64, growth: G, callback: F) -> Self
    where
        G: Fn(u64) -> u64 + Send + Sync + 'static,
        F: FnMut(u64) -> CallbackResult + Send + 'static,
    {
        Self {
            callback: Box::new(callback),
            threshold_ms,
            growth: Box::new(growth),
        }
    }

    /// Fires at `period_ms`, `2 * period_ms`, `3 * period_ms`, ...
    pub fn every<F>(period_ms: u64, callback: F) -> Self
    where
        F: FnMut(u64) -> CallbackResult + Send + 'static,
    {
        Self::new(
            period_ms,
            move |threshold: u64| threshold.saturating_add(period_ms),
            callback,
        )
    }

    /// Fires at `first_ms`, then doubles the threshold each time.
    pub fn doubling<F>(first_ms: u64, callback: F) -> Self
    where
        F: FnMut(u64) -> CallbackResult + Send + 'static,
    {
        Self::new(
            first_ms,
            |threshold: u64| threshold.saturating_mul(2),
            callback,
        )
    }

    /// Fires on every tick once `threshold_ms` has been reached.
    pub fn constant<F>(threshold_ms: u64, callback: F) -> Self
    where
        F: FnMut(u64) -> CallbackResult + Send + 'static,
    {
        Self::new(threshold_ms, |threshold: u64| threshold, callback)
    }

    pub const fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }

    pub(crate) const fn is_due(&self, elapsed_ms: u64) -> bool {
        self.threshold_ms <= elapsed_ms
    }

    /// Runs the callback and advances the threshold through the growth function.
    ///
    /// A growth function that panics retires the trigger.
    pub(crate) fn fire(mut self, elapsed_ms: u64) -> (Self, CallbackResult) {
        let result = invoke(&mut self.callback, elapsed_ms);
        let threshold_ms = self.threshold_ms;
        let growth = &self.growth;
        match panic::catch_unwind(AssertUnwindSafe(|| growth(threshold_ms))) {
            Ok(next_ms) => {
                self.threshold_ms = next_ms;
                (self, result)
            }
            Err(payload) => {
                self.threshold_ms = u64::MAX;
                let failure = CallbackPanic::from_payload(payload.as_ref());
                (self, result.and(Err(failure.into())))
            }
        }
    }
}

impl fmt::Debug for IntervalTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalTrigger")
            .field("threshold_ms", &self.threshold_ms)
            .finish_non_exhaustive()
    }
}

/// Stateless callback invoked on a tab-active or tab-inactive transition.
pub struct TransitionListener(ElapsedCallback);

impl TransitionListener {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(u64) -> CallbackResult + Send + 'static,
    {
        Self(Box::new(callback))
    }

    pub(crate) fn call(&mut self, elapsed_ms: u64) -> CallbackResult {
        invoke(&mut self.0, elapsed_ms)
    }
}

impl fmt::Debug for TransitionListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransitionListener")
    }
}

/// A registration waiting to be appended to the registry.
#[derive(Debug)]
pub enum Registration {
    Interval(IntervalTrigger),
    Absolute(AbsoluteTrigger),
    TabActive(TransitionListener),
    TabInactive(TransitionListener),
}

/// The four callback collections owned by a tracker.
#[derive(Debug, Default)]
pub struct Registry {
    pub(crate) interval: Vec<IntervalTrigger>,
    pub(crate) absolute: Vec<AbsoluteTrigger>,
    pub(crate) tab_active: Vec<TransitionListener>,
    pub(crate) tab_inactive: Vec<TransitionListener>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, registration: Registration) {
        match registration {
            Registration::Interval(trigger) => self.interval.push(trigger),
            Registration::Absolute(trigger) => self.absolute.push(trigger),
            Registration::TabActive(listener) => self.tab_active.push(listener),
            Registration::TabInactive(listener) => self.tab_inactive.push(listener),
        }
    }

    /// Total number of registered callbacks across all collections.
    pub fn len(&self) -> usize {
        self.interval.len() + self.absolute.len() + self.tab_active.len() + self.tab_inactive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn interval_triggers(&self) -> &[IntervalTrigger] {
        &self.interval
    }

    pub fn absolute_triggers(&self) -> &[AbsoluteTrigger] {
        &self.absolute
    }

    /// Drops every callback, releasing whatever they captured.
    pub fn clear(&mut self) {
        self.interval.clear();
        self.absolute.clear();
        self.tab_active.clear();
        self.tab_inactive.clear();
    }
}

/// Cloneable handle for registering callbacks without borrowing the tracker.
///
/// Callbacks run while the tracker is borrowed, so a callback that wants to
/// register another one captures a `Registrar`. Queued registrations are
/// appended after the scan that is currently running.
#[derive(Debug, Clone, Default)]
pub struct Registrar {
    queue: Arc<Mutex<Vec<Registration>>>,
}

impl Registrar {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn add_time_interval_ellapsed_callback(&self, trigger: IntervalTrigger) {
        self.push(Registration::Interval(trigger));
    }

    pub fn add_absolute_time_ellapsed_callback(&self, trigger: AbsoluteTrigger) {
        self.push(Registration::Absolute(trigger));
    }

    pub fn add_browser_tab_active_callback(&self, listener: TransitionListener) {
        self.push(Registration::TabActive(listener));
    }

    pub fn add_browser_tab_inactive_callback(&self, listener: TransitionListener) {
        self.push(Registration::TabInactive(listener));
    }

    fn push(&self, registration: Registration) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(registration);
    }

    /// Takes every queued registration in submission order.
    pub(crate) fn drain(&self) -> Vec<Registration> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
