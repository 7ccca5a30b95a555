//! The dwell tracker: session state machine and poller tick.
//!
//! # States
//!
//! - `Stopped`: no span open.
//! - `Running`: a span is open and counting.
//! - `Idle`: stopped by the idle detector rather than by the caller; the
//!   next activity signal resumes counting.
//! - `Destroyed`: terminal. Every mutating call is a no-op.
//!
//! # Tick
//!
//! Each [`DwellTracker::tick`] samples elapsed time once, then:
//!
//! 1. fires every pending absolute trigger that is due, in registration order,
//! 2. fires every interval trigger that is due (at most once each) and
//!    advances its threshold,
//! 3. advances idle accounting, pausing the session on timeout.
//!
//! Ticks are inert until the first `start_timer` (or anything that implies it).

use std::sync::Arc;

use crate::clock::{Clock, MonotonicClock};
use crate::config::DwellConfig;
use crate::error::{BoxError, CallbackFailure, CallbackKind, DwellError};
use crate::idle::{IdleDetector, IdleStep};
use crate::ledger::{IntervalLedger, TimeSpan};
use crate::registry::{
    AbsoluteTrigger, IntervalTrigger, Registrar, Registration, Registry, TransitionListener,
};
use crate::signal::Signal;

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Stopped,
    Running,
    Idle,
    Destroyed,
}

/// What happened during one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Elapsed active time the callbacks were invoked with.
    pub elapsed_ms: u64,
    pub absolute_fired: usize,
    pub interval_fired: usize,
    /// The idle timeout was reached and the session paused.
    pub went_idle: bool,
    /// Callbacks that returned an error. The tick still completed.
    pub failures: Vec<CallbackFailure>,
}

impl TickReport {
    pub const fn fired(&self) -> usize {
        self.absolute_fired + self.interval_fired
    }
}

/// Single-session dwell-time tracker.
///
/// The tracker is a plain synchronous state machine. Something has to call
/// [`tick`](Self::tick) every [`DwellConfig::check_callbacks_interval_ms`];
/// [`DwellDriver`](crate::DwellDriver) does this on a tokio task.
#[derive(Debug)]
pub struct DwellTracker {
    config: DwellConfig,
    clock: Arc<dyn Clock>,
    ledger: IntervalLedger,
    idle: IdleDetector,
    registry: Registry,
    registrar: Registrar,
    poller_booted: bool,
    destroyed: bool,
}

/// Builder for [`DwellTracker`], carrying initial registry contents.
#[derive(Debug, Default)]
pub struct DwellTrackerBuilder {
    config: DwellConfig,
    clock: Option<Arc<dyn Clock>>,
    registry: Registry,
}

impl DwellTrackerBuilder {
    #[must_use]
    pub fn config(mut self, config: DwellConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn check_callbacks_interval_ms(mut self, ms: u64) -> Self {
        self.config.check_callbacks_interval_ms = ms;
        self
    }

    /// Uses `clock` instead of the real monotonic clock.
    #[must_use]
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    #[must_use]
    pub fn interval_trigger(mut self, trigger: IntervalTrigger) -> Self {
        self.registry.register(Registration::Interval(trigger));
        self
    }

    #[must_use]
    pub fn absolute_trigger(mut self, trigger: AbsoluteTrigger) -> Self {
        self.registry.register(Registration::Absolute(trigger));
        self
    }

    #[must_use]
    pub fn tab_active_listener(mut self, listener: TransitionListener) -> Self {
        self.registry.register(Registration::TabActive(listener));
        self
    }

    #[must_use]
    pub fn tab_inactive_listener(mut self, listener: TransitionListener) -> Self {
        self.registry.register(Registration::TabInactive(listener));
        self
    }

    pub fn build(self) -> Result<DwellTracker, DwellError> {
        self.config.validate()?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        tracing::debug!(
            idle_timeout_ms = self.config.idle_timeout_ms,
            check_callbacks_interval_ms = self.config.check_callbacks_interval_ms,
            callbacks = self.registry.len(),
            "dwell tracker created"
        );
        Ok(DwellTracker {
            config: self.config,
            clock,
            ledger: IntervalLedger::new(),
            idle: IdleDetector::new(self.config.idle_timeout_ms),
            registry: self.registry,
            registrar: Registrar::new(),
            poller_booted: false,
            destroyed: false,
        })
    }
}

impl DwellTracker {
    pub fn builder() -> DwellTrackerBuilder {
        DwellTrackerBuilder::default()
    }

    /// Creates a tracker with `config`, the real clock and empty registries.
    pub fn new(config: DwellConfig) -> Result<Self, DwellError> {
        Self::builder().config(config).build()
    }

    pub const fn config(&self) -> &DwellConfig {
        &self.config
    }

    // ========== Session control ==========

    /// Opens a span if none is open and boots the poller on first use.
    pub fn start_timer(&mut self) {
        if self.ignore_after_destroy("start_timer") {
            return;
        }
        if !self.poller_booted {
            self.poller_booted = true;
            tracing::debug!("poller booted");
        }
        let now_ms = self.clock.now_ms();
        if self.ledger.start(now_ms) {
            tracing::debug!(now_ms, "span opened");
        }
    }

    /// Closes the open span, if any.
    pub fn stop_timer(&mut self) {
        if self.ignore_after_destroy("stop_timer") {
            return;
        }
        let now_ms = self.clock.now_ms();
        if self.ledger.stop(now_ms) {
            tracing::debug!(now_ms, elapsed_ms = self.time_in_ms(), "span closed");
        }
    }

    /// Resumes counting. Same as [`start_timer`](Self::start_timer): a span is
    /// opened whenever none is open, so a running tracker always counts.
    pub fn resume_timer(&mut self) {
        self.start_timer();
    }

    /// Records activity: clears idle time and, if the session had gone
    /// idle, resumes counting.
    pub fn reset_idle_time(&mut self) {
        if self.ignore_after_destroy("reset_idle_time") {
            return;
        }
        if self.idle.reset() {
            tracing::debug!("activity after idle timeout, resuming");
            self.start_timer();
        }
    }

    /// Records activity and forces the timer on regardless of idle state.
    pub fn reset_idle_time_with_start_timer(&mut self) {
        self.reset_idle_time();
        self.start_timer();
    }

    /// Discards every span. Running flag, idle state and registries are kept.
    pub fn reset(&mut self) {
        if self.ignore_after_destroy("reset") {
            return;
        }
        self.ledger.reset();
        tracing::debug!("ledger reset");
    }

    /// Tears the tracker down: the open span is closed, callbacks are
    /// dropped and every later call is a no-op. Queries keep answering from
    /// the final state.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.ledger.stop(self.clock.now_ms());
        self.destroyed = true;
        self.registry.clear();
        drop(self.registrar.drain());
        tracing::debug!(elapsed_ms = self.time_in_ms(), "dwell tracker destroyed");
    }

    // ========== Queries ==========

    /// Total active time in milliseconds.
    pub fn time_in_ms(&self) -> u64 {
        self.ledger.elapsed_ms(self.clock.now_ms())
    }

    /// The recorded spans, oldest first.
    pub fn times(&self) -> &[TimeSpan] {
        self.ledger.spans()
    }

    pub const fn is_running(&self) -> bool {
        self.ledger.is_running()
    }

    pub const fn is_idle(&self) -> bool {
        self.idle.is_idle()
    }

    pub const fn current_idle_time_ms(&self) -> u64 {
        self.idle.current_idle_time_ms()
    }

    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub const fn state(&self) -> SessionState {
        if self.destroyed {
            SessionState::Destroyed
        } else if self.ledger.is_running() {
            SessionState::Running
        } else if self.idle.is_idle() {
            SessionState::Idle
        } else {
            SessionState::Stopped
        }
    }

    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle for registering callbacks from inside other callbacks.
    pub fn registrar(&self) -> Registrar {
        self.registrar.clone()
    }

    // ========== Registration ==========

    pub fn add_time_interval_ellapsed_callback(&mut self, trigger: IntervalTrigger) {
        self.register(Registration::Interval(trigger));
    }

    pub fn add_absolute_time_ellapsed_callback(&mut self, trigger: AbsoluteTrigger) {
        self.register(Registration::Absolute(trigger));
    }

    pub fn add_browser_tab_active_callback(&mut self, listener: TransitionListener) {
        self.register(Registration::TabActive(listener));
    }

    pub fn add_browser_tab_inactive_callback(&mut self, listener: TransitionListener) {
        self.register(Registration::TabInactive(listener));
    }

    fn register(&mut self, registration: Registration) {
        if self.ignore_after_destroy("register") {
            return;
        }
        self.registry.register(registration);
    }

    /// Appends registrations queued through the [`Registrar`].
    fn absorb_registrations(&mut self) {
        for registration in self.registrar.drain() {
            self.register(registration);
        }
    }

    // ========== Signals ==========

    /// Dispatches one input signal. Returns listener failures, if any.
    pub fn handle_signal(&mut self, signal: Signal) -> Vec<CallbackFailure> {
        tracing::trace!(%signal, "signal received");
        match signal {
            Signal::WindowActive => self.on_tab_active(),
            Signal::WindowInactive | Signal::LeftSurface => self.on_tab_inactive(),
            Signal::Activity => {
                self.reset_idle_time();
                Vec::new()
            }
            Signal::StrongActivity => {
                self.reset_idle_time_with_start_timer();
                Vec::new()
            }
        }
    }

    /// The view became active: clears idle time, makes sure a span is open
    /// and notifies tab-active listeners.
    pub fn on_tab_active(&mut self) -> Vec<CallbackFailure> {
        if self.ignore_after_destroy("on_tab_active") {
            return Vec::new();
        }
        self.idle.reset();
        self.start_timer();
        self.notify(CallbackKind::TabActive)
    }

    /// The view went to the background: closes the open span (if any) and
    /// notifies tab-inactive listeners, every time.
    ///
    /// An idle session becomes plain `Stopped`, so activity delivered to the
    /// background view does not resume counting.
    pub fn on_tab_inactive(&mut self) -> Vec<CallbackFailure> {
        if self.ignore_after_destroy("on_tab_inactive") {
            return Vec::new();
        }
        self.idle.reset();
        self.stop_timer();
        self.notify(CallbackKind::TabInactive)
    }

    fn notify(&mut self, kind: CallbackKind) -> Vec<CallbackFailure> {
        self.absorb_registrations();
        let elapsed_ms = self.time_in_ms();
        let listeners = match kind {
            CallbackKind::TabActive => &mut self.registry.tab_active,
            _ => &mut self.registry.tab_inactive,
        };
        let mut failures = Vec::new();
        for (index, listener) in listeners.iter_mut().enumerate() {
            if let Err(source) = listener.call(elapsed_ms) {
                failures.push(failure(kind, index, elapsed_ms, source));
            }
        }
        self.absorb_registrations();
        failures
    }

    // ========== Poller ==========

    /// Runs one poller cycle.
    pub fn tick(&mut self) -> TickReport {
        if self.destroyed || !self.poller_booted {
            return TickReport {
                elapsed_ms: self.time_in_ms(),
                ..TickReport::default()
            };
        }

        self.absorb_registrations();
        let elapsed_ms = self.time_in_ms();
        let mut report = TickReport {
            elapsed_ms,
            ..TickReport::default()
        };

        let absolute = std::mem::take(&mut self.registry.absolute);
        self.registry.absolute = absolute
            .into_iter()
            .enumerate()
            .map(|(index, trigger)| {
                if !trigger.is_due(elapsed_ms) {
                    return trigger;
                }
                let (trigger, result) = trigger.fire(elapsed_ms);
                report.absolute_fired += 1;
                if let Err(source) = result {
                    report
                        .failures
                        .push(failure(CallbackKind::Absolute, index, elapsed_ms, source));
                }
                trigger
            })
            .collect();
        self.absorb_registrations();

        let interval = std::mem::take(&mut self.registry.interval);
        self.registry.interval = interval
            .into_iter()
            .enumerate()
            .map(|(index, trigger)| {
                if !trigger.is_due(elapsed_ms) {
                    return trigger;
                }
                let (trigger, result) = trigger.fire(elapsed_ms);
                report.interval_fired += 1;
                if let Err(source) = result {
                    report
                        .failures
                        .push(failure(CallbackKind::Interval, index, elapsed_ms, source));
                }
                trigger
            })
            .collect();
        self.absorb_registrations();

        let step = self
            .idle
            .advance(self.ledger.is_running(), self.config.check_callbacks_interval_ms);
        if step == IdleStep::TimedOut {
            tracing::debug!(
                idle_timeout_ms = self.idle.idle_timeout_ms(),
                "idle timeout reached, pausing"
            );
            self.stop_timer();
            report.went_idle = true;
        }

        tracing::trace!(
            elapsed_ms,
            fired = report.fired(),
            idle_ms = self.idle.current_idle_time_ms(),
            "tick"
        );
        report
    }

    fn ignore_after_destroy(&self, operation: &'static str) -> bool {
        if self.destroyed {
            tracing::debug!(operation, "ignored after destroy");
        }
        self.destroyed
    }
}

fn failure(kind: CallbackKind, index: usize, elapsed_ms: u64, source: BoxError) -> CallbackFailure {
    let failure = CallbackFailure {
        kind,
        index,
        elapsed_ms,
        source,
    };
    tracing::warn!(%failure, "callback failed");
    failure
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::clock::ManualClock;
    use crate::error::CallbackResult;

    const TICK_MS: u64 = 100;

    fn tracker_with(clock: &ManualClock, idle_timeout_ms: u64) -> DwellTracker {
        DwellTracker::builder()
            .clock(clock.clone())
            .idle_timeout_ms(idle_timeout_ms)
            .check_callbacks_interval_ms(TICK_MS)
            .build()
            .unwrap()
    }

    /// Advances the clock one period at a time, ticking after each step.
    fn run_ticks(tracker: &mut DwellTracker, clock: &ManualClock, n: usize) -> Vec<TickReport> {
        (0..n)
            .map(|_| {
                clock.advance(tracker.config().check_callbacks_interval_ms);
                tracker.tick()
            })
            .collect()
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut(u64) -> CallbackResult + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl FnMut(u64) -> CallbackResult + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&seen);
        (seen, move |elapsed| {
            inner.lock().unwrap().push(elapsed);
            Ok(())
        })
    }

    #[test]
    fn test_builder_rejects_zero_tick() {
        let result = DwellTracker::builder().check_callbacks_interval_ms(0).build();
        assert!(matches!(result, Err(DwellError::InvalidConfig { .. })));
    }

    #[test]
    fn test_additivity_across_tab_events() {
        let clock = ManualClock::new();
        let mut tracker = tracker_with(&clock, 60_000);

        tracker.start_timer();
        clock.advance(400);
        tracker.stop_timer();

        clock.advance(1000);
        tracker.on_tab_inactive();
        clock.advance(1000);

        tracker.start_timer();
        clock.advance(250);
        tracker.stop_timer();

        clock.advance(500);
        assert_eq!(tracker.time_in_ms(), 650);
        assert_eq!(tracker.times().len(), 2);
    }

    #[test]
    fn test_repeated_start_and_stop_leave_ledger_unchanged() {
        let clock = ManualClock::new();
        let mut tracker = tracker_with(&clock, 60_000);

        tracker.start_timer();
        clock.advance(10);
        tracker.start_timer();
        assert_eq!(tracker.times().len(), 1);
        assert_eq!(tracker.times()[0].start_ms, 0);

        clock.advance(90);
        tracker.stop_timer();
        clock.advance(50);
        tracker.stop_timer();
        assert_eq!(tracker.times()[0].stop_ms, Some(100));
        assert_eq!(tracker.time_in_ms(), 100);
    }

    #[test]
    fn test_idle_round_trip() {
        let clock = ManualClock::new();
        let mut tracker = tracker_with(&clock, 3000);
        tracker.start_timer();

        let reports = run_ticks(&mut tracker, &clock, 40);
        let idle_tick = reports.iter().position(|r| r.went_idle).unwrap();
        // Tick n happens at (n + 1) * TICK_MS; idle must hit within T + P.
        let idle_at = (idle_tick as u64 + 1) * TICK_MS;
        assert!(idle_at <= 3000 + TICK_MS, "went idle at {idle_at}ms");
        assert_eq!(tracker.state(), SessionState::Idle);
        assert!(!tracker.is_running());

        let frozen = tracker.time_in_ms();
        assert_eq!(frozen, idle_at);
        clock.advance(5000);
        assert_eq!(tracker.time_in_ms(), frozen);

        tracker.handle_signal(Signal::Activity);
        assert_eq!(tracker.state(), SessionState::Running);
        assert_eq!(tracker.times().len(), 2);
        clock.advance(300);
        assert_eq!(tracker.time_in_ms(), frozen + 300);
    }

    #[test]
    fn test_idle_only_fires_once_while_stopped() {
        let clock = ManualClock::new();
        let mut tracker = tracker_with(&clock, 200);
        tracker.start_timer();

        let reports = run_ticks(&mut tracker, &clock, 20);
        assert_eq!(reports.iter().filter(|r| r.went_idle).count(), 1);
    }

    #[test]
    fn test_activity_keeps_session_running() {
        let clock = ManualClock::new();
        let mut tracker = tracker_with(&clock, 300);
        tracker.start_timer();

        for _ in 0..20 {
            run_ticks(&mut tracker, &clock, 2);
            tracker.handle_signal(Signal::Activity);
        }
        assert_eq!(tracker.state(), SessionState::Running);
        assert_eq!(tracker.time_in_ms(), 4000);
    }

    #[test]
    fn test_absolute_trigger_fires_exactly_once() {
        let clock = ManualClock::new();
        let (count, callback) = counter();
        let mut tracker = DwellTracker::builder()
            .clock(clock.clone())
            .idle_timeout_ms(60_000)
            .check_callbacks_interval_ms(TICK_MS)
            .absolute_trigger(AbsoluteTrigger::new(1000, callback))
            .build()
            .unwrap();
        tracker.start_timer();

        run_ticks(&mut tracker, &clock, 9);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        run_ticks(&mut tracker, &clock, 50);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!tracker.registry().absolute_triggers()[0].is_pending());
    }

    #[test]
    fn test_due_absolute_triggers_fire_in_registration_order() {
        let clock = ManualClock::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut tracker = tracker_with(&clock, 60_000);
        for (label, threshold) in [("a", 300), ("b", 100), ("c", 200)] {
            let order = Arc::clone(&order);
            tracker.add_absolute_time_ellapsed_callback(AbsoluteTrigger::new(
                threshold,
                move |_| {
                    order.lock().unwrap().push(label);
                    Ok(())
                },
            ));
        }
        tracker.start_timer();
        clock.advance(500);
        let report = tracker.tick();

        assert_eq!(report.absolute_fired, 3);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_interval_trigger_repeats_with_growth() {
        let clock = ManualClock::new();
        let (seen, callback) = recorder();
        let mut tracker = DwellTracker::builder()
            .clock(clock.clone())
            .check_callbacks_interval_ms(10)
            .interval_trigger(IntervalTrigger::new(10, |t| t * 2, callback))
            .build()
            .unwrap();
        tracker.start_timer();

        for _ in 0..10 {
            clock.advance(10);
            tracker.tick();
        }

        assert_eq!(*seen.lock().unwrap(), vec![10, 20, 40, 80]);
        assert_eq!(tracker.registry().interval_triggers()[0].threshold_ms(), 160);
    }

    #[test]
    fn test_non_advancing_growth_fires_once_per_tick() {
        let clock = ManualClock::new();
        let (count, callback) = counter();
        let mut tracker = tracker_with(&clock, 60_000);
        tracker.add_time_interval_ellapsed_callback(IntervalTrigger::constant(100, callback));
        tracker.start_timer();

        run_ticks(&mut tracker, &clock, 5);
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_tab_inactive_always_stops_and_notifies() {
        let clock = ManualClock::new();
        let (seen, callback) = recorder();
        let mut tracker = tracker_with(&clock, 60_000);
        tracker.add_browser_tab_inactive_callback(TransitionListener::new(callback));

        tracker.start_timer();
        clock.advance(700);
        tracker.handle_signal(Signal::WindowInactive);
        assert!(!tracker.is_running());
        assert_eq!(tracker.times()[0].stop_ms, Some(700));

        let ledger_before = tracker.times().to_vec();
        clock.advance(300);
        tracker.handle_signal(Signal::LeftSurface);

        assert_eq!(tracker.times(), ledger_before.as_slice());
        assert_eq!(*seen.lock().unwrap(), vec![700, 700]);
    }

    #[test]
    fn test_tab_active_starts_and_notifies_without_double_span() {
        let clock = ManualClock::new();
        let (seen, callback) = recorder();
        let mut tracker = tracker_with(&clock, 60_000);
        tracker.add_browser_tab_active_callback(TransitionListener::new(callback));

        tracker.handle_signal(Signal::WindowActive);
        assert!(tracker.is_running());
        clock.advance(200);
        tracker.handle_signal(Signal::WindowActive);

        assert_eq!(tracker.times().len(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![0, 200]);
    }

    #[test]
    fn test_tab_inactive_while_idle_stops_for_good() {
        let clock = ManualClock::new();
        let mut tracker = tracker_with(&clock, 200);
        tracker.start_timer();
        run_ticks(&mut tracker, &clock, 5);
        assert_eq!(tracker.state(), SessionState::Idle);
        let frozen = tracker.time_in_ms();

        tracker.handle_signal(Signal::WindowInactive);
        assert_eq!(tracker.state(), SessionState::Stopped);
        assert!(!tracker.is_idle());

        // A scroll reaching the background view must not resume counting.
        tracker.handle_signal(Signal::Activity);
        clock.advance(1000);
        assert!(!tracker.is_running());
        assert_eq!(tracker.time_in_ms(), frozen);

        tracker.handle_signal(Signal::WindowActive);
        clock.advance(100);
        assert_eq!(tracker.time_in_ms(), frozen + 100);
    }

    #[test]
    fn test_tab_active_after_reset_while_running() {
        let clock = ManualClock::new();
        let (seen, callback) = recorder();
        let mut tracker = tracker_with(&clock, 60_000);
        tracker.add_browser_tab_active_callback(TransitionListener::new(callback));
        tracker.start_timer();
        clock.advance(500);

        tracker.reset();
        assert!(tracker.is_running());
        assert!(tracker.times().is_empty());

        clock.advance(200);
        tracker.handle_signal(Signal::WindowActive);
        clock.advance(100);

        assert_eq!(
            tracker.times(),
            &[TimeSpan {
                start_ms: 700,
                stop_ms: None
            }]
        );
        assert_eq!(tracker.time_in_ms(), 100);
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn test_tab_active_after_idle_clears_idle_time() {
        let clock = ManualClock::new();
        let mut tracker = tracker_with(&clock, 200);
        tracker.start_timer();
        run_ticks(&mut tracker, &clock, 5);
        assert_eq!(tracker.state(), SessionState::Idle);

        tracker.on_tab_active();
        assert_eq!(tracker.state(), SessionState::Running);
        assert_eq!(tracker.current_idle_time_ms(), 0);

        let reports = run_ticks(&mut tracker, &clock, 1);
        assert!(!reports[0].went_idle);
    }

    #[test]
    fn test_reset_zeroes_elapsed_regardless_of_state() {
        let clock = ManualClock::new();
        let mut tracker = tracker_with(&clock, 60_000);
        tracker.start_timer();
        clock.advance(800);

        tracker.reset();
        assert_eq!(tracker.time_in_ms(), 0);
        assert!(tracker.is_running());

        tracker.start_timer();
        clock.advance(150);
        assert_eq!(tracker.time_in_ms(), 150);
        assert_eq!(tracker.times()[0].start_ms, 800);
    }

    #[test]
    fn test_reset_keeps_registry_and_idle_flag() {
        let clock = ManualClock::new();
        let (_, callback) = counter();
        let mut tracker = tracker_with(&clock, 100);
        tracker.add_absolute_time_ellapsed_callback(AbsoluteTrigger::new(10_000, callback));
        tracker.start_timer();
        run_ticks(&mut tracker, &clock, 3);
        assert!(tracker.is_idle());

        tracker.reset();
        assert!(tracker.is_idle());
        assert_eq!(tracker.registry().len(), 1);
    }

    #[test]
    fn test_resume_opens_a_span() {
        let clock = ManualClock::new();
        let mut tracker = tracker_with(&clock, 60_000);
        tracker.start_timer();
        clock.advance(100);
        tracker.stop_timer();

        clock.advance(100);
        tracker.resume_timer();
        clock.advance(100);

        assert!(tracker.is_running());
        assert_eq!(tracker.time_in_ms(), 200);
    }

    #[test]
    fn test_strong_activity_forces_start() {
        let clock = ManualClock::new();
        let mut tracker = tracker_with(&clock, 60_000);
        assert_eq!(tracker.state(), SessionState::Stopped);

        tracker.handle_signal(Signal::Activity);
        assert_eq!(tracker.state(), SessionState::Stopped);

        tracker.handle_signal(Signal::StrongActivity);
        assert_eq!(tracker.state(), SessionState::Running);
    }

    #[test]
    fn test_ticks_are_inert_until_first_start() {
        let clock = ManualClock::new();
        let (count, callback) = counter();
        let mut tracker = tracker_with(&clock, 60_000);
        tracker.add_absolute_time_ellapsed_callback(AbsoluteTrigger::new(0, callback));

        run_ticks(&mut tracker, &clock, 5);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.current_idle_time_ms(), 0);

        tracker.start_timer();
        tracker.tick();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_callback_does_not_block_others() {
        let clock = ManualClock::new();
        let (count, callback) = counter();
        let mut tracker = tracker_with(&clock, 60_000);
        tracker.add_absolute_time_ellapsed_callback(AbsoluteTrigger::new(0, |_| {
            Err("absolute exploded".into())
        }));
        tracker.add_absolute_time_ellapsed_callback(AbsoluteTrigger::new(0, callback));
        tracker.add_time_interval_ellapsed_callback(IntervalTrigger::every(50, |_| {
            Err("interval exploded".into())
        }));
        tracker.start_timer();

        clock.advance(TICK_MS);
        let report = tracker.tick();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(report.fired(), 3);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].kind, CallbackKind::Absolute);
        assert_eq!(report.failures[0].index, 0);
        assert_eq!(report.failures[1].kind, CallbackKind::Interval);
        // Idle accounting still ran.
        assert_eq!(tracker.current_idle_time_ms(), TICK_MS);
        // Failed triggers are not retried.
        assert!(!tracker.registry().absolute_triggers()[0].is_pending());
    }

    #[test]
    fn test_failing_listener_is_reported() {
        let clock = ManualClock::new();
        let (count, callback) = counter();
        let mut tracker = tracker_with(&clock, 60_000);
        tracker.add_browser_tab_inactive_callback(TransitionListener::new(|_| {
            Err("listener exploded".into())
        }));
        tracker.add_browser_tab_inactive_callback(TransitionListener::new(callback));

        let failures = tracker.handle_signal(Signal::WindowInactive);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, CallbackKind::TabInactive);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_callbacks_are_isolated() {
        let clock = ManualClock::new();
        let (absolute, absolute_cb) = counter();
        let (interval, interval_cb) = counter();
        let (listener, listener_cb) = counter();
        let mut tracker = tracker_with(&clock, 60_000);
        tracker.add_absolute_time_ellapsed_callback(AbsoluteTrigger::new(0, |_| {
            panic!("absolute panicked")
        }));
        tracker.add_absolute_time_ellapsed_callback(AbsoluteTrigger::new(0, absolute_cb));
        tracker.add_time_interval_ellapsed_callback(IntervalTrigger::constant(0, |_| {
            panic!("interval panicked")
        }));
        tracker.add_time_interval_ellapsed_callback(IntervalTrigger::constant(0, interval_cb));
        tracker.add_browser_tab_inactive_callback(TransitionListener::new(|_| {
            panic!("listener panicked")
        }));
        tracker.add_browser_tab_inactive_callback(TransitionListener::new(listener_cb));
        tracker.start_timer();

        let reports = run_ticks(&mut tracker, &clock, 3);
        assert_eq!(reports[0].failures.len(), 2);
        assert_eq!(
            reports[0].failures[0].source.to_string(),
            "callback panicked: absolute panicked"
        );
        assert_eq!(reports[2].failures.len(), 1);
        assert_eq!(absolute.load(Ordering::SeqCst), 1);
        assert_eq!(interval.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.registry().absolute_triggers().len(), 2);
        assert_eq!(tracker.registry().interval_triggers().len(), 2);

        let failures = tracker.handle_signal(Signal::WindowInactive);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, CallbackKind::TabInactive);
        assert_eq!(listener.load(Ordering::SeqCst), 1);
        assert!(!tracker.is_running());
    }

    #[test]
    fn test_registration_from_inside_callback() {
        let clock = ManualClock::new();
        let (count, follow_up) = counter();
        let mut tracker = tracker_with(&clock, 60_000);
        let registrar = tracker.registrar();
        let mut follow_up = Some(follow_up);
        tracker.add_absolute_time_ellapsed_callback(AbsoluteTrigger::new(0, move |_| {
            if let Some(callback) = follow_up.take() {
                registrar.add_absolute_time_ellapsed_callback(AbsoluteTrigger::new(0, callback));
            }
            Ok(())
        }));
        tracker.start_timer();

        let first = tracker.tick();
        assert_eq!(first.absolute_fired, 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.registry().absolute_triggers().len(), 2);

        let second = tracker.tick();
        assert_eq!(second.absolute_fired, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_destroy_is_final() {
        let clock = ManualClock::new();
        let (count, callback) = counter();
        let (listener_count, listener) = counter();
        let mut tracker = tracker_with(&clock, 200);
        tracker.add_time_interval_ellapsed_callback(IntervalTrigger::constant(0, callback));
        tracker.add_browser_tab_active_callback(TransitionListener::new(listener));
        tracker.start_timer();
        clock.advance(100);

        tracker.destroy();
        let elapsed = tracker.time_in_ms();

        tracker.handle_signal(Signal::WindowActive);
        tracker.handle_signal(Signal::StrongActivity);
        tracker.handle_signal(Signal::WindowInactive);
        tracker.start_timer();
        tracker.reset();
        tracker.add_browser_tab_active_callback(TransitionListener::new(|_| Ok(())));
        let reports = run_ticks(&mut tracker, &clock, 10);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(listener_count.load(Ordering::SeqCst), 0);
        assert!(reports.iter().all(|r| r.fired() == 0 && !r.went_idle));
        assert_eq!(tracker.state(), SessionState::Destroyed);
        assert!(tracker.registry().is_empty());
        assert_eq!(tracker.times().len(), 1);
        assert_eq!(elapsed, 100);
        assert_eq!(tracker.time_in_ms(), elapsed);
    }
}
