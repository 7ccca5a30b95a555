//! Tokio scheduler for a [`DwellTracker`].
//!
//! One task owns the schedule: it waits on the shutdown channel, the signal
//! feed and the tick interval, and handles whichever is ready first. Ticks
//! and signals therefore never overlap and run to completion in delivery
//! order.
//!
//! # Thread Safety
//!
//! The tracker lives behind a `std::sync::Mutex` shared between the task and
//! every [`DwellHandle`]. The lock is only held for the duration of one
//! synchronous operation, never across an `.await`. Callbacks run while the
//! lock is held, so they must not call back into a `DwellHandle`; use
//! [`DwellHandle::registrar`] to register from inside a callback.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{CallbackFailure, DwellError};
use crate::ledger::TimeSpan;
use crate::registry::{AbsoluteTrigger, IntervalTrigger, Registrar, TransitionListener};
use crate::signal::{SUBSCRIBED_SIGNALS, Signal, SignalSource, Subscription};
use crate::tracker::{DwellTracker, SessionState, TickReport};

/// What a running schedule holds on to until teardown.
#[derive(Debug, Default)]
struct Attachment {
    subscription: Option<Subscription>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Attachment {
    /// Unsubscribes, cancels the schedule and reports whether anything was attached.
    fn release(self) -> bool {
        let attached = self.task.is_some();
        drop(self.subscription);
        if let Some(shutdown) = self.shutdown {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task {
            task.abort();
        }
        attached
    }
}

/// Cloneable, explicitly passed handle to one tracker.
///
/// Every clone shares the same tracker and, once a [`DwellDriver`] is
/// running, the same schedule: [`destroy`](Self::destroy) through any clone
/// tears all of it down.
#[derive(Debug, Clone)]
pub struct DwellHandle {
    tracker: Arc<Mutex<DwellTracker>>,
    attachment: Arc<Mutex<Attachment>>,
}

impl DwellHandle {
    pub fn new(tracker: DwellTracker) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(tracker)),
            attachment: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DwellTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attachment(&self) -> MutexGuard<'_, Attachment> {
        self.attachment.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the tracker.
    pub fn with<R>(&self, f: impl FnOnce(&mut DwellTracker) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn start_timer(&self) {
        self.lock().start_timer();
    }

    pub fn stop_timer(&self) {
        self.lock().stop_timer();
    }

    pub fn resume_timer(&self) {
        self.lock().resume_timer();
    }

    pub fn reset_idle_time(&self) {
        self.lock().reset_idle_time();
    }

    pub fn reset_idle_time_with_start_timer(&self) {
        self.lock().reset_idle_time_with_start_timer();
    }

    pub fn time_in_ms(&self) -> u64 {
        self.lock().time_in_ms()
    }

    pub fn times(&self) -> Vec<TimeSpan> {
        self.lock().times().to_vec()
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state()
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().is_destroyed()
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Destroys the tracker, then synchronously cancels the tick schedule and
    /// releases the signal subscription, if a driver is running.
    ///
    /// The open span is closed, so elapsed time freezes at its current value.
    pub fn destroy(&self) {
        self.lock().destroy();
        let attachment = std::mem::take(&mut *self.attachment());
        if attachment.release() {
            tracing::info!("dwell driver stopped");
        }
    }

    pub fn add_time_interval_ellapsed_callback(&self, trigger: IntervalTrigger) {
        self.lock().add_time_interval_ellapsed_callback(trigger);
    }

    pub fn add_absolute_time_ellapsed_callback(&self, trigger: AbsoluteTrigger) {
        self.lock().add_absolute_time_ellapsed_callback(trigger);
    }

    pub fn add_browser_tab_active_callback(&self, listener: TransitionListener) {
        self.lock().add_browser_tab_active_callback(listener);
    }

    pub fn add_browser_tab_inactive_callback(&self, listener: TransitionListener) {
        self.lock().add_browser_tab_inactive_callback(listener);
    }

    pub fn registrar(&self) -> Registrar {
        self.lock().registrar()
    }

    pub fn handle_signal(&self, signal: Signal) -> Vec<CallbackFailure> {
        self.lock().handle_signal(signal)
    }

    pub fn tick(&self) -> TickReport {
        self.lock().tick()
    }
}

/// Runs a tracker's tick schedule and signal subscription on a tokio task.
///
/// Dropping the driver destroys the tracker.
#[derive(Debug)]
pub struct DwellDriver {
    handle: DwellHandle,
}

impl DwellDriver {
    /// Subscribes to `source` and starts the schedule.
    ///
    /// Must be called from within a tokio runtime. Ticks stay inert until
    /// the tracker is first started.
    pub fn spawn<S>(tracker: DwellTracker, source: S) -> Result<Self, DwellError>
    where
        S: SignalSource + 'static,
    {
        let period = tracker.config().tick_period();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let subscription = Subscription::acquire(Box::new(source), SUBSCRIBED_SIGNALS, signal_tx)?;

        let handle = DwellHandle::new(tracker);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_schedule(
            Arc::clone(&handle.tracker),
            signal_rx,
            shutdown_rx,
            period,
        ));
        *handle.attachment() = Attachment {
            subscription: Some(subscription),
            shutdown: Some(shutdown_tx),
            task: Some(task),
        };

        tracing::info!(
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "dwell driver started"
        );
        Ok(Self { handle })
    }

    pub fn handle(&self) -> DwellHandle {
        self.handle.clone()
    }

    /// Stops the schedule and releases the signal subscription.
    ///
    /// Synchronous: once this returns, no signal or tick reaches the tracker.
    /// Same as [`DwellHandle::destroy`] on any clone of the handle.
    pub fn destroy(&mut self) {
        self.handle.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.handle.is_destroyed()
    }
}

impl Drop for DwellDriver {
    fn drop(&mut self) {
        self.destroy();
    }
}

async fn run_schedule(
    tracker: Arc<Mutex<DwellTracker>>,
    mut signals: mpsc::UnboundedReceiver<Signal>,
    mut shutdown: oneshot::Receiver<()>,
    period: Duration,
) {
    let lock = || tracker.lock().unwrap_or_else(PoisonError::into_inner);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut signals_open = true;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            signal = signals.recv(), if signals_open => match signal {
                Some(signal) => {
                    lock().handle_signal(signal);
                }
                None => {
                    tracing::debug!("signal feed closed, ticking only");
                    signals_open = false;
                }
            },
            _ = ticker.tick() => {
                let mut tracker = lock();
                if tracker.is_destroyed() {
                    break;
                }
                tracker.tick();
            }
        }
    }

    tracing::debug!("dwell schedule finished");
}
