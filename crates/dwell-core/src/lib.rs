//! Dwell-time engine.
//!
//! Measures how long a user actively engages with a view and fires
//! callbacks at elapsed-time thresholds:
//! - Ledger: active time as a sequence of start/stop spans
//! - Idle detection: auto-pause after a period without activity signals
//! - Visibility: pause/resume when the view goes to the background
//! - Triggers: one-shot (absolute) and repeating (interval) callbacks,
//!   evaluated on a fixed tick

mod clock;
mod config;
mod driver;
mod error;
pub mod idle;
pub mod ledger;
pub mod registry;
pub mod signal;
mod tracker;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{DEFAULT_CHECK_CALLBACKS_INTERVAL_MS, DEFAULT_IDLE_TIMEOUT_MS, DwellConfig};
pub use driver::{DwellDriver, DwellHandle};
pub use error::{
    BoxError, CallbackFailure, CallbackKind, CallbackPanic, CallbackResult, DwellError,
};
pub use ledger::TimeSpan;
pub use registry::{AbsoluteTrigger, IntervalTrigger, Registrar, TransitionListener};
pub use signal::{SUBSCRIBED_SIGNALS, Signal, SignalFeed, SignalSource, UnknownSignal};
pub use tracker::{DwellTracker, DwellTrackerBuilder, SessionState, TickReport};
