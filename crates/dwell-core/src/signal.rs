//! Abstract input signals and the sources that deliver them.
//!
//! The engine never talks to a windowing system directly. A host maps its
//! platform events onto [`Signal`] and pushes them through a
//! [`SignalSource`]; the driver holds the subscription for as long as the
//! engine lives.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::DwellError;

/// Signals the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// The window or tab became visible/focused.
    WindowActive,
    /// The window or tab was hidden or lost focus.
    WindowInactive,
    /// Coarse activity (scroll, resize, key, click, touch): resets idle time.
    Activity,
    /// Pointer movement: resets idle time and forces the timer on.
    StrongActivity,
    /// The pointer left the surface. Handled like [`Signal::WindowInactive`].
    LeftSurface,
}

/// The exact set of signals the driver subscribes to, and later unsubscribes from.
pub const SUBSCRIBED_SIGNALS: &[Signal] = &[
    Signal::WindowInactive,
    Signal::WindowActive,
    Signal::Activity,
    Signal::StrongActivity,
    Signal::LeftSurface,
];

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WindowActive => "window_active",
            Self::WindowInactive => "window_inactive",
            Self::Activity => "activity",
            Self::StrongActivity => "strong_activity",
            Self::LeftSurface => "left_surface",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Signal {
    type Err = UnknownSignal;

    /// Parses canonical names and browser event names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "window_active" | "focus" => Ok(Self::WindowActive),
            "window_inactive" | "blur" => Ok(Self::WindowInactive),
            "activity" | "scroll" | "resize" | "keyup" | "keydown" | "touchstart" | "click"
            | "contextmenu" => Ok(Self::Activity),
            "strong_activity" | "mousemove" => Ok(Self::StrongActivity),
            "left_surface" | "mouseleave" => Ok(Self::LeftSurface),
            _ => Err(UnknownSignal(s.to_string())),
        }
    }
}

impl Serialize for Signal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Signal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown signal names.
#[derive(Debug, Clone)]
pub struct UnknownSignal(String);

impl fmt::Display for UnknownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown signal: {}", self.0)
    }
}

impl std::error::Error for UnknownSignal {}

/// Sending half handed to a source on subscription.
pub type SignalSender = mpsc::UnboundedSender<Signal>;

/// Something that can deliver signals to the engine.
pub trait SignalSource: Send {
    /// Starts delivering `signals` into `sink`.
    fn subscribe(&mut self, signals: &[Signal], sink: SignalSender) -> Result<(), DwellError>;

    /// Stops delivering `signals`. Must tolerate signals that were never subscribed.
    fn unsubscribe(&mut self, signals: &[Signal]);
}

/// Scoped subscription. Dropping it unsubscribes the same signal set.
pub struct Subscription {
    source: Box<dyn SignalSource>,
    signals: &'static [Signal],
}

impl Subscription {
    /// Subscribes `source` to `signals`.
    ///
    /// If the source fails part-way, the guard is dropped before returning
    /// and whatever was subscribed is released again.
    pub fn acquire(
        source: Box<dyn SignalSource>,
        signals: &'static [Signal],
        sink: SignalSender,
    ) -> Result<Self, DwellError> {
        let mut subscription = Self { source, signals };
        subscription.source.subscribe(signals, sink)?;
        Ok(subscription)
    }

    pub const fn signals(&self) -> &'static [Signal] {
        self.signals
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        tracing::debug!(count = self.signals.len(), "releasing signal subscription");
        self.source.unsubscribe(self.signals);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("signals", &self.signals)
            .finish_non_exhaustive()
    }
}

/// In-process signal source.
///
/// Hosts clone the feed and call [`SignalFeed::emit`] from whatever produces
/// their input events. Signals emitted while nobody is subscribed to them
/// are dropped.
#[derive(Debug, Default)]
pub struct SignalFeed {
    state: Arc<Mutex<FeedState>>,
    /// Set on the clone that holds the subscription, so a rejected
    /// subscriber cannot release someone else's.
    owns_subscription: bool,
}

impl Clone for SignalFeed {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            owns_subscription: false,
        }
    }
}

#[derive(Debug, Default)]
struct FeedState {
    sink: Option<SignalSender>,
    subscribed: Vec<Signal>,
}

impl SignalFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `signal` to the subscriber. Returns `true` if it was delivered.
    pub fn emit(&self, signal: Signal) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.subscribed.contains(&signal) {
            return false;
        }
        state
            .sink
            .as_ref()
            .is_some_and(|sink| sink.send(signal).is_ok())
    }

    /// Signals currently subscribed.
    pub fn subscribed(&self) -> Vec<Signal> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribed
            .clone()
    }

    pub fn is_attached(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sink
            .is_some()
    }
}

impl SignalSource for SignalFeed {
    fn subscribe(&mut self, signals: &[Signal], sink: SignalSender) -> Result<(), DwellError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.sink.is_some() {
            return Err(DwellError::Subscribe(
                "feed already has a subscriber".to_string(),
            ));
        }
        state.sink = Some(sink);
        state.subscribed = signals.to_vec();
        self.owns_subscription = true;
        Ok(())
    }

    fn unsubscribe(&mut self, signals: &[Signal]) {
        if !self.owns_subscription {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.subscribed.retain(|signal| !signals.contains(signal));
        if state.subscribed.is_empty() {
            state.sink = None;
            self.owns_subscription = false;
        }
    }
}
