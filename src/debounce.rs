//! Coalescing of rapid repeated calls.
//!
//! A [`Debouncer`] holds at most one pending call. Each new call replaces the
//! pending arguments and restarts the quiet window; the call fires once the
//! window passes without another call. The caller drives time: it asks for
//! [`Debouncer::deadline`] to know how long to sleep and calls
//! [`Debouncer::poll`] when it wakes up.

use std::time::{Duration, Instant};

/// Default quiet window before a document is rebuilt.
pub const DEFAULT_WAIT: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct Debouncer<T> {
    wait: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT)
    }
}

impl<T> Debouncer<T> {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            pending: None,
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Schedule `args`, dropping whatever was pending.
    pub fn call(&mut self, args: T, now: Instant) {
        self.pending = Some((now + self.wait, args));
    }

    /// When the pending call becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending arguments if their quiet window has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if *deadline <= now => self.pending.take().map(|(_, args)| args),
            _ => None,
        }
    }

    /// Take the pending arguments regardless of the deadline.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(_, args)| args)
    }
}
