//! Drop-intermediate throttle for display updates
//!
//! At most one value is released per interval. Values offered while the
//! interval is still running replace each other; only the latest one is
//! kept and released on the trailing edge. The throttle is a plain value
//! owned by one streaming session, so it needs no timers of its own: the
//! owner asks for [`Throttle::deadline`] and polls once it passes.

use std::time::Duration;
use tokio::time::Instant;

/// Rate limiter that keeps only the most recent pending value
///
/// # Examples
///
/// ```
/// use chatdeck::stream::Throttle;
/// use std::time::Duration;
/// use tokio::time::Instant;
///
/// let start = Instant::now();
/// let mut throttle = Throttle::new(Duration::from_millis(100));
/// assert_eq!(throttle.offer("a", start), Some("a"));
/// assert_eq!(throttle.offer("b", start + Duration::from_millis(10)), None);
/// assert_eq!(throttle.offer("c", start + Duration::from_millis(20)), None);
/// assert_eq!(throttle.poll_trailing(start + Duration::from_millis(100)), Some("c"));
/// ```
#[derive(Debug)]
pub struct Throttle<T> {
    interval: Duration,
    last_emit: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    /// Create a throttle with the given minimum interval between releases
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            pending: None,
        }
    }

    /// The configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Offer a value at `now`
    ///
    /// Returns the value if it may be emitted immediately (leading edge);
    /// otherwise stores it as the pending value, replacing any older one.
    pub fn offer(&mut self, value: T, now: Instant) -> Option<T> {
        let ready = match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };

        if ready {
            self.last_emit = Some(now);
            self.pending = None;
            Some(value)
        } else {
            self.pending = Some(value);
            None
        }
    }

    /// When the pending value becomes releasable, if there is one
    pub fn deadline(&self) -> Option<Instant> {
        match (&self.pending, self.last_emit) {
            (Some(_), Some(last)) => Some(last + self.interval),
            (Some(_), None) => Some(Instant::now()),
            _ => None,
        }
    }

    /// Release the pending value if its deadline has passed
    pub fn poll_trailing(&mut self, now: Instant) -> Option<T> {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.last_emit = Some(now);
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Whether a value is waiting for the trailing edge
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Discard the pending value
    ///
    /// Used when the owner is about to emit the final state itself.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take()
    }
}
