//! Monotonic deadlines for blocking socket operations.

use std::time::{Duration, Instant};

/// The default deadline applied to blocking operations when the caller does
/// not supply one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A deadline on the monotonic clock, with an "infinite" sentinel.
///
/// Every blocking operation in this crate takes a `Timeout`. Because the
/// deadline is absolute, a single `Timeout` can be threaded through a retry
/// loop without extending the total wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timeout(Option<Instant>);

impl Timeout {
    /// A timeout that never passes.
    pub const INFINITE: Timeout = Timeout(None);

    /// A deadline `duration` from now.
    pub fn new(duration: Duration) -> Timeout {
        Timeout(Instant::now().checked_add(duration))
    }

    /// A deadline at a specific instant.
    pub fn at(instant: Instant) -> Timeout {
        Timeout(Some(instant))
    }

    /// Whether this timeout is the infinite sentinel.
    pub fn is_infinite(&self) -> bool {
        self.0.is_none()
    }

    /// Whether the deadline is in the past. Never true for the infinite
    /// timeout.
    pub fn has_passed(&self) -> bool {
        match self.0 {
            Some(deadline) => deadline <= Instant::now(),
            None => false,
        }
    }

    /// Time remaining until the deadline; zero if passed, `None` if
    /// infinite.
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Convert to the millisecond convention of `poll`: `-1` for infinite,
    /// `0` for an expired deadline, otherwise the remaining milliseconds.
    pub fn as_poll_ms(&self) -> i32 {
        match self.remaining() {
            None => -1,
            Some(rem) => {
                // Saturate rather than wrap for far-future deadlines.
                let ms = rem.as_millis();
                if ms > i32::MAX as u128 {
                    i32::MAX
                } else {
                    ms as i32
                }
            }
        }
    }
}

impl Default for Timeout {
    fn default() -> Timeout {
        Timeout::INFINITE
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Timeout {
        Timeout::new(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_never_passes() {
        assert!(!Timeout::INFINITE.has_passed());
        assert_eq!(Timeout::INFINITE.as_poll_ms(), -1);
        assert_eq!(Timeout::INFINITE.remaining(), None);
    }

    #[test]
    fn expired_is_zero() {
        let t = Timeout::at(Instant::now() - Duration::from_secs(1));
        assert!(t.has_passed());
        assert_eq!(t.as_poll_ms(), 0);
        assert_eq!(t.remaining(), Some(Duration::from_secs(0)));
    }

    #[test]
    fn future_deadline_counts_down() {
        let t = Timeout::new(Duration::from_secs(10));
        assert!(!t.has_passed());
        let ms = t.as_poll_ms();
        assert!(ms > 8_000 && ms <= 10_000, "ms = {}", ms);
    }

    #[test]
    fn far_future_saturates() {
        let t = Timeout::new(Duration::from_secs(1 << 40));
        assert_eq!(t.as_poll_ms(), i32::MAX);
    }
}
