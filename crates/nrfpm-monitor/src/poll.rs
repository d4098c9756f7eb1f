//! Deadline-bounded polling.
//!
//! Every wait in the session goes through [`poll_until`]: sleep for the poll
//! interval, try once, and give up when the deadline passes.

use std::time::Duration;

use crate::clock::Clock;

/// A point in time measured on a [`Clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    start: Duration,
    end: Duration,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(clock: &dyn Clock, timeout: Duration) -> Self {
        let start = clock.now();
        Deadline {
            start,
            end: start.saturating_add(timeout),
        }
    }

    /// When the deadline was set.
    pub fn start(&self) -> Duration {
        self.start
    }

    /// Time since the deadline was set.
    pub fn elapsed(&self, clock: &dyn Clock) -> Duration {
        clock.now().saturating_sub(self.start)
    }

    /// Time left before the deadline.
    pub fn remaining(&self, clock: &dyn Clock) -> Duration {
        self.end.saturating_sub(clock.now())
    }

    /// Whether the deadline has passed.
    pub fn expired(&self, clock: &dyn Clock) -> bool {
        clock.now() >= self.end
    }
}

/// Repeatedly sleep for `interval` then call `attempt`, until it yields a
/// value or `deadline` passes.
///
/// `attempt` is called at least once, even with an already expired deadline,
/// so a zero timeout behaves as a single non-blocking poll. Sleeps never run
/// past the deadline.
pub fn poll_until<T, E, F>(
    clock: &dyn Clock,
    deadline: Deadline,
    interval: Duration,
    mut attempt: F,
) -> Result<Option<T>, E>
where
    F: FnMut(&Deadline) -> Result<Option<T>, E>,
{
    loop {
        clock.sleep(interval.min(deadline.remaining(clock)));
        if let Some(value) = attempt(&deadline)? {
            return Ok(Some(value));
        }
        if deadline.expired(clock) {
            return Ok(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::convert::Infallible;

    #[test]
    fn test_returns_first_value() {
        let clock = ManualClock::new();
        let deadline = Deadline::after(&clock, Duration::from_secs(1));
        let mut calls = 0;
        let result: Result<_, Infallible> =
            poll_until(&clock, deadline, Duration::from_millis(10), |_| {
                calls += 1;
                Ok((calls == 3).then_some(calls))
            });
        assert_eq!(result, Ok(Some(3)));
        assert_eq!(clock.now(), Duration::from_millis(30));
    }

    #[test]
    fn test_gives_up_at_deadline() {
        let clock = ManualClock::new();
        let deadline = Deadline::after(&clock, Duration::from_millis(95));
        let mut calls = 0;
        let result: Result<Option<()>, Infallible> =
            poll_until(&clock, deadline, Duration::from_millis(10), |_| {
                calls += 1;
                Ok(None)
            });
        assert_eq!(result, Ok(None));
        assert_eq!(calls, 10);
        assert_eq!(clock.now(), Duration::from_millis(95));
    }

    #[test]
    fn test_zero_timeout_tries_once() {
        let clock = ManualClock::new();
        let deadline = Deadline::after(&clock, Duration::ZERO);
        let mut calls = 0;
        let result: Result<Option<()>, Infallible> =
            poll_until(&clock, deadline, Duration::from_millis(10), |_| {
                calls += 1;
                Ok(None)
            });
        assert_eq!(result, Ok(None));
        assert_eq!(calls, 1);
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn test_error_stops_polling() {
        let clock = ManualClock::new();
        let deadline = Deadline::after(&clock, Duration::from_secs(1));
        let result: Result<Option<()>, &str> =
            poll_until(&clock, deadline, Duration::ZERO, |_| Err("boom"));
        assert_eq!(result, Err("boom"));
    }

    #[test]
    fn test_deadline_accounting() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_secs(3));
        let deadline = Deadline::after(&clock, Duration::from_secs(5));
        clock.advance(Duration::from_secs(2));
        assert_eq!(deadline.start(), Duration::from_secs(3));
        assert_eq!(deadline.elapsed(&clock), Duration::from_secs(2));
        assert_eq!(deadline.remaining(&clock), Duration::from_secs(3));
        assert!(!deadline.expired(&clock));
        clock.advance(Duration::from_secs(3));
        assert!(deadline.expired(&clock));
        assert_eq!(deadline.remaining(&clock), Duration::ZERO);
    }
}
