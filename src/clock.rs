//! # Microsecond Clock
//!
//! The control loop measures time with a free-running 32-bit microsecond
//! counter, the same width a microcontroller `micros()` counter has. The
//! counter wraps roughly every 71 minutes; every comparison in this crate is
//! made on the wrapping difference between two readings, never on absolute
//! values, so wraparound is harmless as long as a single interval stays below
//! `u32::MAX` microseconds.

use std::time::Instant;

/// Microsecond timestamp or duration on the wrapping 32-bit counter.
pub type Micros = u32;

/// Microseconds elapsed from `since` to `now`, correct across wraparound.
#[inline]
#[must_use]
pub fn elapsed(now: Micros, since: Micros) -> Micros {
    now.wrapping_sub(since)
}

/// A restartable stopwatch on the microsecond counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    start: Micros,
}

impl Timer {
    /// Create a timer started at `now`.
    #[must_use]
    pub fn started_at(now: Micros) -> Self {
        Self { start: now }
    }

    /// Restart the timer at `now`.
    #[inline]
    pub fn restart(&mut self, now: Micros) {
        self.start = now;
    }

    /// Microseconds since the last restart.
    #[inline]
    #[must_use]
    pub fn elapsed(&self, now: Micros) -> Micros {
        elapsed(now, self.start)
    }

    /// Restart the timer and return `true` once `period` has elapsed.
    pub fn check(&mut self, now: Micros, period: Micros) -> bool {
        if self.elapsed(now) >= period {
            self.restart(now);
            return true;
        }
        false
    }
}

/// Host clock producing wrapping microsecond readings.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Current counter value. Truncation to 32 bits is the wraparound.
    #[must_use]
    pub fn now(&self) -> Micros {
        self.origin.elapsed().as_micros() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_simple() {
        assert_eq!(elapsed(1_500, 500), 1_000);
        assert_eq!(elapsed(500, 500), 0);
    }

    #[test]
    fn test_elapsed_across_wraparound() {
        let since = u32::MAX - 99;
        let now = 400;
        assert_eq!(elapsed(now, since), 500);
    }

    #[test]
    fn test_timer_check_restarts_on_expiry() {
        let mut timer = Timer::started_at(0);
        assert!(!timer.check(999, 1_000));
        assert!(timer.check(1_000, 1_000));
        assert_eq!(timer.elapsed(1_000), 0);
        assert_eq!(timer.elapsed(1_250), 250);
    }

    #[test]
    fn test_timer_check_across_wraparound() {
        let mut timer = Timer::started_at(u32::MAX - 10);
        assert!(!timer.check(5, 100));
        assert!(timer.check(89, 100));
    }

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = clock.now();
        assert!(elapsed(b, a) >= 1_000);
    }
}
