//! The housekeeping countdown timer.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::time::{Clock, SystemClock};

/// Monotonic interval gate for periodic housekeeping.
///
/// The timer is ready when more than its interval has elapsed since it was
/// last touched, and before it has ever been touched. It gates housekeeping
/// only; no correctness depends on it.
pub struct CountdownTimer {
    clock: Arc<dyn Clock>,
    interval: Duration,
    last_touch: Option<Instant>,
}

impl std::fmt::Debug for CountdownTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownTimer")
            .field("interval", &self.interval)
            .field("last_touch", &self.last_touch)
            .finish()
    }
}

impl CountdownTimer {
    /// Creates a timer over the system clock.
    pub fn new(interval: Duration) -> CountdownTimer {
        Self::with_clock(interval, Arc::new(SystemClock))
    }

    /// Creates a timer over a custom clock for testing.
    pub fn with_clock(interval: Duration, clock: Arc<dyn Clock>) -> CountdownTimer {
        CountdownTimer {
            clock,
            interval,
            last_touch: None,
        }
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the interval has elapsed since the last touch.
    pub fn is_ready(&self) -> bool {
        match self.last_touch {
            None => true,
            Some(last) => self.clock.now().duration_since(last) > self.interval,
        }
    }

    /// Restarts the countdown from now.
    pub fn touch(&mut self) {
        self.last_touch = Some(self.clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Clock advanced by hand.
    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Arc<ManualClock> {
            Arc::new(ManualClock {
                now: Mutex::new(Instant::now()),
            })
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    #[test]
    fn test_untouched_timer_is_ready() {
        let timer = CountdownTimer::new(Duration::from_millis(100));
        assert!(timer.is_ready());
    }

    #[test]
    fn test_touch_restarts_the_countdown() {
        let clock = ManualClock::new();
        let mut timer =
            CountdownTimer::with_clock(Duration::from_millis(100), Arc::clone(&clock) as Arc<dyn Clock>);
        timer.touch();
        assert!(!timer.is_ready());

        clock.advance(Duration::from_millis(50));
        assert!(!timer.is_ready());

        clock.advance(Duration::from_millis(51));
        assert!(timer.is_ready());

        timer.touch();
        assert!(!timer.is_ready());
    }
}
