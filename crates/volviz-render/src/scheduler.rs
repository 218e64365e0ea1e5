//! Periodic redraw scheduling.
//!
//! The host drives its event loop however it likes; this type only answers
//! "is a redraw due yet". Firing is edge-triggered: a due tick records the
//! fire time, so the next tick is due one interval later regardless of how
//! late the host polled.

use std::time::{Duration, Instant};

/// Default redraw interval, roughly 60 Hz.
pub const DEFAULT_REDRAW_INTERVAL: Duration = Duration::from_millis(16);

/// Decides when the host should request another frame.
#[derive(Debug, Clone)]
pub struct RedrawScheduler {
    interval: Duration,
    running: bool,
    last_fire: Option<Instant>,
}

impl RedrawScheduler {
    /// Creates a stopped scheduler with the given interval.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: false,
            last_fire: None,
        }
    }

    /// Starts firing. The first tick after a start is immediately due.
    pub fn start(&mut self) {
        self.running = true;
        self.last_fire = None;
    }

    /// Stops firing until the next `start`.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether the scheduler is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The configured interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Reconfigures the interval without disturbing the running state.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Checks whether a redraw is due as of `now`, recording the fire.
    pub fn due_at(&mut self, now: Instant) -> bool {
        if !self.running {
            return false;
        }
        let due = match self.last_fire {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if due {
            self.last_fire = Some(now);
        }
        due
    }

    /// Checks whether a redraw is due right now.
    pub fn tick(&mut self) -> bool {
        self.due_at(Instant::now())
    }
}

impl Default for RedrawScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_REDRAW_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_scheduler_never_fires() {
        let mut s = RedrawScheduler::default();
        assert!(!s.due_at(Instant::now()));
    }

    #[test]
    fn test_first_tick_after_start_fires() {
        let mut s = RedrawScheduler::default();
        s.start();
        assert!(s.due_at(Instant::now()));
    }

    #[test]
    fn test_fires_once_per_interval() {
        let mut s = RedrawScheduler::new(Duration::from_millis(10));
        s.start();
        let t0 = Instant::now();
        assert!(s.due_at(t0));
        assert!(!s.due_at(t0 + Duration::from_millis(5)));
        assert!(s.due_at(t0 + Duration::from_millis(10)));
        assert!(!s.due_at(t0 + Duration::from_millis(12)));
    }

    #[test]
    fn test_stop_suppresses_pending_fire() {
        let mut s = RedrawScheduler::new(Duration::from_millis(10));
        s.start();
        let t0 = Instant::now();
        assert!(s.due_at(t0));
        s.stop();
        assert!(!s.due_at(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_restart_fires_immediately() {
        let mut s = RedrawScheduler::new(Duration::from_millis(10));
        s.start();
        let t0 = Instant::now();
        assert!(s.due_at(t0));
        s.stop();
        s.start();
        assert!(s.due_at(t0 + Duration::from_millis(1)));
    }
}
