// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Liveness probing: the server pings an idle
//! connection every [`PROBE_INTERVAL`] and closes it if no reply lands
//! within [`ALIVE_TIMEOUT`]. Kept as a pure function of [`Instant`] values
//! rather than real sleeps so it's testable by advancing a clock by hand.

use std::time::{Duration, Instant};

/// How often the server probes an idle connection with `ARE_U_ALIVE`.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(5);
/// How long the server waits for `I_AM_ALIVE` before giving up.
pub const ALIVE_TIMEOUT: Duration = Duration::from_secs(7);

/// What a connection's driving loop should do after a liveness tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessAction {
    /// Nothing due yet.
    Idle,
    /// Send `ARE_U_ALIVE` and record it as the latest probe.
    SendProbe,
    /// No reply arrived within the timeout; close the connection.
    Close,
}

/// Tracks one connection's last-seen-alive instant and last-probe instant.
pub struct LivenessTracker {
    last_alive: Instant,
    last_probe: Instant,
}

impl LivenessTracker {
    /// Start tracking a freshly-established connection as alive at `now`.
    #[must_use]
    pub const fn new(now: Instant) -> Self {
        Self {
            last_alive: now,
            last_probe: now,
        }
    }

    /// Record that the peer replied (`I_AM_ALIVE`) at `now`.
    pub fn on_alive(&mut self, now: Instant) {
        self.last_alive = now;
    }

    /// Evaluate what should happen at `now`. Call this on every tick of
    /// the owning loop's probe interval.
    pub fn tick(&mut self, now: Instant) -> LivenessAction {
        if now.duration_since(self.last_alive) > ALIVE_TIMEOUT {
            return LivenessAction::Close;
        }
        if now.duration_since(self.last_probe) >= PROBE_INTERVAL {
            self.last_probe = now;
            return LivenessAction::SendProbe;
        }
        LivenessAction::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_before_the_probe_interval() {
        let now = Instant::now();
        let mut tracker = LivenessTracker::new(now);
        assert_eq!(tracker.tick(now + Duration::from_secs(1)), LivenessAction::Idle);
    }

    #[test]
    fn probes_once_the_interval_elapses() {
        let now = Instant::now();
        let mut tracker = LivenessTracker::new(now);
        assert_eq!(tracker.tick(now + PROBE_INTERVAL), LivenessAction::SendProbe);
    }

    #[test]
    fn alive_reply_resets_the_timeout_clock() {
        let now = Instant::now();
        let mut tracker = LivenessTracker::new(now);
        tracker.on_alive(now + Duration::from_secs(6));
        assert_eq!(
            tracker.tick(now + Duration::from_secs(12)),
            LivenessAction::Idle
        );
    }

    #[test]
    fn closes_after_the_timeout_with_no_reply() {
        let now = Instant::now();
        let mut tracker = LivenessTracker::new(now);
        assert_eq!(
            tracker.tick(now + ALIVE_TIMEOUT + Duration::from_millis(1)),
            LivenessAction::Close
        );
    }
}
