use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Cooldown category used by the draw command
pub const DRAWING: &str = "drawing";

/// Default minimum spacing between two draws of the same writer
pub const DEFAULT_DRAW_COOLDOWN: Duration = Duration::from_secs(35);

/// Outcome of checking a writer against its cooldown window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    Allowed,
    Wait { retry_after: Duration },
}

impl CooldownDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, CooldownDecision::Allowed)
    }
}

/// Fixed cooldown window.
///
/// Pure decision logic: it never records anything, callers persist the new
/// timestamp themselves once the action went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    window: Duration,
}

impl Cooldown {
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide whether an action at `now` may proceed given the last accepted one.
    ///
    /// No previous action means the first one is free. A stored timestamp in
    /// the future (clock skew) pushes the window out accordingly.
    pub fn check(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CooldownDecision {
        let Some(last) = last else {
            return CooldownDecision::Allowed;
        };
        let window = TimeDelta::from_std(self.window).unwrap_or(TimeDelta::MAX);
        let Some(ready_at) = last.checked_add_signed(window) else {
            return CooldownDecision::Wait {
                retry_after: self.window,
            };
        };

        if now >= ready_at {
            CooldownDecision::Allowed
        } else {
            let retry_after = (ready_at - now).to_std().unwrap_or(self.window);
            CooldownDecision::Wait { retry_after }
        }
    }
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new(DEFAULT_DRAW_COOLDOWN)
    }
}
