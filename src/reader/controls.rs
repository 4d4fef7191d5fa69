use std::time::Duration;
use tokio::time::Instant;

pub const HIDE_AFTER: Duration = Duration::from_secs(3);

/// Auto-hiding reader controls. At most one hide deadline is armed; every
/// interaction replaces it.
#[derive(Debug, Clone)]
pub struct Controls {
    visible: bool,
    deadline: Option<Instant>,
    hide_after: Duration,
}

impl Controls {
    pub fn new(now: Instant) -> Self {
        Controls::with_delay(now, HIDE_AFTER)
    }

    pub fn with_delay(now: Instant, hide_after: Duration) -> Self {
        Controls {
            visible: true,
            deadline: Some(now + hide_after),
            hide_after,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn interact(&mut self, now: Instant) {
        self.visible = true;
        self.deadline = Some(now + self.hide_after);
    }

    /// Hides the controls once the deadline has passed. Returns true when the
    /// visibility changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                let changed = self.visible;
                self.visible = false;
                changed
            }
            _ => false,
        }
    }
}
