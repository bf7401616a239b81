use std::time::Duration;

use tokio::time::Instant;

/// Frame-rate limiter for one consumer of the camera
///
/// Pacing happens before a frame slot is taken, so a throttled stream holds
/// no slot while it waits.
pub struct Pacer {
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl Pacer {
    pub const fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Wait until the next frame is due; the first call returns at once
    pub async fn wait(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };

        let now = Instant::now();
        let due = self.next_due.map_or(now, |t| t.max(now));
        self.next_due = Some(due + interval);
        if due > now {
            tokio::time::sleep_until(due).await;
        }
    }
}
