use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

struct WindowState {
    window_start: Instant,
    admitted: u32,
}

/// Process-wide pacing gate: at most `quota` admissions per rolling window.
///
/// The state mutex is held across the window wait, so callers queue behind
/// the sleeper and are admitted in arrival order once the window rolls over.
pub struct RateLimiter {
    quota: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    pub fn new(quota: u32, window: Duration) -> Self {
        Self {
            quota: quota.max(1),
            window,
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                admitted: 0,
            }),
        }
    }

    /// Wait until the current window has capacity, then take a slot.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        loop {
            let elapsed = state.window_start.elapsed();
            if elapsed >= self.window {
                state.window_start = Instant::now();
                state.admitted = 0;
            }

            if state.admitted < self.quota {
                state.admitted += 1;
                return;
            }

            let wait = self.window - elapsed;
            debug!("Rate limit reached, waiting {:?} for the next window", wait);
            sleep(wait).await;
        }
    }
}
