pub mod logging;
pub mod retry;

pub use logging::init_logging;
pub use retry::with_retry;

use rand::Rng;
use std::time::Duration;

/// Sleep for a random duration in [min_ms, max_ms].
pub async fn random_wait(min_ms: u64, max_ms: u64) {
    let wait_ms = {
        let mut rng = rand::thread_rng();
        rng.gen_range(min_ms..=max_ms)
    };
    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
}
