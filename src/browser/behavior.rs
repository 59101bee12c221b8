//! Driver-level interaction simulation: pointer drift and progressive
//! scrolling with human-scale pacing.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::browser::driver::PageDriver;
use crate::error::FetchError;

/// Nudge the pointer to a random spot near the top-left of the viewport,
/// then idle briefly.
pub async fn pointer_drift(driver: &dyn PageDriver) -> Result<(), FetchError> {
    let (x, y, pause_ms) = {
        let mut rng = rand::thread_rng();
        (
            rng.gen_range(0..100),
            rng.gen_range(0..100),
            rng.gen_range(500..1000),
        )
    };

    driver.move_pointer(x, y).await?;
    sleep(Duration::from_millis(pause_ms)).await;

    Ok(())
}

/// Scroll down the page in randomized chunks with pauses between them.
pub async fn natural_scroll(driver: &dyn PageDriver) -> Result<(), FetchError> {
    // Plan the whole gesture up front so no RNG handle lives across awaits.
    let (chunks, smooth) = {
        let mut rng = rand::thread_rng();
        let total: i64 = rng.gen_range(100..800);
        let mut chunks = Vec::new();
        let mut scrolled = 0;
        while scrolled < total {
            let chunk = rng.gen_range(100..300).min(total - scrolled);
            scrolled += chunk;
            chunks.push((chunk, rng.gen_range(300..800u64)));
        }
        (chunks, rng.gen_bool(0.7))
    };

    let total: i64 = chunks.iter().map(|(chunk, _)| chunk).sum();
    for (chunk, pause_ms) in chunks {
        driver.scroll_by(chunk, smooth).await?;
        sleep(Duration::from_millis(pause_ms)).await;
    }

    debug!("Scrolled {} pixels", total);

    Ok(())
}
