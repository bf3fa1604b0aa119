use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Tops the semaphore back up to `rate` permits once per second. Workers
/// consume one permit per iteration.
pub(crate) fn spawn_fixed_rate_controller(limiter: Arc<Semaphore>, rate: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let rate_per_sec = usize::try_from(rate)
            .unwrap_or(usize::MAX)
            .min(Semaphore::MAX_PERMITS);
        let mut rate_tick = interval(Duration::from_secs(1));
        loop {
            rate_tick.tick().await;
            let available = limiter.available_permits();
            if available < rate_per_sec {
                limiter.add_permits(rate_per_sec.saturating_sub(available));
            }
        }
    })
}
