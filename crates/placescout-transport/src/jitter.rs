use rand::Rng;
use std::time::Duration;

/// Randomized pause after a scroll so the page can load the next batch.
#[derive(Debug, Clone, Copy)]
pub struct SettleDelay {
    min_ms: u64,
    max_ms: u64,
}

impl SettleDelay {
    /// Bounds are swapped if given in the wrong order.
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
        }
    }

    /// Draw one delay from `min_ms..=max_ms`.
    pub fn sample(&self) -> Duration {
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }

    /// Sleep for one sampled delay.
    pub async fn wait(&self) {
        tokio::time::sleep(self.sample()).await;
    }
}
