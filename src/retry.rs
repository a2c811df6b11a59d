//! Retry on rate limiting
//!
//! Only `CountError::RateLimited` is retried. The identical call is repeated
//! after a delay that grows by `multiplier` up to `max_delay`.

use crate::error::CountError;
use crate::provider::{AssetSource, Scope};
use std::time::Duration;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_RETRIES: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// `None` retries forever
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_RETRY_DELAY,
            multiplier: 2.0,
            max_delay: DEFAULT_MAX_DELAY,
            max_retries: Some(DEFAULT_MAX_RETRIES),
        }
    }
}

impl RetryPolicy {
    /// Same delay every time, never give up
    pub fn fixed_forever(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            max_retries: None,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let secs = self.base_delay.as_secs_f64() * factor;
        let cap = self.max_delay.max(self.base_delay);
        if !secs.is_finite() || secs >= cap.as_secs_f64() {
            cap
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    pub fn allows(&self, retry: u32) -> bool {
        self.max_retries.map_or(true, |max| retry <= max)
    }
}

/// Count assets, sleeping and retrying while the source is rate limited
pub async fn count_with_retry(
    source: &dyn AssetSource,
    scope: &Scope,
    asset_type: &str,
    policy: &RetryPolicy,
) -> Result<usize, CountError> {
    let mut retry: u32 = 0;
    loop {
        match source.count_assets(scope, asset_type).await {
            Err(err) if err.is_rate_limited() => {
                retry = retry.saturating_add(1);
                if !policy.allows(retry) {
                    tracing::error!(
                        "Giving up on {} - {} after {} retries",
                        scope,
                        asset_type,
                        retry - 1
                    );
                    return Err(err);
                }
                let delay = policy.delay_for(retry);
                tracing::warn!(
                    "Rate limit exceeded for {} - {}, waiting {:?} before retry {}",
                    scope,
                    asset_type,
                    delay,
                    retry
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}
