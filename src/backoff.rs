// ====================================================================================
// src/backoff.rs - 限流退避
// ====================================================================================
use crate::config::Config;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

// 限流后的“在此之前不写入”截止时间，不持久化，重启后即解除
pub struct BackoffGovernor {
    resume_at: Mutex<Option<Instant>>,
}

impl BackoffGovernor {
    pub fn new() -> Self {
        Self { resume_at: Mutex::new(None) }
    }

    pub async fn is_blocked(&self) -> bool {
        match *self.resume_at.lock().await {
            Some(deadline) => Instant::now() < deadline,
            None => false,
        }
    }

    // 直接覆盖截止时间，不与旧值取最大
    pub async fn extend(&self, wait: Duration) -> Instant {
        let deadline = Instant::now() + wait;
        *self.resume_at.lock().await = Some(deadline);
        deadline
    }

    pub async fn clear(&self) {
        *self.resume_at.lock().await = None;
    }

    pub async fn resume_at(&self) -> Option<Instant> {
        *self.resume_at.lock().await
    }
}

impl Default for BackoffGovernor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
    pub cooldown: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_attempts: config.retry_max_attempts,
            cooldown: Duration::from_secs(config.retry_cooldown_seconds),
        }
    }

    // 取指数延迟与平台提示中较长者
    pub fn wait_for(&self, delay: Duration, retry_after: Option<Duration>) -> Duration {
        retry_after.map_or(delay, |hint| hint.max(delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_attempts: 4,
            cooldown: Duration::from_secs(60),
        }
    }
}
