// ====================================================================================
// src/ratelimit.rs - 入口请求限流
// ====================================================================================
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

struct Window {
    started: Instant,
    count: u32,
}

// 固定窗口计数，上限为 0 表示不限流
pub struct IngressLimiter {
    limit: u32,
    window: Duration,
    current: Mutex<Window>,
}

impl IngressLimiter {
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            current: Mutex::new(Window { started: Instant::now(), count: 0 }),
        }
    }

    pub async fn try_acquire(&self) -> bool {
        if self.limit == 0 {
            return true;
        }
        let mut current = self.current.lock().await;
        let now = Instant::now();
        if now.duration_since(current.started) >= self.window {
            *current = Window { started: now, count: 0 };
        }
        if current.count >= self.limit {
            return false;
        }
        current.count += 1;
        true
    }
}
