// ====================================================================================
// src/store.rs - 待发布状态存储
// ====================================================================================
use crate::models::{PendingUpdate, RoomUpdate};
use tokio::sync::Mutex;
use tokio::time::Instant;

struct PendingSlot {
    value: Option<PendingUpdate>,
    next_seq: u64,
}

pub struct StateStore {
    pending: Mutex<PendingSlot>,
    last_success: Mutex<Option<Instant>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(PendingSlot { value: None, next_seq: 0 }),
            last_success: Mutex::new(None),
        }
    }

    // 无条件覆盖，后到者生效
    pub async fn set(&self, update: RoomUpdate) {
        let mut slot = self.pending.lock().await;
        slot.next_seq += 1;
        let seq = slot.next_seq;
        if let Some(previous) = slot.value.replace(PendingUpdate {
            room_name: update.room_name,
            user_count: update.user_count,
            received_at: chrono::Utc::now(),
            seq,
        }) {
            tracing::debug!("覆盖尚未发布的状态 #{}", previous.seq);
        }
    }

    pub async fn snapshot(&self) -> Option<PendingUpdate> {
        self.pending.lock().await.value.clone()
    }

    // 只清除序号匹配的状态，写入期间到达的新状态保留
    pub async fn consume(&self, seq: u64) -> Option<PendingUpdate> {
        let mut slot = self.pending.lock().await;
        match &slot.value {
            Some(current) if current.seq == seq => slot.value.take(),
            _ => None,
        }
    }

    pub async fn last_success(&self) -> Option<Instant> {
        *self.last_success.lock().await
    }

    pub async fn record_success(&self, at: Instant) {
        *self.last_success.lock().await = Some(at);
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
