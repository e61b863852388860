// ====================================================================================
// src/state.rs - 共享应用状态
// ====================================================================================
use crate::{config::Config, ratelimit::IngressLimiter, store::StateStore};
use std::sync::Arc;

// 入口处理器只接触状态存储，与协调器通过它解耦
pub struct AppState {
    pub store: Arc<StateStore>,
    pub limiter: IngressLimiter,
    pub api_key: String,
}

impl AppState {
    pub fn new(store: Arc<StateStore>, config: &Config) -> Self {
        Self {
            store,
            limiter: IngressLimiter::per_minute(config.ingress_rate_limit),
            api_key: config.api_key.clone(),
        }
    }
}
