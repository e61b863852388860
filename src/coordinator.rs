// ====================================================================================
// src/coordinator.rs - 面板更新协调器
// ====================================================================================
use crate::{
    backoff::{BackoffGovernor, RetryPolicy},
    config::Config,
    locator::MessageLocator,
    models::{ChannelId, MessageId, PendingUpdate},
    panel::PanelRenderer,
    platform::{ChatPlatform, PlatformError},
    store::StateStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Clone, Debug)]
pub struct CoordinatorSettings {
    pub channel: ChannelId,
    pub min_interval: Duration,
    pub retry: RetryPolicy,
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            channel: config.channel_id,
            min_interval: config.min_update_interval(),
            retry: RetryPolicy::from_config(config),
        }
    }
}

// 单轮检查的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    // 上一轮仍在进行
    Busy,
    BackedOff,
    NothingPending,
    // 距上次成功更新未满最小间隔
    Throttled,
    Published(MessageId),
    Abandoned(AbandonReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    ChannelNotFound,
    RateLimited,
    ShuttingDown,
    Platform(PlatformError),
}

// 把最新的房间状态写入面板消息：每个最小间隔最多一次，退避期间不写
pub struct UpdateCoordinator {
    store: Arc<StateStore>,
    locator: MessageLocator,
    backoff: BackoffGovernor,
    platform: Arc<dyn ChatPlatform>,
    renderer: PanelRenderer,
    settings: CoordinatorSettings,
    running: Mutex<()>,
}

impl UpdateCoordinator {
    pub fn new(
        store: Arc<StateStore>,
        platform: Arc<dyn ChatPlatform>,
        locator: MessageLocator,
        renderer: PanelRenderer,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            store,
            locator,
            backoff: BackoffGovernor::new(),
            platform,
            renderer,
            settings,
            running: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn locator(&self) -> &MessageLocator {
        &self.locator
    }

    #[cfg(test)]
    pub fn backoff(&self) -> &BackoffGovernor {
        &self.backoff
    }

    // 启动定时更新任务
    pub fn start(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tracing::info!(
            "启动面板更新循环，频道: {}，检查间隔: {:?}，最小更新间隔: {:?}",
            self.settings.channel,
            period,
            self.settings.min_interval
        );

        tokio::spawn(async move {
            let mut interval_timer = time::interval(period);
            interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {}
                    _ = shutdown.changed() => break,
                }
                let outcome = self.run_tick(&mut shutdown).await;
                tracing::trace!("本轮检查结果: {:?}", outcome);
                // 关闭信号可能已在本轮重试等待中被消费
                if *shutdown.borrow() {
                    break;
                }
            }
            self.locator.flush().await;
            tracing::info!("面板更新循环已停止");
        })
    }

    pub async fn tick(&self) -> TickOutcome {
        let (_idle_tx, mut idle) = watch::channel(false);
        self.run_tick(&mut idle).await
    }

    async fn run_tick(&self, shutdown: &mut watch::Receiver<bool>) -> TickOutcome {
        // 上一轮尚未结束时直接跳过，不排队
        let Ok(_running) = self.running.try_lock() else {
            tracing::debug!("上一轮更新仍在进行，跳过本轮");
            return TickOutcome::Busy;
        };

        if self.backoff.is_blocked().await {
            return TickOutcome::BackedOff;
        }

        let Some(pending) = self.store.snapshot().await else {
            return TickOutcome::NothingPending;
        };

        if let Some(last) = self.store.last_success().await {
            if Instant::now().duration_since(last) < self.settings.min_interval {
                return TickOutcome::Throttled;
            }
        }

        match self.publish(&pending, shutdown).await {
            Ok(id) => {
                self.store.record_success(Instant::now()).await;
                self.store.consume(pending.seq).await;
                self.backoff.clear().await;
                let queued = chrono::Utc::now() - pending.received_at;
                tracing::info!(
                    "面板已更新: {} ({} 人)，消息: {}，排队 {} 秒",
                    pending.room_name,
                    pending.user_count,
                    id,
                    queued.num_seconds()
                );
                TickOutcome::Published(id)
            }
            Err(reason) => TickOutcome::Abandoned(reason),
        }
    }

    async fn publish(
        &self,
        pending: &PendingUpdate,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<MessageId, AbandonReason> {
        let channel = self.settings.channel;

        if let Err(e) = self.platform.fetch_channel(channel).await {
            return Err(self.abandon(e).await);
        }

        let mut handle = match self.locator.resolve(self.platform.as_ref(), channel).await {
            Ok(handle) => handle,
            Err(e) => return Err(self.abandon(e).await),
        };

        let payload = self.renderer.render(pending, chrono::Utc::now());
        let retry = &self.settings.retry;
        let mut delay = retry.base_delay;
        let mut attempt = 0;
        let mut healed = false;

        loop {
            attempt += 1;
            let result = match handle {
                Some(id) => self.platform.edit_message(channel, id, &payload).await,
                None => self.platform.send_message(channel, &payload).await,
            };

            match result {
                Ok(message) => {
                    if handle.is_none() {
                        tracing::info!("已发送新的面板消息: {}", message.id);
                    }
                    self.locator.record(message.id).await;
                    return Ok(message.id);
                }
                Err(PlatformError::MessageNotFound) if handle.is_some() && !healed => {
                    // 面板被删除：清除 ID，本轮内重新定位或新建一次，不计入重试次数
                    let stale = handle.take();
                    tracing::warn!("面板消息 {:?} 已不存在，重新创建", stale);
                    healed = true;
                    attempt -= 1;
                    self.locator.invalidate().await;
                    handle = match self
                        .locator
                        .discover_from_history(self.platform.as_ref(), channel, stale)
                        .await
                    {
                        Ok(found) => found,
                        Err(e) => return Err(self.abandon(e).await),
                    };
                }
                Err(PlatformError::RateLimited { retry_after }) => {
                    if attempt >= retry.max_attempts {
                        self.backoff.extend(retry.cooldown).await;
                        tracing::warn!(
                            "连续 {} 次被限流，暂停写入 {:?}",
                            attempt,
                            retry.cooldown
                        );
                        return Err(AbandonReason::RateLimited);
                    }
                    let wait = retry.wait_for(delay, retry_after);
                    self.backoff.extend(wait).await;
                    // 等待超过冷却时间就不在本轮内干等，交给退避闸门
                    if wait > retry.cooldown {
                        tracing::warn!("面板更新被限流，平台要求等待 {:?}，本轮放弃", wait);
                        return Err(AbandonReason::RateLimited);
                    }
                    tracing::warn!(
                        "面板更新被限流，{:?} 后重试 ({}/{})",
                        wait,
                        attempt,
                        retry.max_attempts
                    );
                    tokio::select! {
                        _ = time::sleep(wait) => {}
                        Ok(()) = shutdown.changed() => {
                            tracing::info!("收到关闭信号，放弃本轮重试");
                            return Err(AbandonReason::ShuttingDown);
                        }
                    }
                    delay = delay.saturating_mul(2);
                }
                Err(e) => {
                    tracing::error!("更新面板失败: {}", e);
                    return Err(AbandonReason::Platform(e));
                }
            }
        }
    }

    // 定位阶段的失败：不在本轮重试
    async fn abandon(&self, error: PlatformError) -> AbandonReason {
        match error {
            PlatformError::ChannelNotFound => {
                tracing::error!(
                    "找不到频道 {}，请检查 CHANNEL_ID 配置",
                    self.settings.channel
                );
                AbandonReason::ChannelNotFound
            }
            PlatformError::RateLimited { retry_after } => {
                let wait = retry_after.unwrap_or(self.settings.retry.base_delay);
                self.backoff.extend(wait).await;
                tracing::warn!("定位面板消息时被限流，{:?} 内不再写入", wait);
                AbandonReason::RateLimited
            }
            other => {
                tracing::error!("定位面板消息失败: {}", other);
                AbandonReason::Platform(other)
            }
        }
    }
}
