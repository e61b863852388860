// ====================================================================================
// src/keepalive.rs - 保活服务
// ====================================================================================
use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};

pub struct KeepaliveService {
    url: String,
    interval: Duration,
    client: Client,
}

impl KeepaliveService {
    pub fn new(url: String, interval: Duration, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self { url, interval, client }
    }

    // 启动定时保活任务
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tracing::info!("启动保活服务，目标: {}，间隔: {:?}", self.url, self.interval);

        tokio::spawn(async move {
            let mut interval_timer = time::interval(self.interval);
            interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // 第一次 tick 立即返回，跳过它，等服务真正起来后再 ping
            interval_timer.tick().await;
            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        self.ping().await;
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    // 发送一次保活请求，任何失败都只记录日志
    pub async fn ping(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    tracing::info!("保活请求成功，状态码: {}", response.status());
                    true
                } else {
                    tracing::warn!("保活请求失败，状态码: {}，URL: {}", response.status(), self.url);
                    false
                }
            }
            Err(e) => {
                tracing::error!("发送保活请求失败到 {}: {}", self.url, e);
                false
            }
        }
    }
}
