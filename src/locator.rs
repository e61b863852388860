// ====================================================================================
// src/locator.rs - 面板消息定位
// ====================================================================================
use crate::{
    models::{ChannelId, MessageId, UserId},
    persist::MessageIdFile,
    platform::{ChatPlatform, PlatformError},
};
use tokio::sync::{Mutex, OnceCell};

#[derive(Clone, Copy, Debug, Default)]
struct PanelHandle {
    id: Option<MessageId>,
    // 从磁盘加载的 ID 在首次使用前需确认仍存在
    confirmed: bool,
}

// 定位当前面板消息：先用已保存的 ID，再扫描频道历史中本服务发出的消息，
// 都没有时由调用方新建并通过 record 交回 ID
pub struct MessageLocator {
    file: MessageIdFile,
    handle: Mutex<PanelHandle>,
    own_id: OnceCell<UserId>,
    history_limit: u8,
}

impl MessageLocator {
    pub fn new(file: MessageIdFile, history_limit: u8) -> Self {
        Self {
            file,
            handle: Mutex::new(PanelHandle::default()),
            own_id: OnceCell::new(),
            history_limit,
        }
    }

    pub async fn load(&self) -> Option<MessageId> {
        let loaded = match self.file.load().await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("读取面板消息 ID 失败，改用历史扫描: {}", e);
                None
            }
        };
        match loaded {
            Some(id) => tracing::info!("已加载面板消息 ID: {}", id),
            None => tracing::info!("没有已保存的面板消息 ID"),
        }
        *self.handle.lock().await = PanelHandle { id: loaded, confirmed: false };
        loaded
    }

    pub async fn current(&self) -> Option<MessageId> {
        self.handle.lock().await.id
    }

    pub async fn resolve(
        &self,
        platform: &dyn ChatPlatform,
        channel: ChannelId,
    ) -> Result<Option<MessageId>, PlatformError> {
        let handle = *self.handle.lock().await;

        if let Some(id) = handle.id {
            if handle.confirmed {
                return Ok(Some(id));
            }
            match platform.fetch_message(channel, id).await {
                Ok(_) => {
                    self.handle.lock().await.confirmed = true;
                    return Ok(Some(id));
                }
                Err(PlatformError::MessageNotFound) => {
                    tracing::warn!("已保存的面板消息 {} 不存在，重新查找", id);
                    self.invalidate().await;
                }
                Err(e) => return Err(e),
            }
        }

        let found = self.discover_from_history(platform, channel, None).await?;
        if let Some(id) = found {
            self.record(id).await;
        }
        Ok(found)
    }

    // 扫描最近的频道历史，exclude 为已知失效的 ID
    pub async fn discover_from_history(
        &self,
        platform: &dyn ChatPlatform,
        channel: ChannelId,
        exclude: Option<MessageId>,
    ) -> Result<Option<MessageId>, PlatformError> {
        let own_id = *self
            .own_id
            .get_or_try_init(|| platform.current_user())
            .await?;

        let messages = match platform.recent_messages(channel, self.history_limit).await {
            Ok(messages) => messages,
            // 没有读取历史的权限时无法扫描，直接新建
            Err(PlatformError::Unauthorized(reason)) => {
                tracing::warn!("无权读取频道历史，跳过扫描: {}", reason);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let found = messages
            .iter()
            .find(|m| m.author.id == own_id && Some(m.id) != exclude)
            .map(|m| m.id);
        match found {
            Some(id) => tracing::info!("在频道历史中找到已有面板消息: {}", id),
            None => tracing::info!("频道历史中没有面板消息，需要时将新建"),
        }
        Ok(found)
    }

    // 记录确认可用的 ID，变化时持久化
    pub async fn record(&self, id: MessageId) {
        let changed = {
            let mut handle = self.handle.lock().await;
            let changed = handle.id != Some(id);
            *handle = PanelHandle { id: Some(id), confirmed: true };
            changed
        };
        if changed {
            self.persist(Some(id)).await;
        }
    }

    pub async fn invalidate(&self) {
        *self.handle.lock().await = PanelHandle::default();
        self.persist(None).await;
    }

    pub async fn persist(&self, id: Option<MessageId>) {
        if let Err(e) = self.file.save(id).await {
            tracing::error!("保存面板消息 ID 失败: {}", e);
        }
    }

    // 退出前把当前 ID 写回磁盘
    pub async fn flush(&self) {
        let current = self.current().await;
        self.persist(current).await;
    }
}
