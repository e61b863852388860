// ====================================================================================
// src/platform.rs - 聊天平台接口
// ====================================================================================
use crate::models::{ChannelId, MessageId, PanelPayload, RemoteMessage, UserId};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("message not found")]
    MessageNotFound,
    #[error("channel not found")]
    ChannelNotFound,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("platform API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    // 机器人自身的用户 ID
    async fn current_user(&self) -> Result<UserId, PlatformError>;

    async fn fetch_channel(&self, channel: ChannelId) -> Result<(), PlatformError>;

    async fn fetch_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<RemoteMessage, PlatformError>;

    // 最近的消息，新的在前
    async fn recent_messages(
        &self,
        channel: ChannelId,
        limit: u8,
    ) -> Result<Vec<RemoteMessage>, PlatformError>;

    async fn send_message(
        &self,
        channel: ChannelId,
        payload: &PanelPayload,
    ) -> Result<RemoteMessage, PlatformError>;

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        payload: &PanelPayload,
    ) -> Result<RemoteMessage, PlatformError>;
}
