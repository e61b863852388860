// ====================================================================================
// src/discord.rs - Discord REST 客户端
// ====================================================================================
use crate::{
    config::Config,
    models::{ChannelId, MessageId, PanelPayload, RemoteMessage, RemoteUser, UserId},
    platform::{ChatPlatform, PlatformError},
};
use async_trait::async_trait;
use http::StatusCode;
use reqwest::{Client, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use std::time::Duration;

const UNKNOWN_CHANNEL: u32 = 10003;
const UNKNOWN_MESSAGE: u32 = 10008;

#[derive(Debug, Default, Deserialize)]
struct DiscordErrorBody {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after: Option<f64>,
}

// 404 时资源类型不明确，由调用方指定缺省含义
#[derive(Clone, Copy)]
enum Missing {
    Channel,
    Message,
}

pub struct DiscordClient {
    client: Client,
    api_base: String,
    token: String,
}

impl DiscordClient {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!(
                "DiscordBot (room_relay, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_base: config.discord_api_base.trim_end_matches('/').to_string(),
            token: config.discord_token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        missing: Missing,
    ) -> Result<T, PlatformError> {
        let response = request
            .header(http::header::AUTHORIZATION, format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| PlatformError::Network(e.to_string()));
        }

        let header_retry_after = response
            .headers()
            .get(http::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<f64>().ok());
        let body = response.json::<DiscordErrorBody>().await.unwrap_or_default();

        let error = classify(status, header_retry_after, body, missing);
        tracing::debug!("Discord 请求失败，状态码: {}，错误: {}", status, error);
        Err(error)
    }
}

fn classify(
    status: StatusCode,
    header_retry_after: Option<f64>,
    body: DiscordErrorBody,
    missing: Missing,
) -> PlatformError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = body
                .retry_after
                .or(header_retry_after)
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64);
            PlatformError::RateLimited { retry_after }
        }
        StatusCode::NOT_FOUND => match (body.code, missing) {
            (Some(UNKNOWN_MESSAGE), _) => PlatformError::MessageNotFound,
            (Some(UNKNOWN_CHANNEL), _) => PlatformError::ChannelNotFound,
            (_, Missing::Message) => PlatformError::MessageNotFound,
            (_, Missing::Channel) => PlatformError::ChannelNotFound,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Unauthorized(
            body.message.unwrap_or_else(|| status.to_string()),
        ),
        _ => PlatformError::Api {
            status: status.as_u16(),
            message: body.message.unwrap_or_else(|| status.to_string()),
        },
    }
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    async fn current_user(&self) -> Result<UserId, PlatformError> {
        let me: RemoteUser = self
            .execute(self.client.get(self.url("/users/@me")), Missing::Channel)
            .await?;
        Ok(me.id)
    }

    async fn fetch_channel(&self, channel: ChannelId) -> Result<(), PlatformError> {
        let _: IgnoredAny = self
            .execute(
                self.client.get(self.url(&format!("/channels/{}", channel))),
                Missing::Channel,
            )
            .await?;
        Ok(())
    }

    async fn fetch_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<RemoteMessage, PlatformError> {
        self.execute(
            self.client
                .get(self.url(&format!("/channels/{}/messages/{}", channel, message))),
            Missing::Message,
        )
        .await
    }

    async fn recent_messages(
        &self,
        channel: ChannelId,
        limit: u8,
    ) -> Result<Vec<RemoteMessage>, PlatformError> {
        self.execute(
            self.client
                .get(self.url(&format!("/channels/{}/messages", channel)))
                .query(&[("limit", limit)]),
            Missing::Channel,
        )
        .await
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        payload: &PanelPayload,
    ) -> Result<RemoteMessage, PlatformError> {
        self.execute(
            self.client
                .post(self.url(&format!("/channels/{}/messages", channel)))
                .json(payload),
            Missing::Channel,
        )
        .await
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        payload: &PanelPayload,
    ) -> Result<RemoteMessage, PlatformError> {
        self.execute(
            self.client
                .patch(self.url(&format!("/channels/{}/messages/{}", channel, message)))
                .json(payload),
            Missing::Message,
        )
        .await
    }
}
