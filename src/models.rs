// ====================================================================================
// src/models.rs - 数据模型定义
// ====================================================================================
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

// Discord 雪花 ID，线上与磁盘上都以十进制字符串表示
macro_rules! snowflake {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map($name)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

snowflake!(MessageId);
snowflake!(ChannelId);
snowflake!(UserId);

// 入口校验通过后的房间状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomUpdate {
    pub room_name: String,
    pub user_count: u64,
}

// 待发布的最新状态，最多只保留一份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub room_name: String,
    pub user_count: u64,
    pub received_at: DateTime<Utc>,
    pub seq: u64,
}

// API请求模型
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomRequest {
    pub room_name: Option<String>,
    pub user_count: Option<i64>,
}

impl UpdateRoomRequest {
    pub fn validate(self) -> Result<RoomUpdate, String> {
        let room_name = match self.room_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => return Err("roomName is required".to_string()),
        };
        let user_count = match self.user_count {
            Some(count) if count >= 0 => count as u64,
            Some(_) => return Err("userCount must not be negative".to_string()),
            None => return Err("userCount is required".to_string()),
        };
        Ok(RoomUpdate { room_name, user_count })
    }
}

// 平台上的消息（只关心 ID 与作者）
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteMessage {
    pub id: MessageId,
    pub author: RemoteUser,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteUser {
    pub id: UserId,
}

// 面板消息载荷（Discord embed + 链接按钮）
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PanelPayload {
    pub embeds: Vec<Embed>,
    pub components: Vec<ActionRow>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActionRow {
    #[serde(rename = "type")]
    pub kind: u8,
    pub components: Vec<LinkButton>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LinkButton {
    #[serde(rename = "type")]
    pub kind: u8,
    pub style: u8,
    pub label: String,
    pub url: String,
}

impl ActionRow {
    pub fn of_links(components: Vec<LinkButton>) -> Self {
        Self { kind: 1, components }
    }
}

impl LinkButton {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: 2,
            style: 5,
            label: label.into(),
            url: url.into(),
        }
    }
}
