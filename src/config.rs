// ====================================================================================
// src/config.rs - 配置管理
// ====================================================================================
use crate::error::ConfigError;
use crate::models::ChannelId;
use chrono_tz::Tz;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// 面板外观的默认值，沿用线上面板
const DEFAULT_ROOM_LINK: &str = "https://www.habblet.city/room/6065930";
const DEFAULT_VIP_LINK: &str =
    "https://discord.com/channels/1186736897544945828/1211844747241586748";
const DEFAULT_THUMBNAIL_URL: &str =
    "https://cdn.discordapp.com/attachments/1303772458762895480/1424811285542863000/load-32.gif";

#[derive(Clone, Debug)]
pub struct Config {
    // 必填项
    pub discord_token: String,
    pub channel_id: ChannelId,
    pub api_key: String,

    pub bind_address: SocketAddr,
    pub discord_api_base: String,
    pub http_timeout_seconds: u64,

    // 更新节奏
    pub update_interval_seconds: u64,
    pub tick_interval_seconds: u64,

    // 限流退避配置
    pub retry_base_delay_ms: u64,
    pub retry_max_attempts: u32,
    pub retry_cooldown_seconds: u64,
    pub ingress_rate_limit: u32,

    // 面板消息定位
    pub message_id_path: PathBuf,
    pub panel_history_limit: u8,

    // 保活
    pub wake_url: Option<String>,
    pub wake_interval_seconds: u64,

    // 面板外观
    pub panel_description: String,
    pub panel_thumbnail_url: Option<String>,
    pub room_link: Option<String>,
    pub vip_link: Option<String>,
    pub panel_timezone: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // 尝试加载 .env 文件，如果失败则忽略（可能文件不存在）
        if let Err(e) = dotenvy::dotenv() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port: u16 = parse_or(&var, "PORT", 8000)?;
        let bind_address = match var("BIND_ADDRESS") {
            Some(raw) => parse_value("BIND_ADDRESS", &raw)?,
            None => SocketAddr::from(([0, 0, 0, 0], port)),
        };

        let panel_timezone = match var("PANEL_TIMEZONE") {
            Some(raw) => raw.parse::<Tz>().map_err(|_| ConfigError::Invalid {
                key: "PANEL_TIMEZONE",
                reason: format!("unknown time zone `{}`", raw),
            })?,
            None => chrono_tz::America::Sao_Paulo,
        };

        let config = Self {
            discord_token: var("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?,
            channel_id: parse_value(
                "CHANNEL_ID",
                &var("CHANNEL_ID").ok_or(ConfigError::Missing("CHANNEL_ID"))?,
            )?,
            api_key: var("API_KEY").ok_or(ConfigError::Missing("API_KEY"))?,

            bind_address,
            discord_api_base: var("DISCORD_API_BASE")
                .unwrap_or_else(|| "https://discord.com/api/v10".to_string()),
            http_timeout_seconds: parse_or(&var, "HTTP_TIMEOUT_SECONDS", 10)?,

            update_interval_seconds: parse_or(&var, "UPDATE_INTERVAL_SECONDS", 180)?,
            tick_interval_seconds: parse_or(&var, "TICK_INTERVAL_SECONDS", 5)?,

            retry_base_delay_ms: parse_or(&var, "RETRY_BASE_DELAY_MS", 1000)?,
            retry_max_attempts: parse_or(&var, "RETRY_MAX_ATTEMPTS", 4)?,
            retry_cooldown_seconds: parse_or(&var, "RETRY_COOLDOWN_SECONDS", 60)?,
            ingress_rate_limit: parse_or(&var, "INGRESS_RATE_LIMIT", 60)?,

            message_id_path: var("MESSAGE_ID_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("panel_message.json")),
            panel_history_limit: parse_or(&var, "PANEL_HISTORY_LIMIT", 10)?,

            wake_url: var("WAKE_URL"),
            wake_interval_seconds: parse_or(&var, "WAKE_INTERVAL_SECONDS", 300)?,

            panel_description: var("PANEL_DESCRIPTION")
                .unwrap_or_else(|| "Chame seus amigos e vem jogar!".to_string()),
            panel_thumbnail_url: optional_or(&var, "PANEL_THUMBNAIL_URL", DEFAULT_THUMBNAIL_URL),
            room_link: optional_or(&var, "ROOM_LINK", DEFAULT_ROOM_LINK),
            vip_link: optional_or(&var, "VIP_LINK", DEFAULT_VIP_LINK),
            panel_timezone,
        };

        if config.tick_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "TICK_INTERVAL_SECONDS",
                reason: "must be greater than zero".to_string(),
            });
        }
        if config.retry_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "RETRY_MAX_ATTEMPTS",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(1..=100).contains(&config.panel_history_limit) {
            return Err(ConfigError::Invalid {
                key: "PANEL_HISTORY_LIMIT",
                reason: "must be between 1 and 100".to_string(),
            });
        }

        Ok(config)
    }

    pub fn min_update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_seconds)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    pub fn wake_interval(&self) -> Duration {
        Duration::from_secs(self.wake_interval_seconds)
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn parse_or<T, V>(var: &V, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

// 未设置时用默认值，设为 none 则关闭该项
fn optional_or<V>(var: &V, key: &str, default: &str) -> Option<String>
where
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) if raw.trim().eq_ignore_ascii_case("none") => None,
        Some(raw) => Some(raw.trim().to_string()),
        None => Some(default.to_string()),
    }
}
