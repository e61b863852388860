// ====================================================================================
// src/error.rs - 自定义错误类型
// ====================================================================================
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// 入口请求错误，直接映射为 HTTP 响应
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: Invalid API Key")]
    Unauthorized,
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Too Many Requests: {0}")]
    TooManyRequests(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::BadRequest(msg) => {
                tracing::debug!("拒绝无效的更新请求: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::TooManyRequests(msg) => {
                tracing::warn!("入口请求过于频繁: {}", msg);
                (StatusCode::TOO_MANY_REQUESTS, msg)
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

// 启动阶段的配置错误，属于致命错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// 面板消息 ID 持久化错误，只记录日志，从不致命
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
