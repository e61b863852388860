// ====================================================================================
// src/routes.rs - HTTP路由处理
// ====================================================================================
use crate::{error::AppError, models::UpdateRoomRequest, state::AppState};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use headers::{Header, HeaderMapExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

static X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

// x-api-key 请求头
pub struct ApiKey(pub String);

impl Header for ApiKey {
    fn name() -> &'static HeaderName {
        &X_API_KEY
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let key = value.to_str().map_err(|_| headers::Error::invalid())?;
        Ok(ApiKey(key.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(value));
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    // 定义CORS策略
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/update-room", post(update_room))
        .route("/wake", get(wake).post(wake))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// 存活探针，无副作用
pub async fn wake() -> impl IntoResponse {
    Json(json!({ "status": "alive" }))
}

// 接收房间人数更新
pub async fn update_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    check_auth(&headers, &state.api_key)?;

    let request: UpdateRoomRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid payload: {}", e)))?;
    let update = request.validate().map_err(AppError::BadRequest)?;

    // 只有合法的更新才占用限流额度
    if !state.limiter.try_acquire().await {
        return Err(AppError::TooManyRequests("Too many updates, slow down".to_string()));
    }

    tracing::info!("收到房间更新: {} ({} 人)", update.room_name, update.user_count);
    state.store.set(update).await;

    Ok(Json(json!({ "status": "ok" })))
}

// 认证辅助函数
fn check_auth(headers: &HeaderMap, api_key: &str) -> Result<(), AppError> {
    match headers.typed_get::<ApiKey>() {
        Some(ApiKey(key)) if key == api_key => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ratelimit::IngressLimiter, store::StateStore};
    use axum::{body::Body, http::{Request, StatusCode}};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const KEY: &str = "shared-secret";

    fn state_with_limit(limit: u32) -> Arc<AppState> {
        Arc::new(AppState {
            store: Arc::new(StateStore::new()),
            limiter: IngressLimiter::per_minute(limit),
            api_key: KEY.to_string(),
        })
    }

    fn update_request(key: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/update-room")
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
        let response = app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn valid_update_is_accepted_and_stored() {
        let state = state_with_limit(60);
        let (status, body) = send(
            &state,
            update_request(Some(KEY), r#"{"roomName":"Arena","userCount":5}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
        let pending = state.store.snapshot().await.unwrap();
        assert_eq!(pending.room_name, "Arena");
        assert_eq!(pending.user_count, 5);
    }

    #[tokio::test]
    async fn wrong_key_is_unauthorized() {
        let state = state_with_limit(60);
        let (status, _) = send(
            &state,
            update_request(Some("nope"), r#"{"roomName":"Arena","userCount":5}"#),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(state.store.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn missing_key_is_unauthorized() {
        let state = state_with_limit(60);
        let (status, _) =
            send(&state, update_request(None, r#"{"roomName":"Arena","userCount":5}"#)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_room_name_is_bad_request() {
        let state = state_with_limit(60);
        let (status, body) = send(&state, update_request(Some(KEY), r#"{"userCount":5}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "roomName is required");
        assert!(state.store.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let state = state_with_limit(60);
        let (status, _) = send(&state, update_request(Some(KEY), "{roomName:")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            update_request(Some(KEY), r#"{"roomName":"Arena","userCount":"many"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.store.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn burst_keeps_only_last_update() {
        let state = state_with_limit(60);
        for users in [1, 2] {
            let body = format!(r#"{{"roomName":"A","userCount":{}}}"#, users);
            let (status, _) = send(&state, update_request(Some(KEY), &body)).await;
            assert_eq!(status, StatusCode::OK);
        }
        assert_eq!(state.store.snapshot().await.unwrap().user_count, 2);
    }

    #[tokio::test]
    async fn throttled_after_limit() {
        let state = state_with_limit(1);
        let body = r#"{"roomName":"A","userCount":1}"#;
        let (status, _) = send(&state, update_request(Some(KEY), body)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&state, update_request(Some(KEY), body)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn rejected_payloads_do_not_use_throttle_budget() {
        let state = state_with_limit(1);
        for bad in ["{roomName:", r#"{"userCount":5}"#] {
            let (status, _) = send(&state, update_request(Some(KEY), bad)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        let (status, _) = send(
            &state,
            update_request(Some(KEY), r#"{"roomName":"Arena","userCount":5}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.store.snapshot().await.unwrap().user_count, 5);
    }

    #[tokio::test]
    async fn wake_answers_without_side_effects() {
        let state = state_with_limit(60);
        for method in ["GET", "POST"] {
            let request = Request::builder()
                .method(method)
                .uri("/wake")
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(&state, request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({ "status": "alive" }));
        }
        assert!(state.store.snapshot().await.is_none());
    }
}
