// ====================================================================================
// src/main.rs - 应用入口
// ====================================================================================
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod backoff;
mod config;
mod coordinator;
mod discord;
mod error;
mod keepalive;
mod locator;
mod models;
mod panel;
mod persist;
mod platform;
mod ratelimit;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod testing;

use config::Config;
use coordinator::{CoordinatorSettings, UpdateCoordinator};
use discord::DiscordClient;
use keepalive::KeepaliveService;
use locator::MessageLocator;
use panel::PanelRenderer;
use persist::MessageIdFile;
use platform::ChatPlatform;
use state::AppState;
use store::StateStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志记录
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "room_relay=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置，缺少必填项时直接退出
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("配置错误: {}", e);
            return Err(e.into());
        }
    };

    let store = Arc::new(StateStore::new());
    let platform: Arc<dyn ChatPlatform> = Arc::new(DiscordClient::new(&config));

    let locator = MessageLocator::new(
        MessageIdFile::new(config.message_id_path.clone()),
        config.panel_history_limit,
    );
    locator.load().await;

    let coordinator = Arc::new(UpdateCoordinator::new(
        store.clone(),
        platform,
        locator,
        PanelRenderer::from_config(&config),
        CoordinatorSettings::from_config(&config),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 启动面板更新与保活任务
    let update_task = coordinator.clone().start(config.tick_interval(), shutdown_rx.clone());
    let keepalive_task = config.wake_url.clone().map(|url| {
        KeepaliveService::new(url, config.wake_interval(), config.http_timeout())
            .start(shutdown_rx.clone())
    });

    let app = routes::app(Arc::new(AppState::new(store, &config)));

    // 启动服务器
    tracing::info!("服务器正在监听于 {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 通知后台任务退出，等待当前一轮更新结束并保存面板 ID
    tracing::info!("正在关闭...");
    let _ = shutdown_tx.send(true);
    if let Err(e) = update_task.await {
        tracing::error!("面板更新任务异常退出: {}", e);
    }
    if let Some(task) = keepalive_task {
        let _ = task.await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("无法监听 Ctrl+C 信号: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("无法监听 SIGTERM 信号: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
