//! Web服务器实现
//!
//! 提供HTTP服务器和路由管理

use super::{api, auth, AppState};
use crate::config::WebConfig;
use crate::error::{ConfigError, Result};
use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// 创建路由
///
/// 只有触发接口受密钥保护
pub fn create_router(state: AppState, cors_enabled: bool) -> Router {
    let trigger_routes = Router::new()
        .route("/api/health-check", post(api::trigger_health_check))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_trigger_secret,
        ));

    let router = Router::new()
        .route("/health", get(api::health))
        .route(
            "/api/endpoints",
            get(api::list_endpoints).post(api::create_endpoint),
        )
        .route("/api/alerts", get(api::list_alerts).post(api::create_alert))
        .route("/api/alerts/{id}", patch(api::update_alert))
        .route("/api/metrics/{endpoint_id}", get(api::get_metrics))
        .merge(trigger_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors_enabled {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Web服务器
pub struct WebServer {
    /// 配置
    config: WebConfig,
    /// 共享状态
    state: AppState,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(config: WebConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// 监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.config.bind_address, self.config.port)
            .parse::<SocketAddr>()
            .map_err(|e| {
                ConfigError::ValidationError(format!(
                    "无效的监听地址 {}:{}: {}",
                    self.config.bind_address, self.config.port, e
                ))
                .into()
            })
    }

    /// 启动Web服务器，收到关闭信号后优雅退出
    pub async fn start(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let addr = self.socket_addr()?;

        if self.state.trigger_secret.is_none() {
            warn!("未配置触发密钥，/api/health-check 不做认证");
        }

        let router = create_router(self.state, self.config.cors_enabled);
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("Web服务器已启动: http://{}", addr);
        info!("触发接口: POST http://{}/api/health-check", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("接收到关闭信号，正在关闭Web服务器...");
            })
            .await?;

        info!("Web服务器已关闭");
        Ok(())
    }
}
