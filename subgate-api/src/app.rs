use crate::router::router::create_app_router;
use subgate_balance::{BackendRegistry, FailoverService, HttpForwarder, MemoryRegistry};
use subgate_core::config::loader::{get_config_path, load_config};
use subgate_core::Config;

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 应用状态，包含故障转移服务和注册表
#[derive(Clone)]
pub struct AppState {
    pub failover: Arc<FailoverService>,
    pub registry: Arc<dyn BackendRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    /// 从默认路径的配置文件创建应用状态
    pub async fn new() -> Result<Self> {
        let config = load_config()?;
        info!(
            "Configuration loaded successfully from: {}",
            get_config_path()
        );
        Self::from_config(config)
    }

    /// 从已有配置创建应用状态
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let registry: Arc<dyn BackendRegistry> =
            Arc::new(MemoryRegistry::with_backends(&config.backends));
        info!("Backend registry seeded with {} backend(s)", config.backends.len());

        let forwarder = Arc::new(HttpForwarder::new(Duration::from_secs(
            config.settings.request_timeout_seconds,
        ))?);

        let failover = Arc::new(FailoverService::new(
            registry.clone(),
            forwarder,
            Duration::from_secs(config.settings.recovery_window_seconds),
        ));

        Ok(Self {
            failover,
            registry,
            config: Arc::new(config),
        })
    }
}

/// 创建应用路由
pub fn create_app(state: AppState) -> Router {
    create_app_router().with_state(state)
}

/// 启动应用服务器
pub async fn start_server() -> Result<()> {
    // 初始化日志 - 完全依赖RUST_LOG环境变量
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting Subgate server...");
    info!("Configuration file: {}", get_config_path());

    let app_state = match AppState::new().await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            return Err(e);
        }
    };

    let bind_address = app_state.config.settings.bind_address.clone();
    let app = create_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    let addr = listener.local_addr()?;

    info!("Server listening on http://{}", addr);
    info!("Available endpoints:");
    info!("  GET    /                    - Service information");
    info!("  GET    /health              - Health check");
    info!("  GET    /api/status          - Backend status and last request");
    info!("  GET    /api/backends        - List backends");
    info!("  POST   /api/backends        - Add backend");
    info!("  GET    /api/backends/{{id}}   - Get backend");
    info!("  PUT    /api/backends/{{id}}   - Update backend");
    info!("  DELETE /api/backends/{{id}}   - Delete backend");
    info!("  POST   /api/backends/{{id}}/reset - Reset backend statistics");
    info!("  POST   /api/backends/reset-all    - Reset all backends");
    info!("  ANY    /*                   - Proxied to the selected backend");

    // 优雅关闭
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C signal handler: {}", e);
        }
        info!("Shutdown signal received");
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);
    if let Err(e) = server.await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
