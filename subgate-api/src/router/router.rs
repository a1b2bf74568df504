use crate::app::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::{
    admin::{
        add_backend, delete_backend, get_backend, list_backends, reset_all_backends,
        reset_backend, update_backend,
    },
    proxy::proxy_request,
    status::{health_check, service_status},
};

/// 创建应用路由
///
/// 未匹配的任意路径都交给代理兜底处理器转发到后端。
pub fn create_app_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/status", get(service_status))
        .nest("/api/backends", create_backend_routes())
        .fallback(proxy_request)
        .layer(TraceLayer::new_for_http())
}

/// 创建后端管理路由
fn create_backend_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_backends).post(add_backend))
        .route("/reset-all", post(reset_all_backends))
        .route(
            "/{id}",
            get(get_backend).put(update_backend).delete(delete_backend),
        )
        .route("/{id}/reset", post(reset_backend))
}

/// 首页处理器
pub async fn index() -> &'static str {
    "Subgate - Weighted Failover Proxy"
}
