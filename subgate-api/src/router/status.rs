use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::app::AppState;
use subgate_balance::dynamic_weight;
use subgate_core::Backend;

/// 状态接口里的单个后端视图：原始字段加上派生指标
#[derive(Debug, Serialize)]
pub struct BackendStatus {
    #[serde(flatten)]
    pub backend: Backend,
    pub dynamic_weight: u32,
    pub success_rate: f64,
    pub avg_response_time_ms: Option<f64>,
}

impl BackendStatus {
    fn from_backend(backend: Backend) -> Self {
        let weight = dynamic_weight(&backend);
        let success_rate = backend.success_rate();
        let avg = backend.avg_response_time_ms();
        Self {
            backend,
            dynamic_weight: weight,
            success_rate,
            avg_response_time_ms: avg,
        }
    }
}

/// 统一的错误响应体
pub(crate) fn error_response(
    status: StatusCode,
    error_type: &str,
    message: impl Into<String>,
) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "error": {
                "type": error_type,
                "message": message.into(),
                "code": status.as_u16()
            }
        })),
    )
}

pub(crate) fn internal_error(err: anyhow::Error) -> (StatusCode, Json<Value>) {
    tracing::error!("Registry operation failed: {}", err);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        err.to_string(),
    )
}

/// 健康检查处理器
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let backends = state.registry.list_all().await.map_err(internal_error)?;
    let enabled = backends.iter().filter(|b| b.enabled).count();

    let healthy = enabled > 0;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok((
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "backends_total": backends.len(),
            "backends_enabled": enabled,
            "timestamp": Utc::now().to_rfc3339()
        })),
    ))
}

/// 服务状态处理器
///
/// 渲染前先跑一次恢复扫描，返回的视图里不会出现已到期却仍
/// 标记为禁用的后端。
pub async fn service_status(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .failover
        .run_recovery_sweep()
        .await
        .map_err(internal_error)?;

    let backends = state.registry.list_all().await.map_err(internal_error)?;
    let last_request = state.registry.read_snapshot().await.map_err(internal_error)?;

    let enabled = backends.iter().filter(|b| b.enabled).count();
    let disabled = backends.len() - enabled;
    let views: Vec<BackendStatus> = backends
        .into_iter()
        .map(BackendStatus::from_backend)
        .collect();

    Ok(Json(json!({
        "summary": {
            "total": views.len(),
            "enabled": enabled,
            "disabled": disabled
        },
        "backends": views,
        "last_request": last_request,
        "timestamp": Utc::now().to_rfc3339()
    })))
}
