use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::app::AppState;
use subgate_core::config::model::validate_spec;
use subgate_core::{BackendSpec, BackendUpdate};

use super::status::{error_response, internal_error};

fn not_found(id: u64) -> (StatusCode, Json<Value>) {
    error_response(
        StatusCode::NOT_FOUND,
        "backend_not_found",
        format!("backend {id} does not exist"),
    )
}

/// 列出全部后端
pub async fn list_backends(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let backends = state.registry.list_all().await.map_err(internal_error)?;
    Ok(Json(json!({
        "count": backends.len(),
        "backends": backends
    })))
}

/// 查询单个后端
pub async fn get_backend(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.registry.get_by_id(id).await.map_err(internal_error)? {
        Some(backend) => Ok(Json(json!({ "backend": backend }))),
        None => Err(not_found(id)),
    }
}

/// 新增后端
pub async fn add_backend(
    State(state): State<AppState>,
    Json(spec): Json<BackendSpec>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if let Err(e) = validate_spec(&spec) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "invalid_backend",
            e.to_string(),
        ));
    }

    let backend = state
        .registry
        .add_backend(spec)
        .await
        .map_err(internal_error)?;
    info!("Backend '{}' added with id {}", backend.name, backend.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "backend": backend })),
    ))
}

/// 更新后端字段
pub async fn update_backend(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(update): Json<BackendUpdate>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(url) = &update.url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "invalid_backend",
                format!("invalid backend url: {url}"),
            ));
        }
    }

    if !state
        .registry
        .update_backend(id, update)
        .await
        .map_err(internal_error)?
    {
        return Err(not_found(id));
    }

    info!("Backend {} updated", id);
    Ok(Json(json!({ "success": true, "id": id })))
}

/// 删除后端
pub async fn delete_backend(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !state
        .registry
        .delete_backend(id)
        .await
        .map_err(internal_error)?
    {
        return Err(not_found(id));
    }

    info!("Backend {} deleted", id);
    Ok(Json(json!({ "success": true, "id": id })))
}

/// 重置单个后端的统计并重新启用
pub async fn reset_backend(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !state
        .registry
        .reset_statistics(id)
        .await
        .map_err(internal_error)?
    {
        return Err(not_found(id));
    }

    info!("Backend {} statistics reset", id);
    Ok(Json(json!({ "success": true, "id": id })))
}

/// 重置全部后端
pub async fn reset_all_backends(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.registry.reset_all().await.map_err(internal_error)?;
    info!("All backend statistics reset");
    Ok(Json(json!({ "success": true })))
}
