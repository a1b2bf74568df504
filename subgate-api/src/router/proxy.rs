use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, warn};

use crate::app::AppState;
use subgate_balance::ProxyRequest;
use subgate_core::FailoverError;

use super::status::error_response;

/// 入站请求体的读取上限
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// 转发响应里不透传的逐跳头；Content-Length 由 axum 按实际主体重写
const STRIP_HEADERS: [header::HeaderName; 3] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::CONTENT_LENGTH,
];

/// 判断主体读取失败是否由长度上限触发
fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
            return true;
        }
        source = e.source();
    }
    false
}

/// 代理兜底处理器
///
/// 所有未匹配管理路由的请求都走这里：读入主体、执行故障转移，
/// 把最终选中后端的响应原样返回并标注来源后端。
pub async fn proxy_request(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) if is_length_limit(&e) => {
            warn!("Request body over limit: {}", e);
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "body_too_large",
                format!("request body exceeds {MAX_BODY_BYTES} bytes"),
            )
            .into_response();
        }
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "body_read_error",
                e.to_string(),
            )
            .into_response();
        }
    };

    let proxy_request = ProxyRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
    };
    debug!(
        "Proxying {} {} via failover",
        proxy_request.method, proxy_request.path
    );

    match state.failover.execute(proxy_request).await {
        Ok(served) => {
            let mut response = Response::new(Body::from(served.response.body));
            *response.status_mut() = served.response.status;

            let headers = response.headers_mut();
            // HeaderMap 的迭代器对多值头按值重复键名，append 保留全部值
            for (name, value) in served.response.headers.iter() {
                if !STRIP_HEADERS.contains(name) {
                    headers.append(name, value.clone());
                }
            }
            headers.insert(
                "x-backend-id",
                HeaderValue::from_str(&served.backend_id.to_string())
                    .unwrap_or(HeaderValue::from_static("unknown")),
            );
            headers.insert(
                "x-backend-name",
                HeaderValue::from_str(&served.backend_name)
                    .unwrap_or(HeaderValue::from_static("unknown")),
            );
            response
        }
        Err(FailoverError::NoBackendsConfigured) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "no_backends_configured",
            "no backends configured",
        )
        .into_response(),
        Err(err @ FailoverError::AllBackendsUnavailable { .. }) => {
            let mut response = error_response(
                StatusCode::BAD_GATEWAY,
                "all_backends_unavailable",
                err.to_string(),
            )
            .into_response();
            response.headers_mut().insert(
                "x-backend-error",
                HeaderValue::from_str(&err.to_string())
                    .unwrap_or(HeaderValue::from_static("forwarding failed")),
            );
            response
        }
        Err(FailoverError::Registry(e)) => {
            tracing::error!("Registry failure during proxying: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({
                    "error": {
                        "type": "internal_error",
                        "message": e.to_string(),
                        "code": 500
                    }
                })),
            )
                .into_response()
        }
    }
}
