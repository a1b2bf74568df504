use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HOST};
use reqwest::{Method, StatusCode, Url};
use std::time::Duration;

use subgate_core::{Backend, ForwardError};

/// 入站请求中转发所需的部分，主体已完整读入内存
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// 上游的响应
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// 请求转发接口
///
/// 一次调用对应一次尝试，整个调用（含读取响应体）受单次尝试的
/// 超时预算约束，超时后取消在途请求并以 Timeout 返回。
#[async_trait]
pub trait RequestForwarder: Send + Sync {
    async fn forward(
        &self,
        backend: &Backend,
        request: &ProxyRequest,
    ) -> Result<ProxyResponse, ForwardError>;
}

/// 基于 reqwest 的转发实现
pub struct HttpForwarder {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpForwarder {
    pub fn new(timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// 把入站的路径和查询串拼到后端地址的 origin 上
fn build_target_url(base: &str, path: &str, query: Option<&str>) -> Result<Url, ForwardError> {
    let mut url = Url::parse(base)
        .map_err(|e| ForwardError::Transport(format!("invalid backend url '{base}': {e}")))?;
    url.set_path(path);
    url.set_query(query);
    Ok(url)
}

#[async_trait]
impl RequestForwarder for HttpForwarder {
    async fn forward(
        &self,
        backend: &Backend,
        request: &ProxyRequest,
    ) -> Result<ProxyResponse, ForwardError> {
        let target = build_target_url(&backend.url, &request.path, request.query.as_deref())?;

        // Host 由 reqwest 按目标地址重新生成
        let mut headers = request.headers.clone();
        headers.remove(HOST);

        let call = async {
            let response = self
                .client
                .request(request.method.clone(), target)
                .headers(headers)
                .body(request.body.clone())
                .send()
                .await
                .map_err(|e| ForwardError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ForwardError::UpstreamStatus(status.as_u16()));
            }

            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| ForwardError::Transport(e.to_string()))?;

            Ok(ProxyResponse {
                status,
                headers,
                body,
            })
        };

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ForwardError::Timeout(self.timeout.as_millis() as u64))?
    }
}
