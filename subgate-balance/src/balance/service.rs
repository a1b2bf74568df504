use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use subgate_core::{Attempt, Backend, FailoverError, RequestSnapshot};

use super::forwarder::{ProxyRequest, ProxyResponse, RequestForwarder};
use super::recovery::sweep_disabled_backends;
use super::registry::BackendRegistry;
use super::selector::{rank_by_weight, select_weighted};

/// 故障转移成功的结果：上游响应加上选中后端的信息
#[derive(Debug)]
pub struct ServedResponse {
    pub response: ProxyResponse,
    pub backend_id: u64,
    pub backend_name: String,
    /// 本次请求总共进行的尝试次数（含失败的）
    pub attempts: usize,
}

/// 故障转移服务
///
/// 整合恢复扫描、权重排序和顺序尝试，对外提供单一的转发入口。
/// 每次调用都从注册表重新读取候选，跨请求不保留任何进程内状态。
pub struct FailoverService {
    registry: Arc<dyn BackendRegistry>,
    forwarder: Arc<dyn RequestForwarder>,
    recovery_window: Duration,
}

impl FailoverService {
    pub fn new(
        registry: Arc<dyn BackendRegistry>,
        forwarder: Arc<dyn RequestForwarder>,
        recovery_window: Duration,
    ) -> Self {
        Self {
            registry,
            forwarder,
            recovery_window,
        }
    }

    pub fn registry(&self) -> Arc<dyn BackendRegistry> {
        self.registry.clone()
    }

    /// 运行一次恢复扫描；状态展示入口在渲染前也会独立调用它
    pub async fn run_recovery_sweep(&self) -> Result<usize> {
        sweep_disabled_backends(self.registry.as_ref(), self.recovery_window).await
    }

    /// 加权随机选出一个后端。
    ///
    /// 这是对外公布的"选一个"入口；故障转移路径不用它，而是按
    /// 确定性的降序权重依次尝试，避免每次尝试重新随机。
    pub async fn pick_backend(&self) -> Result<Backend, FailoverError> {
        let candidates = self.candidates().await?;
        select_weighted(&candidates)
            .cloned()
            .ok_or_else(|| FailoverError::AllBackendsUnavailable {
                attempts: 0,
                last_error: "no enabled backends".to_string(),
            })
    }

    /// 执行一次完整的外部请求：恢复扫描 -> 候选获取 -> 降序排序 ->
    /// 顺序尝试 -> 统计与快照更新 -> 成功响应或聚合失败。
    pub async fn execute(&self, request: ProxyRequest) -> Result<ServedResponse, FailoverError> {
        let candidates = self.candidates().await?;
        let ordered = rank_by_weight(candidates);
        let request_time = Utc::now();
        let mut attempts: Vec<Attempt> = Vec::with_capacity(ordered.len());
        let mut last_error = String::new();

        for backend in &ordered {
            debug!(
                "Forwarding request {} {} to backend '{}' ({})",
                request.method, request.path, backend.name, backend.url
            );
            let start = Instant::now();

            match self.forwarder.forward(backend, &request).await {
                Ok(response) => {
                    let elapsed_ms = start.elapsed().as_millis() as u64;
                    self.registry
                        .update_stats(backend.id, true, elapsed_ms)
                        .await?;
                    attempts.push(Attempt {
                        backend_id: backend.id,
                        backend_url: backend.url.clone(),
                        backend_name: backend.name.clone(),
                        success: true,
                        response_time_ms: elapsed_ms,
                        error_message: None,
                    });
                    let attempt_count = attempts.len();
                    self.registry
                        .write_snapshot(RequestSnapshot {
                            backend_id: Some(backend.id),
                            backend_url: Some(backend.url.clone()),
                            success: true,
                            response_time_ms: elapsed_ms,
                            request_time,
                            attempts,
                        })
                        .await?;

                    info!(
                        "Request served by backend '{}' in {}ms after {} attempt(s)",
                        backend.name, elapsed_ms, attempt_count
                    );
                    return Ok(ServedResponse {
                        response,
                        backend_id: backend.id,
                        backend_name: backend.name.clone(),
                        attempts: attempt_count,
                    });
                }
                Err(err) => {
                    let elapsed_ms = start.elapsed().as_millis() as u64;
                    warn!(
                        "Backend '{}' attempt failed after {}ms: {}",
                        backend.name, elapsed_ms, err
                    );
                    self.registry
                        .update_stats(backend.id, false, elapsed_ms)
                        .await?;
                    last_error = err.to_string();
                    attempts.push(Attempt {
                        backend_id: backend.id,
                        backend_url: backend.url.clone(),
                        backend_name: backend.name.clone(),
                        success: false,
                        response_time_ms: elapsed_ms,
                        error_message: Some(last_error.clone()),
                    });
                }
            }
        }

        let attempt_count = attempts.len();
        self.registry
            .write_snapshot(RequestSnapshot {
                backend_id: None,
                backend_url: None,
                success: false,
                response_time_ms: 0,
                request_time,
                attempts,
            })
            .await?;

        error!(
            "All {} backend attempt(s) failed, last error: {}",
            attempt_count, last_error
        );
        Err(FailoverError::AllBackendsUnavailable {
            attempts: attempt_count,
            last_error,
        })
    }

    /// 候选获取与全盘熄火处理。
    ///
    /// 先做恢复扫描让到期的后端归队；若启用集为空：注册表本身为
    /// 空则直接以配置错误终止，否则整体重置后重取一次。
    async fn candidates(&self) -> Result<Vec<Backend>, FailoverError> {
        self.run_recovery_sweep().await?;

        let candidates = self.registry.list_enabled().await?;
        if !candidates.is_empty() {
            return Ok(candidates);
        }

        if self.registry.count().await? == 0 {
            return Err(FailoverError::NoBackendsConfigured);
        }

        warn!("All configured backends are disabled, performing mass reset");
        self.registry.reset_all().await?;

        let candidates = self.registry.list_enabled().await?;
        if candidates.is_empty() {
            return Err(FailoverError::AllBackendsUnavailable {
                attempts: 0,
                last_error: "mass reset yielded no enabled backends".to_string(),
            });
        }
        Ok(candidates)
    }
}
