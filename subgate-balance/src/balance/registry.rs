use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use subgate_core::{Backend, BackendSpec, BackendUpdate, RequestSnapshot};

/// 后端注册表接口
///
/// 核心只通过这个trait访问存储。任何能提供原子的统计更新和
/// 快照覆盖语义的存储都可以实现它；策略层的单元测试使用
/// 内存实现，不依赖真实存储。
#[async_trait]
pub trait BackendRegistry: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Backend>>;
    async fn list_enabled(&self) -> Result<Vec<Backend>>;
    async fn count(&self) -> Result<usize>;
    async fn get_by_id(&self, id: u64) -> Result<Option<Backend>>;

    /// 记录一次转发结果并应用健康状态转换规则：成功把连续失败
    /// 清零，失败累加连续失败并在达到 max_failures 时禁用后端。
    /// 返回 false 表示后端不存在。
    async fn update_stats(&self, id: u64, success: bool, response_time_ms: u64) -> Result<bool>;

    /// 清零全部统计、清除禁用时间戳、重新启用，reset_count 恰好加一
    async fn reset_statistics(&self, id: u64) -> Result<bool>;

    /// 对每个后端应用 reset_statistics 语义
    async fn reset_all(&self) -> Result<bool>;

    async fn add_backend(&self, spec: BackendSpec) -> Result<Backend>;
    async fn update_backend(&self, id: u64, update: BackendUpdate) -> Result<bool>;
    async fn delete_backend(&self, id: u64) -> Result<bool>;

    async fn write_snapshot(&self, snapshot: RequestSnapshot) -> Result<()>;
    async fn read_snapshot(&self) -> Result<Option<RequestSnapshot>>;
}

#[derive(Default)]
struct RegistryInner {
    backends: BTreeMap<u64, Backend>,
    snapshot: Option<RequestSnapshot>,
    next_id: u64,
}

/// 内存注册表
///
/// 所有变更都在同一把写锁下完成，update_stats 对调用者而言是
/// 原子的：并发请求更新同一后端的计数会串行化而不是互相覆盖。
pub struct MemoryRegistry {
    inner: RwLock<RegistryInner>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                backends: BTreeMap::new(),
                snapshot: None,
                next_id: 1,
            }),
        }
    }

    /// 用配置中的初始后端建表
    pub fn with_backends(specs: &[BackendSpec]) -> Self {
        let mut inner = RegistryInner {
            backends: BTreeMap::new(),
            snapshot: None,
            next_id: 1,
        };
        for spec in specs {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.backends.insert(id, Backend::from_spec(id, spec));
        }
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// 单个后端的重置语义，reset_statistics / reset_all 共用
    fn reset_backend(backend: &mut Backend) {
        backend.enabled = true;
        backend.disabled_at = None;
        backend.current_failures = 0;
        backend.total_requests = 0;
        backend.success_requests = 0;
        backend.failed_requests = 0;
        backend.total_response_time_ms = 0;
        backend.last_response_time_ms = 0;
        backend.last_success_time = None;
        backend.last_failure_time = None;
        backend.reset_count += 1;
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendRegistry for MemoryRegistry {
    async fn list_all(&self) -> Result<Vec<Backend>> {
        let inner = self.inner.read().await;
        Ok(inner.backends.values().cloned().collect())
    }

    async fn list_enabled(&self) -> Result<Vec<Backend>> {
        let inner = self.inner.read().await;
        Ok(inner
            .backends
            .values()
            .filter(|b| b.enabled)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let inner = self.inner.read().await;
        Ok(inner.backends.len())
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<Backend>> {
        let inner = self.inner.read().await;
        Ok(inner.backends.get(&id).cloned())
    }

    async fn update_stats(&self, id: u64, success: bool, response_time_ms: u64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(backend) = inner.backends.get_mut(&id) else {
            return Ok(false);
        };

        let now = Utc::now();
        backend.total_requests += 1;
        backend.last_response_time_ms = response_time_ms;

        if success {
            backend.success_requests += 1;
            backend.total_response_time_ms += response_time_ms;
            backend.last_success_time = Some(now);
            backend.current_failures = 0;
            debug!(
                "Recorded success for backend '{}' ({}ms)",
                backend.name, response_time_ms
            );
        } else {
            backend.failed_requests += 1;
            backend.last_failure_time = Some(now);
            backend.current_failures += 1;
            debug!(
                "Recorded failure for backend '{}' (consecutive: {}/{})",
                backend.name, backend.current_failures, backend.max_failures
            );

            if backend.enabled && backend.current_failures >= backend.max_failures {
                backend.enabled = false;
                backend.disabled_at = Some(now);
                warn!(
                    "Backend '{}' disabled after {} consecutive failures",
                    backend.name, backend.current_failures
                );
            }
        }

        Ok(true)
    }

    async fn reset_statistics(&self, id: u64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(backend) = inner.backends.get_mut(&id) else {
            return Ok(false);
        };
        Self::reset_backend(backend);
        info!("Statistics reset for backend '{}'", backend.name);
        Ok(true)
    }

    async fn reset_all(&self) -> Result<bool> {
        let mut inner = self.inner.write().await;
        for backend in inner.backends.values_mut() {
            Self::reset_backend(backend);
        }
        info!("Statistics reset for all backends");
        Ok(true)
    }

    async fn add_backend(&self, spec: BackendSpec) -> Result<Backend> {
        subgate_core::config::model::validate_spec(&spec)?;
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;
        let backend = Backend::from_spec(id, &spec);
        inner.backends.insert(id, backend.clone());
        info!("Backend '{}' added with id {}", backend.name, id);
        Ok(backend)
    }

    async fn update_backend(&self, id: u64, update: BackendUpdate) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(backend) = inner.backends.get_mut(&id) else {
            return Ok(false);
        };

        if let Some(name) = update.name {
            backend.name = name;
        }
        if let Some(url) = update.url {
            backend.url = url;
        }
        if let Some(static_weight) = update.static_weight {
            backend.static_weight = static_weight;
        }
        if let Some(max_failures) = update.max_failures {
            backend.max_failures = max_failures;
        }
        if let Some(enabled) = update.enabled {
            // enabled == false 当且仅当 disabled_at 持有时间戳
            if enabled && !backend.enabled {
                backend.enabled = true;
                backend.disabled_at = None;
            } else if !enabled && backend.enabled {
                backend.enabled = false;
                backend.disabled_at = Some(Utc::now());
            }
        }

        Ok(true)
    }

    async fn delete_backend(&self, id: u64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let removed = inner.backends.remove(&id);
        if let Some(backend) = &removed {
            info!("Backend '{}' deleted", backend.name);
        }
        Ok(removed.is_some())
    }

    async fn write_snapshot(&self, snapshot: RequestSnapshot) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.snapshot = Some(snapshot);
        Ok(())
    }

    async fn read_snapshot(&self) -> Result<Option<RequestSnapshot>> {
        let inner = self.inner.read().await;
        Ok(inner.snapshot.clone())
    }
}
