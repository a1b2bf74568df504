use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use tokio::sync::Mutex;

use subgate_core::{Backend, BackendSpec, FailoverError, ForwardError};

use super::forwarder::{ProxyRequest, ProxyResponse, RequestForwarder};
use super::registry::{BackendRegistry, MemoryRegistry};
use super::service::FailoverService;

/// 按后端 id 决定成败的转发桩，记录调用顺序
struct ScriptedForwarder {
    failing: HashSet<u64>,
    error: fn() -> ForwardError,
    calls: Mutex<Vec<u64>>,
}

impl ScriptedForwarder {
    fn new(failing: impl IntoIterator<Item = u64>) -> Self {
        Self {
            failing: failing.into_iter().collect(),
            error: || ForwardError::UpstreamStatus(502),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_error(failing: impl IntoIterator<Item = u64>, error: fn() -> ForwardError) -> Self {
        Self {
            failing: failing.into_iter().collect(),
            error,
            calls: Mutex::new(Vec::new()),
        }
    }

    async fn calls(&self) -> Vec<u64> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl RequestForwarder for ScriptedForwarder {
    async fn forward(
        &self,
        backend: &Backend,
        _request: &ProxyRequest,
    ) -> Result<ProxyResponse, ForwardError> {
        self.calls.lock().await.push(backend.id);
        if self.failing.contains(&backend.id) {
            Err((self.error)())
        } else {
            Ok(ProxyResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::from_static(b"ok"),
            })
        }
    }
}

/// 被调用即失败测试的转发桩，用于断言某条路径不碰网络
struct UnreachableForwarder;

#[async_trait]
impl RequestForwarder for UnreachableForwarder {
    async fn forward(
        &self,
        backend: &Backend,
        _request: &ProxyRequest,
    ) -> Result<ProxyResponse, ForwardError> {
        panic!("forwarder must not be called for backend {}", backend.id);
    }
}

fn request() -> ProxyRequest {
    ProxyRequest {
        method: Method::GET,
        path: "/sub".to_string(),
        query: None,
        headers: HeaderMap::new(),
        body: Bytes::new(),
    }
}

fn spec(name: &str, static_weight: u32) -> BackendSpec {
    BackendSpec {
        name: name.to_string(),
        url: format!("https://{name}.example.com"),
        static_weight,
        max_failures: 3,
    }
}

fn service(registry: Arc<MemoryRegistry>, forwarder: Arc<dyn RequestForwarder>) -> FailoverService {
    FailoverService::new(registry, forwarder, Duration::from_secs(1800))
}

/// 用若干次成功请求给后端铺出可区分的权重
async fn prime(registry: &MemoryRegistry, id: u64, latency_ms: u64) {
    for _ in 0..2 {
        registry.update_stats(id, true, latency_ms).await.unwrap();
    }
}

#[tokio::test]
async fn failover_tries_heavier_backend_first_and_serves_from_the_next() {
    let registry = Arc::new(MemoryRegistry::new());
    let b1 = registry.add_backend(spec("b1", 100)).await.unwrap();
    let b2 = registry.add_backend(spec("b2", 50)).await.unwrap();
    prime(&registry, b1.id, 100).await;
    prime(&registry, b2.id, 100).await;

    let forwarder = Arc::new(ScriptedForwarder::new([b1.id]));
    let service = service(registry.clone(), forwarder.clone());

    let served = service.execute(request()).await.unwrap();
    assert_eq!(served.backend_id, b2.id);
    assert_eq!(served.backend_name, "b2");
    assert_eq!(served.attempts, 2);
    assert_eq!(served.response.status, StatusCode::OK);
    assert_eq!(forwarder.calls().await, vec![b1.id, b2.id]);

    // 快照记录了完整的尝试顺序和最终结果
    let snapshot = registry.read_snapshot().await.unwrap().unwrap();
    assert!(snapshot.success);
    assert_eq!(snapshot.backend_id, Some(b2.id));
    assert_eq!(snapshot.attempts.len(), 2);
    assert_eq!(snapshot.attempts[0].backend_id, b1.id);
    assert!(!snapshot.attempts[0].success);
    assert!(snapshot.attempts[0].error_message.is_some());
    assert_eq!(snapshot.attempts[1].backend_id, b2.id);
    assert!(snapshot.attempts[1].success);

    // 失败和成功都落到了统计上
    let b1 = registry.get_by_id(b1.id).await.unwrap().unwrap();
    assert_eq!(b1.current_failures, 1);
    assert_eq!(b1.failed_requests, 1);
    let b2 = registry.get_by_id(b2.id).await.unwrap().unwrap();
    assert_eq!(b2.current_failures, 0);
    assert_eq!(b2.success_requests, 3);
}

#[tokio::test]
async fn first_success_short_circuits_remaining_candidates() {
    let registry = Arc::new(MemoryRegistry::new());
    let b1 = registry.add_backend(spec("b1", 100)).await.unwrap();
    let b2 = registry.add_backend(spec("b2", 50)).await.unwrap();
    prime(&registry, b1.id, 100).await;
    prime(&registry, b2.id, 100).await;

    let forwarder = Arc::new(ScriptedForwarder::new([]));
    let service = service(registry.clone(), forwarder.clone());

    let served = service.execute(request()).await.unwrap();
    assert_eq!(served.backend_id, b1.id);
    assert_eq!(served.attempts, 1);
    assert_eq!(forwarder.calls().await, vec![b1.id]);
}

#[tokio::test]
async fn exhaustion_persists_failure_snapshot_and_reports_last_error() {
    let registry = Arc::new(MemoryRegistry::new());
    let b1 = registry.add_backend(spec("b1", 100)).await.unwrap();
    let b2 = registry.add_backend(spec("b2", 50)).await.unwrap();
    prime(&registry, b1.id, 100).await;
    prime(&registry, b2.id, 100).await;

    let forwarder = Arc::new(ScriptedForwarder::with_error([b1.id, b2.id], || {
        ForwardError::Timeout(10_000)
    }));
    let service = service(registry.clone(), forwarder);

    let err = service.execute(request()).await.unwrap_err();
    match err {
        FailoverError::AllBackendsUnavailable {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 2);
            assert!(last_error.contains("timed out"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let snapshot = registry.read_snapshot().await.unwrap().unwrap();
    assert!(!snapshot.success);
    assert_eq!(snapshot.backend_id, None);
    assert_eq!(snapshot.backend_url, None);
    assert_eq!(snapshot.attempts.len(), 2);
    assert!(snapshot.attempts.iter().all(|a| !a.success));
    assert!(snapshot
        .attempts
        .iter()
        .all(|a| a.error_message.as_deref() == Some("request timed out after 10000ms")));
}

#[tokio::test]
async fn no_backends_configured_fails_before_any_forwarding() {
    let registry = Arc::new(MemoryRegistry::new());
    let service = service(registry, Arc::new(UnreachableForwarder));

    let err = service.execute(request()).await.unwrap_err();
    assert!(matches!(err, FailoverError::NoBackendsConfigured));
}

#[tokio::test]
async fn fully_disabled_pool_triggers_mass_reset_then_retries() {
    let registry = Arc::new(MemoryRegistry::new());
    let b1 = registry.add_backend(spec("b1", 100)).await.unwrap();
    let b2 = registry.add_backend(spec("b2", 50)).await.unwrap();
    for _ in 0..3 {
        registry.update_stats(b1.id, false, 100).await.unwrap();
        registry.update_stats(b2.id, false, 100).await.unwrap();
    }
    assert!(registry.list_enabled().await.unwrap().is_empty());

    let forwarder = Arc::new(ScriptedForwarder::new([]));
    let service = service(registry.clone(), forwarder);

    let served = service.execute(request()).await.unwrap();
    assert_eq!(served.attempts, 1);

    // 整体重置让两个后端都重新入池，reset_count 各加一
    let backends = registry.list_all().await.unwrap();
    assert!(backends.iter().all(|b| b.enabled));
    assert!(backends.iter().all(|b| b.reset_count == 1));
    // 服务请求的那个后端已经有了新的统计
    let total: u64 = backends.iter().map(|b| b.total_requests).sum();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn expired_disabled_backend_rejoins_via_sweep_before_selection() {
    let registry = Arc::new(MemoryRegistry::new());
    let b1 = registry.add_backend(spec("b1", 100)).await.unwrap();
    for _ in 0..3 {
        registry.update_stats(b1.id, false, 100).await.unwrap();
    }
    assert!(registry.list_enabled().await.unwrap().is_empty());

    // 恢复窗口为零：下一次请求的扫描立即恢复该后端
    let forwarder = Arc::new(ScriptedForwarder::new([]));
    let service = FailoverService::new(registry.clone(), forwarder, Duration::from_secs(0));

    let served = service.execute(request()).await.unwrap();
    assert_eq!(served.backend_id, b1.id);

    let b1 = registry.get_by_id(b1.id).await.unwrap().unwrap();
    assert!(b1.enabled);
    assert_eq!(b1.reset_count, 1);
    assert_eq!(b1.success_requests, 1);
}

#[tokio::test]
async fn pick_backend_returns_an_enabled_backend() {
    let registry = Arc::new(MemoryRegistry::new());
    let b1 = registry.add_backend(spec("b1", 100)).await.unwrap();
    let b2 = registry.add_backend(spec("b2", 50)).await.unwrap();
    for _ in 0..3 {
        registry.update_stats(b2.id, false, 100).await.unwrap();
    }

    let service = service(registry, Arc::new(UnreachableForwarder));
    for _ in 0..10 {
        let picked = service.pick_backend().await.unwrap();
        assert_eq!(picked.id, b1.id);
    }
}

#[tokio::test]
async fn pick_backend_without_configuration_is_a_configuration_error() {
    let registry = Arc::new(MemoryRegistry::new());
    let service = service(registry, Arc::new(UnreachableForwarder));
    let err = service.pick_backend().await.unwrap_err();
    assert!(matches!(err, FailoverError::NoBackendsConfigured));
}
