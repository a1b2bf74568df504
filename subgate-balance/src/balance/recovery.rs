use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::info;

use super::registry::BackendRegistry;

/// 恢复扫描：把禁用时长达到恢复窗口的后端整体重置并重新启用。
///
/// 这里不做半开探测：窗口一到就执行与手动重置完全相同的全量
/// 统计重置，恢复的后端立刻拿回完整的加权流量份额。
/// 返回本次扫描恢复的后端数量。
pub async fn sweep_disabled_backends(
    registry: &dyn BackendRegistry,
    recovery_window: Duration,
) -> Result<usize> {
    sweep_disabled_backends_at(registry, recovery_window, Utc::now()).await
}

/// 以显式的当前时间执行恢复扫描，窗口边界按 `now - disabled_at >= window` 判定（含边界）
pub async fn sweep_disabled_backends_at(
    registry: &dyn BackendRegistry,
    recovery_window: Duration,
    now: DateTime<Utc>,
) -> Result<usize> {
    let window = chrono::Duration::from_std(recovery_window)?;
    let mut recovered = 0usize;

    for backend in registry.list_all().await? {
        if backend.enabled {
            continue;
        }
        let Some(disabled_at) = backend.disabled_at else {
            continue;
        };
        if now - disabled_at >= window && registry.reset_statistics(backend.id).await? {
            info!(
                "Backend '{}' auto-recovered after {}s disabled",
                backend.name,
                (now - disabled_at).num_seconds()
            );
            recovered += 1;
        }
    }

    Ok(recovered)
}
