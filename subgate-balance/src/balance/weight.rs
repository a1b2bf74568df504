use subgate_core::Backend;

/// 基准响应时间（毫秒），低于此值不再额外提升权重
const RESPONSE_TIME_FLOOR_MS: f64 = 100.0;
/// 没有任何成功记录时假定的平均响应时间（毫秒）
const UNTESTED_RESPONSE_TIME_MS: f64 = 1000.0;

/// 根据后端的当前统计计算动态选择权重。
///
/// 禁用的后端恒为 0。启用的后端无论历史多差至少为 1，
/// 因此只要没有被禁用就始终有机会被选中。
pub fn dynamic_weight(backend: &Backend) -> u32 {
    if !backend.enabled {
        return 0;
    }

    let base = backend.static_weight as f64;
    // 从未使用过的后端成功率记 0，先受罚而不是被优待
    let success_rate = backend.success_requests as f64 / backend.total_requests.max(1) as f64;

    let avg_response_time = backend
        .avg_response_time_ms()
        .unwrap_or(UNTESTED_RESPONSE_TIME_MS);
    let response_factor = 1000.0 / avg_response_time.max(RESPONSE_TIME_FLOOR_MS);
    let failure_penalty = 1.0 / (backend.current_failures as f64 + 1.0);

    let raw = base * success_rate * response_factor * failure_penalty;
    (raw.round() as u32).max(1)
}
