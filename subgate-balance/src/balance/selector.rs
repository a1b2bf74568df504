use rand::Rng;
use subgate_core::Backend;

use super::weight::dynamic_weight;

/// 加权随机选择一个后端。
///
/// 按列表顺序累加权重做前缀和，抽取 [0, total) 内的均匀随机数 r，
/// 返回第一个累计权重 >= r 的后端。total 为 0 时确定性地退回
/// 列表中的第一个（启用后端权重下限为 1，正常不会出现）。
pub fn select_weighted(backends: &[Backend]) -> Option<&Backend> {
    if backends.is_empty() {
        return None;
    }

    let weights: Vec<u32> = backends.iter().map(dynamic_weight).collect();
    let total: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    if total == 0 {
        return backends.first();
    }

    let r = rand::rng().random_range(0.0..total as f64);
    let mut accumulated = 0u64;
    for (backend, weight) in backends.iter().zip(&weights) {
        accumulated += u64::from(*weight);
        if accumulated as f64 >= r {
            return Some(backend);
        }
    }

    // r < total 时循环必然命中，保险起见退回最后一个
    backends.last()
}

/// 按动态权重降序稳定排序。
///
/// 故障转移用这个确定性顺序依次尝试，总是先试当前评分最高的
/// 后端，而不是每次尝试都重新随机。
pub fn rank_by_weight(mut backends: Vec<Backend>) -> Vec<Backend> {
    backends.sort_by_key(|b| std::cmp::Reverse(dynamic_weight(b)));
    backends
}
