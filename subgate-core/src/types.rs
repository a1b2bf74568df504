use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一个上游订阅后端及其健康状态与累计统计
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Backend {
    pub id: u64,
    pub name: String,
    pub url: String,
    /// 运维配置的基础权重
    pub static_weight: u32,
    /// 连续失败达到该阈值后自动禁用
    pub max_failures: u32,
    pub enabled: bool,
    /// 自上次成功或重置以来的连续失败次数
    pub current_failures: u32,
    /// 仅在禁用期间持有禁用时刻
    pub disabled_at: Option<DateTime<Utc>>,
    pub total_requests: u64,
    pub success_requests: u64,
    pub failed_requests: u64,
    /// 仅累计成功请求的响应时间
    pub total_response_time_ms: u64,
    pub last_response_time_ms: u64,
    pub last_success_time: Option<DateTime<Utc>>,
    pub last_failure_time: Option<DateTime<Utc>>,
    /// 统计被重置的次数（手动或自动）
    pub reset_count: u32,
}

impl Backend {
    /// 从配置条目或管理接口的创建请求构造一个全新的后端记录
    pub fn from_spec(id: u64, spec: &BackendSpec) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            url: spec.url.clone(),
            static_weight: spec.static_weight,
            max_failures: spec.max_failures,
            enabled: true,
            current_failures: 0,
            disabled_at: None,
            total_requests: 0,
            success_requests: 0,
            failed_requests: 0,
            total_response_time_ms: 0,
            last_response_time_ms: 0,
            last_success_time: None,
            last_failure_time: None,
            reset_count: 0,
        }
    }

    /// 成功率（0.0-1.0），无任何请求时为 0
    pub fn success_rate(&self) -> f64 {
        self.success_requests as f64 / self.total_requests.max(1) as f64
    }

    /// 成功请求的平均响应时间（毫秒），无成功记录时为 None
    pub fn avg_response_time_ms(&self) -> Option<f64> {
        if self.success_requests > 0 {
            Some(self.total_response_time_ms as f64 / self.success_requests as f64)
        } else {
            None
        }
    }
}

/// 创建后端所需的字段，配置文件的 `[[backends]]` 条目与管理接口共用
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BackendSpec {
    pub name: String,
    pub url: String,
    #[serde(default = "default_static_weight")]
    pub static_weight: u32,
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
}

/// 管理接口的部分更新，缺省字段保持不变
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct BackendUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub static_weight: Option<u32>,
    pub max_failures: Option<u32>,
    pub enabled: Option<bool>,
}

/// 一次故障转移序列中单个转发尝试的记录
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Attempt {
    pub backend_id: u64,
    pub backend_url: String,
    pub backend_name: String,
    pub success: bool,
    pub response_time_ms: u64,
    pub error_message: Option<String>,
}

/// 最近一次外部请求的总结，覆盖写入、从不追加
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RequestSnapshot {
    /// 最终服务该请求的后端，全部失败时为 None
    pub backend_id: Option<u64>,
    pub backend_url: Option<String>,
    pub success: bool,
    pub response_time_ms: u64,
    pub request_time: DateTime<Utc>,
    /// 按尝试顺序排列的完整记录
    pub attempts: Vec<Attempt>,
}

pub(crate) fn default_static_weight() -> u32 {
    100
}

pub(crate) fn default_max_failures() -> u32 {
    3
}
