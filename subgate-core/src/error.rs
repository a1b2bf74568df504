use thiserror::Error;

/// 故障转移的终止错误，只有这两类会跨出核心边界交给调用方
#[derive(Debug, Error)]
pub enum FailoverError {
    /// 注册表中没有配置任何后端，致命且不重试
    #[error("no backends configured")]
    NoBackendsConfigured,

    /// 所有候选后端的尝试都失败了
    #[error("all backends unavailable after {attempts} attempt(s): {last_error}")]
    AllBackendsUnavailable { attempts: usize, last_error: String },

    /// 注册表读写失败
    #[error("registry error: {0}")]
    Registry(#[from] anyhow::Error),
}

/// 单次转发尝试的传输层错误
///
/// 执行器总是把它捕获并记录为一次失败的 Attempt，然后继续尝试
/// 下一个候选，它从不直接向外传播。
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("upstream returned status {0}")]
    UpstreamStatus(u16),

    #[error("transport error: {0}")]
    Transport(String),
}
