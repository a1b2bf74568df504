use crate::types::BackendSpec;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    /// 启动时写入注册表的初始后端
    #[serde(default)]
    pub backends: Vec<BackendSpec>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// 单次转发尝试的超时预算
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// 禁用后端自动恢复前需要经过的时长
    #[serde(default = "default_recovery_window")]
    pub recovery_window_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            request_timeout_seconds: default_request_timeout(),
            recovery_window_seconds: default_recovery_window(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.settings.request_timeout_seconds == 0 {
            anyhow::bail!("request_timeout_seconds must be greater than 0");
        }
        if self.settings.recovery_window_seconds == 0 {
            anyhow::bail!("recovery_window_seconds must be greater than 0");
        }
        for backend in &self.backends {
            validate_spec(backend)?;
        }
        Ok(())
    }
}

/// 后端条目的基本校验，配置加载和管理接口创建共用
pub fn validate_spec(spec: &BackendSpec) -> Result<()> {
    if spec.name.trim().is_empty() {
        anyhow::bail!("backend name must not be empty");
    }
    if !spec.url.starts_with("http://") && !spec.url.starts_with("https://") {
        anyhow::bail!(
            "backend '{}' has invalid url '{}': must start with http:// or https://",
            spec.name,
            spec.url
        );
    }
    if spec.max_failures == 0 {
        anyhow::bail!("backend '{}' must allow at least one failure", spec.name);
    }
    Ok(())
}

fn default_bind_address() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_recovery_window() -> u64 {
    // 30 分钟
    1800
}
