//! # 应用配置结构定义

use serde::{Deserialize, Serialize};

/// 应用主配置结构
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 审计日志配置
    pub audit: AuditConfig,
    /// 校验信息配置
    pub validation: ValidationConfig,
}

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// 审计日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// 只记录该前缀下的请求
    pub path_prefix: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path_prefix: "/api".to_string(),
        }
    }
}

impl AuditConfig {
    /// 指定路径前缀
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            path_prefix: prefix.into(),
        }
    }
}

/// 校验信息配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// 是否启用内置英文翻译器，关闭时直接输出规则名
    pub translate: bool,
}
