//! # 配置管理模块
//!
//! 处理配置文件加载和验证。可调的行为只有审计路径前缀和是否启用校验翻译器。

mod app_config;

pub use app_config::{AppConfig, AuditConfig, ServerConfig, ValidationConfig};

use crate::error::{BoundaryError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// 按 `RUST_ENV` 推导的默认配置文件路径
#[must_use]
pub fn default_config_path() -> PathBuf {
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    PathBuf::from(format!("config/config.{env}.toml"))
}

/// 加载配置文件
///
/// 未指定路径且默认文件不存在时使用默认配置。
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_file = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default_path = default_config_path();
            if !default_path.exists() {
                return Ok(AppConfig::default());
            }
            default_path
        }
    };

    let config_content =
        std::fs::read_to_string(&config_file).map_err(|e| BoundaryError::Io {
            message: format!("读取配置文件失败: {}", config_file.display()),
            source: e,
        })?;

    from_toml_str(&config_content)
}

/// 从 TOML 文本解析并验证配置
pub fn from_toml_str(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<()> {
    let prefix = &config.audit.path_prefix;
    if !prefix.is_empty() && !prefix.starts_with('/') {
        return Err(BoundaryError::config(format!(
            "审计路径前缀必须以 / 开头: {prefix}"
        )));
    }

    if config.server.bind_address.trim().is_empty() {
        return Err(BoundaryError::config("监听地址不能为空"));
    }

    Ok(())
}
