//! # 日志配置模块
//!
//! 初始化 `tracing` 订阅者。审计记录使用 `api_boundary::request` target，
//! 可以通过 `RUST_LOG` 单独调整，例如 `RUST_LOG=info,api_boundary::request=warn`
//! 只保留失败请求。

use crate::error::{BoundaryError, Result};
use std::env;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化日志系统
///
/// `RUST_LOG` 优先；否则使用传入的级别（默认 `info`）。
pub fn init_logging(log_level: Option<&str>) -> Result<()> {
    let level = log_level.unwrap_or("info");
    let default_filter = format!("{level},api_boundary=debug");
    let log_filter = env::var("RUST_LOG").unwrap_or(default_filter);

    tracing_subscriber::registry()
        .with(EnvFilter::new(log_filter))
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()
        .map_err(|e| BoundaryError::logging_with_source("日志系统初始化失败", e))?;

    Ok(())
}

/// 环境变量设置指南
pub fn print_logging_help() {
    println!("📋 日志配置指南:");
    println!("  RUST_LOG=info                              # 标准日志级别");
    println!("  RUST_LOG=debug                             # 调试级别");
    println!("  RUST_LOG=info,api_boundary::request=warn   # 只记录失败请求");
    println!("  RUST_LOG=info,api_boundary::request=off    # 关闭审计日志");
}
