//! # API Boundary
//!
//! 请求边界的错误归一化与审计日志。
//!
//! 处理函数返回任意错误，沿途可以用 [`metadata`] 附加键值上下文；
//! [`middleware::public`] 在边界处把错误分类为稳定的 `{status, type, msg}`
//! 结构写回客户端，[`middleware::request_logger`] 则把原始错误和元数据
//! 写进每个请求唯一的一条审计日志。

pub mod api_error;
pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod middleware;
pub mod response;

// Re-export commonly used types
pub use api_error::{ApiError, Classifier, ErrorMessage, Interrupted};
pub use config::{AppConfig, AuditConfig};
pub use error::{BoundaryError, Result};
pub use metadata::{ResultMetadataExt, with_metadata};
pub use middleware::{AuditLogger, ErrorBoundary, RequestScope, public, request_logger};
