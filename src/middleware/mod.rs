//! # 请求边界中间件
//!
//! 适配器负责把处理函数的错误写成响应，审计日志中间件负责为每个请求
//! 输出一条记录，两者通过请求作用域传递原始错误。

pub mod public;
pub mod request_logger;
pub mod scope;

pub use public::{ErrorBoundary, public};
pub use request_logger::{
    AuditLevel, AuditLogger, AuditRecord, AuditSink, RequestSummary, TracingSink, request_logger,
};
pub use scope::RequestScope;
