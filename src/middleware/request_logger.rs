//! # 请求审计日志中间件
//!
//! 每个请求输出一条结构化日志：状态码、耗时、来源地址、方法和路径。
//! 失败请求额外带上分类前的原始错误文本和它累积的元数据，这些内容
//! 只进日志，不会出现在响应体里。

use crate::config::AuditConfig;
use crate::metadata::{Value, get_metadata};
use crate::middleware::RequestScope;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// 审计日志事件的 target
pub const AUDIT_TARGET: &str = "api_boundary::request";

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    /// 成功或重定向
    Info,
    /// 客户端错误
    Warn,
    /// 服务端错误
    Error,
}

impl AuditLevel {
    /// `< 400` 为 info，`400..500`（含 499）为 warn，`>= 500` 为 error
    #[must_use]
    pub const fn for_status(status: u16) -> Self {
        if status >= 500 {
            Self::Error
        } else if status >= 400 {
            Self::Warn
        } else {
            Self::Info
        }
    }
}

/// 一条审计记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    /// 按状态码推导的级别
    pub level: AuditLevel,
    /// 原始错误文本，仅失败请求
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// 原始错误上的元数据，扁平键值序列
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<Value>,
    /// 状态码的标准原因短语，仅失败请求
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 响应状态码
    pub status: u16,
    /// 毫秒，保留两位小数
    pub ms: String,
    /// 客户端地址，未知时为 `-`
    pub ip: String,
    /// 请求方法
    pub method: String,
    /// 路径，带非空查询串
    pub path: String,
}

impl AuditRecord {
    /// 元数据渲染为 `key=value key=value`
    #[must_use]
    pub fn metadata_text(&self) -> String {
        let mut text = String::new();
        for pair in self.metadata.chunks_exact(2) {
            if !text.is_empty() {
                text.push(' ');
            }
            let _ = write!(text, "{}={}", PlainValue(&pair[0]), PlainValue(&pair[1]));
        }
        text
    }
}

/// 字符串不带引号，其余按 JSON 输出
struct PlainValue<'a>(&'a Value);

impl fmt::Display for PlainValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::String(text) => f.write_str(text),
            other => write!(f, "{other}"),
        }
    }
}

/// 审计记录的去向
///
/// 每条记录必须作为一次完整写入输出，不能与其他请求交错。
pub trait AuditSink: Send + Sync {
    /// 输出一条完整记录
    fn emit(&self, record: AuditRecord);
}

/// 默认输出：每条记录一个 `tracing` 事件
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn emit(&self, record: AuditRecord) {
        let metadata = record.metadata_text();
        let metadata = (!metadata.is_empty()).then_some(metadata);

        match record.level {
            AuditLevel::Info => info!(
                target: AUDIT_TARGET,
                status = record.status,
                ms = %record.ms,
                ip = %record.ip,
                method = %record.method,
                path = %record.path,
                "REQ"
            ),
            AuditLevel::Warn => warn!(
                target: AUDIT_TARGET,
                error_detail = record.error_detail.as_deref(),
                metadata = metadata.as_deref(),
                status = record.status,
                ms = %record.ms,
                ip = %record.ip,
                method = %record.method,
                path = %record.path,
                error = record.error.as_deref(),
                "REQ"
            ),
            AuditLevel::Error => error!(
                target: AUDIT_TARGET,
                error_detail = record.error_detail.as_deref(),
                metadata = metadata.as_deref(),
                status = record.status,
                ms = %record.ms,
                ip = %record.ip,
                method = %record.method,
                path = %record.path,
                error = record.error.as_deref(),
                "REQ"
            ),
        }
    }
}

/// 审计日志中间件状态
#[derive(Clone)]
pub struct AuditLogger {
    config: Arc<AuditConfig>,
    sink: Arc<dyn AuditSink>,
}

impl fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLogger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new(AuditConfig::default())
    }
}

impl AuditLogger {
    /// 输出到 `tracing`
    #[must_use]
    pub fn new(config: AuditConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// 自定义输出
    #[must_use]
    pub fn with_sink(config: AuditConfig, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            config: Arc::new(config),
            sink,
        }
    }

    /// 当前过滤配置
    #[must_use]
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// 前缀之外的路径和预检请求不记录
    #[must_use]
    pub fn should_log(&self, method: &Method, path: &str) -> bool {
        path.starts_with(&self.config.path_prefix) && *method != Method::OPTIONS
    }

    /// 根据请求结果组装记录
    #[must_use]
    pub fn build_record(
        &self,
        request: RequestSummary,
        status: StatusCode,
        elapsed: Duration,
        scope: &RequestScope,
    ) -> AuditRecord {
        let code = status.as_u16();
        let failed = code >= 400;
        let original = scope.original_error().filter(|_| failed);

        AuditRecord {
            level: AuditLevel::for_status(code),
            error_detail: original.map(ToString::to_string),
            metadata: original.map(get_metadata).unwrap_or_default(),
            error: failed.then(|| status.canonical_reason().unwrap_or_default().to_string()),
            status: code,
            ms: format_millis(elapsed),
            ip: request.ip,
            method: request.method.to_string(),
            path: request.path,
        }
    }
}

/// 请求进入时记下的信息，响应返回后请求本身已被消费
#[derive(Debug, Clone)]
pub struct RequestSummary {
    /// 请求方法
    pub method: Method,
    /// 路径，带非空查询串
    pub path: String,
    /// 客户端地址
    pub ip: String,
}

impl RequestSummary {
    /// 在请求交给下游之前读取
    #[must_use]
    pub fn from_request(request: &Request) -> Self {
        let uri = request.uri();
        let path = match uri.query() {
            Some(query) if !query.is_empty() => format!("{}?{query}", uri.path()),
            _ => uri.path().to_string(),
        };

        Self {
            method: request.method().clone(),
            path,
            ip: client_addr(request),
        }
    }
}

/// 审计日志中间件
///
/// ```ignore
/// let app = Router::new()
///     .route("/api/users/{id}", get(public(get_user)))
///     .layer(axum::middleware::from_fn_with_state(
///         AuditLogger::new(AuditConfig::default()),
///         request_logger,
///     ));
/// ```
pub async fn request_logger(
    State(logger): State<AuditLogger>,
    mut request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let scope = RequestScope::new();
    request.extensions_mut().insert(scope.clone());
    let summary = RequestSummary::from_request(&request);

    let response = next.run(request).await;
    let elapsed = start.elapsed();

    if logger.should_log(&summary.method, &summary.path) {
        let record = logger.build_record(summary, response.status(), elapsed, &scope);
        logger.sink.emit(record);
    }

    response
}

#[allow(clippy::cast_precision_loss)]
fn format_millis(elapsed: Duration) -> String {
    format!("{:.2}", elapsed.as_micros() as f64 / 1000.0)
}

/// 来源地址：优先连接信息，其次代理头
fn client_addr(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.to_string();
    }

    // X-Forwarded-For 可能包含多个IP，取第一个
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let real_ip = || {
        request
            .headers()
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
    };

    forwarded
        .or_else(real_ip)
        .map_or_else(|| "-".to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(200, AuditLevel::Info)]
    #[case(302, AuditLevel::Info)]
    #[case(400, AuditLevel::Warn)]
    #[case(404, AuditLevel::Warn)]
    #[case(499, AuditLevel::Warn)]
    #[case(500, AuditLevel::Error)]
    #[case(504, AuditLevel::Error)]
    fn test_level_for_status(#[case] status: u16, #[case] expected: AuditLevel) {
        assert_eq!(AuditLevel::for_status(status), expected);
    }

    #[test]
    fn test_should_log_filters_prefix_and_preflight() {
        let logger = AuditLogger::default();
        assert!(logger.should_log(&Method::GET, "/api/users"));
        assert!(logger.should_log(&Method::POST, "/api"));
        assert!(!logger.should_log(&Method::GET, "/health"));
        assert!(!logger.should_log(&Method::GET, "/static/app.js"));
        assert!(!logger.should_log(&Method::OPTIONS, "/api/users"));
    }

    #[test]
    fn test_summary_keeps_query_string() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/api/users?page=2&limit=10")
            .body(Body::empty())
            .unwrap();
        let summary = RequestSummary::from_request(&request);
        assert_eq!(summary.path, "/api/users?page=2&limit=10");
        assert_eq!(summary.ip, "-");

        let request = Request::builder().uri("/api/users?").body(Body::empty()).unwrap();
        assert_eq!(RequestSummary::from_request(&request).path, "/api/users");
    }

    #[test]
    fn test_client_addr_sources() {
        let mut request = Request::builder()
            .uri("/api")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_addr(&request), "203.0.113.7");

        request.headers_mut().remove("x-forwarded-for");
        assert_eq!(client_addr(&request), "198.51.100.2");

        let addr: SocketAddr = "127.0.0.1:51234".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_addr(&request), "127.0.0.1:51234");
    }

    #[test]
    fn test_format_millis_two_decimals() {
        assert_eq!(format_millis(Duration::from_micros(1_234)), "1.23");
        assert_eq!(format_millis(Duration::from_micros(5)), "0.01");
        assert_eq!(format_millis(Duration::ZERO), "0.00");
    }

    #[test]
    fn test_build_record_for_failure() {
        let logger = AuditLogger::default();
        let scope = RequestScope::new();
        scope.store(crate::metadata!(anyhow::anyhow!("row not found"), "user_id", "42"));

        let summary = RequestSummary {
            method: Method::GET,
            path: "/api/users/42".to_string(),
            ip: "-".to_string(),
        };
        let record = logger.build_record(
            summary,
            StatusCode::NOT_FOUND,
            Duration::from_millis(3),
            &scope,
        );

        assert_eq!(record.level, AuditLevel::Warn);
        assert_eq!(record.error_detail.as_deref(), Some("row not found"));
        assert_eq!(record.metadata_text(), "user_id=42");
        assert_eq!(record.error.as_deref(), Some("Not Found"));
        assert_eq!(record.ms, "3.00");
    }

    #[test]
    fn test_build_record_for_success_ignores_scope() {
        let logger = AuditLogger::default();
        let scope = RequestScope::new();
        scope.store(anyhow::anyhow!("should not be logged"));

        let summary = RequestSummary {
            method: Method::GET,
            path: "/api/ping".to_string(),
            ip: "-".to_string(),
        };
        let record = logger.build_record(summary, StatusCode::OK, Duration::ZERO, &scope);

        assert_eq!(record.level, AuditLevel::Info);
        assert!(record.error_detail.is_none());
        assert!(record.metadata.is_empty());
        assert!(record.error.is_none());
    }

    #[test]
    fn test_unknown_status_has_empty_reason() {
        let logger = AuditLogger::default();
        let summary = RequestSummary {
            method: Method::GET,
            path: "/api/slow".to_string(),
            ip: "-".to_string(),
        };
        let status = StatusCode::from_u16(499).unwrap();
        let record = logger.build_record(summary, status, Duration::ZERO, &RequestScope::new());

        assert_eq!(record.level, AuditLevel::Warn);
        assert_eq!(record.error.as_deref(), Some(""));
        assert!(record.error_detail.is_none());
    }
}
