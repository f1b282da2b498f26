//! # 对外错误结构
//!
//! 客户端唯一能看到的错误形态：`{"status": 422, "type": "validation", "msg": ...}`。
//! `type` 是稳定的机器可读标签，客户端可以据此分支。

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub mod classify;
pub mod validation;

pub use classify::{Classifier, Interrupted};
pub use validation::{
    EnglishTranslator, FieldViolation, Translator, ValidationErrors, format_validation_errors,
};

/// 错误消息体，三种形态在线上都是裸值（无标签）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    /// 纯文本
    Text(String),
    /// 字段名 → 错误信息（校验失败）
    Fields(BTreeMap<String, String>),
    /// 任意可序列化的值
    Value(Value),
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Fields(fields) => match serde_json::to_string(fields) {
                Ok(json) => f.write_str(&json),
                Err(e) => write!(f, "error marshaling message: {e}"),
            },
            Self::Value(Value::String(text)) => f.write_str(text),
            Self::Value(Value::Null) => Ok(()),
            Self::Value(value) => write!(f, "{value}"),
        }
    }
}

/// 缺省消息为 `null`，渲染为空字符串
impl Default for ErrorMessage {
    fn default() -> Self {
        Self::Value(Value::Null)
    }
}

impl From<&str> for ErrorMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ErrorMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<BTreeMap<String, String>> for ErrorMessage {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self::Fields(fields)
    }
}

impl From<Value> for ErrorMessage {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            other => Self::Value(other),
        }
    }
}

/// 归一化后的 API 错误
///
/// 创建后不可修改，只能整体替换。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    status: u16,
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "msg", default)]
    message: ErrorMessage,
}

impl ApiError {
    /// 创建错误
    pub fn new(status: u16, kind: impl Into<String>, message: impl Into<ErrorMessage>) -> Self {
        Self {
            status,
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// 400 bad_request
    pub fn bad_request(message: impl Into<ErrorMessage>) -> Self {
        Self::new(400, "bad_request", message)
    }

    /// 401 unauthorized
    pub fn unauthorized(message: impl Into<ErrorMessage>) -> Self {
        Self::new(401, "unauthorized", message)
    }

    /// 403 forbidden
    pub fn forbidden(message: impl Into<ErrorMessage>) -> Self {
        Self::new(403, "forbidden", message)
    }

    /// 404 not_found
    pub fn not_found(message: impl Into<ErrorMessage>) -> Self {
        Self::new(404, "not_found", message)
    }

    /// 409 conflict
    pub fn conflict(message: impl Into<ErrorMessage>) -> Self {
        Self::new(409, "conflict", message)
    }

    /// 500 internal，消息固定，不泄露内部细节
    #[must_use]
    pub fn internal() -> Self {
        Self::new(500, "internal", "internal server error")
    }

    /// HTTP 状态码
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// 状态码的 `http` 类型表示，非法值退化为 500
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// 机器可读的错误类型
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// 错误消息
    #[must_use]
    pub const fn message(&self) -> &ErrorMessage {
        &self.message
    }

    /// 写出为 JSON 响应；序列化失败时退化为纯文本 500
    #[must_use]
    pub fn to_response(&self) -> Response {
        match serde_json::to_vec(self) {
            Ok(body) => (
                self.status_code(),
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                )],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, status = self.status, "failed to encode error response");
                encoding_failure()
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.message, f)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.to_response()
    }
}

/// 错误体本身无法编码时的最小响应
pub(crate) fn encoding_failure() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        "Error encoding response",
    )
        .into_response()
}
