//! # 错误分类
//!
//! 把任意错误归约为 [`ApiError`]。规则按顺序匹配，命中即返回：
//!
//! 1. 已经是 `ApiError`：原样透传
//! 2. 请求体格式错误：400 `json`
//! 3. 字段校验失败：422 `validation`
//! 4. 请求被取消：499 `canceled`
//! 5. 请求超时：504 `canceled`
//! 6. 其余：500 `internal`，原始错误只进日志
//!
//! 每条规则都查找整条错误链，包括 `anyhow::Context` 附加的值；
//! 装饰层（元数据、说明文字）不影响结果。

use super::validation::{Translator, ValidationErrors, format_validation_errors};
use super::ApiError;
use crate::metadata::{MessageError, MetadataError};
use crate::middleware::RequestScope;
use axum::extract::rejection::JsonRejection;
use serde_json::error::Category;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use tracing::error;

const INVALID_JSON: &str = "invalid JSON format";
const INCOMPLETE_JSON: &str = "empty or incomplete JSON body";
const MISSING_CONTENT_TYPE: &str = "expected request with `Content-Type: application/json`";

/// 处理过程中观察到的中断信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    /// 客户端断开或上游取消
    #[error("request canceled")]
    Canceled,
    /// 超过截止时间
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// 错误分类器
///
/// 翻译器在启动时设置，之后只读，可以在任意多个请求之间共享。
#[derive(Clone, Default)]
pub struct Classifier {
    translator: Option<Arc<dyn Translator>>,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("translator", &self.translator.is_some())
            .finish()
    }
}

impl Classifier {
    /// 不带翻译器的分类器，校验错误直接输出规则名
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 带翻译器的分类器
    #[must_use]
    pub fn with_translator(translator: Arc<dyn Translator>) -> Self {
        Self {
            translator: Some(translator),
        }
    }

    /// 当前翻译器
    #[must_use]
    pub fn translator(&self) -> Option<&dyn Translator> {
        self.translator.as_deref()
    }

    /// 分类并把原始错误存入请求作用域
    pub fn classify(&self, err: anyhow::Error, scope: Option<&RequestScope>) -> ApiError {
        let api_err = self.normalize(&err);
        if let Some(scope) = scope {
            scope.store(err);
        }
        api_err
    }

    /// 没有错误时返回 `None`
    pub fn classify_opt(
        &self,
        err: Option<anyhow::Error>,
        scope: Option<&RequestScope>,
    ) -> Option<ApiError> {
        err.map(|err| self.classify(err, scope))
    }

    /// 纯分类，不产生副作用（兜底分支的日志除外）
    #[must_use]
    pub fn normalize(&self, err: &anyhow::Error) -> ApiError {
        if let Some(api_err) = find_cause::<ApiError>(err) {
            return api_err.clone();
        }

        if let Some(message) = malformed_payload(err) {
            return ApiError::new(400, "json", message);
        }

        if let Some(violations) = find_cause::<ValidationErrors>(err) {
            let fields = format_validation_errors(violations, self.translator());
            return ApiError::new(422, "validation", fields);
        }

        let signals = causes::<Interrupted>(err);
        if signals.contains(&&Interrupted::Canceled) {
            return ApiError::new(499, "canceled", "request cancelled");
        }

        if signals.contains(&&Interrupted::DeadlineExceeded)
            || find_cause::<tokio::time::error::Elapsed>(err).is_some()
        {
            return ApiError::new(504, "canceled", "request timeout");
        }

        error!(error = %format!("{err:#}"), "unmapped error reached the request boundary");
        ApiError::internal()
    }
}

fn find_cause<T>(err: &anyhow::Error) -> Option<&T>
where
    T: StdError + Send + Sync + 'static,
{
    causes(err).into_iter().next()
}

/// 收集错误链上所有 `T`
///
/// `source()` 链看不到通过 `anyhow::Context` 附加的值，它们只能由
/// `anyhow::Error::downcast_ref` 找到；装饰层内部的 `anyhow::Error`
/// 同理，需要逐层展开。
fn causes<T>(err: &anyhow::Error) -> Vec<&T>
where
    T: StdError + Send + Sync + 'static,
{
    let mut found: Vec<&T> = err.downcast_ref::<T>().into_iter().collect();
    for cause in err.chain() {
        if let Some(hit) = cause.downcast_ref::<T>() {
            found.push(hit);
        }
        if let Some(layer) = cause.downcast_ref::<MetadataError>() {
            found.extend(causes::<T>(layer.inner()));
        } else if let Some(layer) = cause.downcast_ref::<MessageError>() {
            found.extend(causes::<T>(layer.inner()));
        }
    }
    found
}

/// 请求体问题的提示信息
///
/// 语法/类型错误优先于缺少 `Content-Type`，再优先于“输入提前结束”。
/// 读取请求体本身失败（`JsonRejection::BytesRejection`，例如超过长度
/// 上限或连接中断）不属于格式问题，交给兜底规则处理。
fn malformed_payload(err: &anyhow::Error) -> Option<&'static str> {
    let json_errors = causes::<serde_json::Error>(err);
    let rejections = causes::<JsonRejection>(err);

    let syntax = json_errors
        .iter()
        .any(|json| matches!(json.classify(), Category::Syntax | Category::Data))
        || rejections.iter().any(|rejection| {
            matches!(
                rejection,
                JsonRejection::JsonSyntaxError(_) | JsonRejection::JsonDataError(_)
            )
        });
    if syntax {
        return Some(INVALID_JSON);
    }

    if rejections
        .iter()
        .any(|rejection| matches!(rejection, JsonRejection::MissingJsonContentType(_)))
    {
        return Some(MISSING_CONTENT_TYPE);
    }

    let incomplete = json_errors
        .iter()
        .any(|json| json.classify() == Category::Eof)
        || causes::<std::io::Error>(err)
            .iter()
            .any(|io| io.kind() == std::io::ErrorKind::UnexpectedEof);
    incomplete.then_some(INCOMPLETE_JSON)
}
