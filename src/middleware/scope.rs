//! # 请求作用域
//!
//! 每个请求一个的临时槽位，用于把分类前的原始错误从适配器交给审计日志。
//! 通过请求扩展传递，不使用全局或线程局部状态。

use axum::extract::Request;
use std::sync::{Arc, OnceLock};

/// 请求作用域句柄，克隆后指向同一个槽位
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    original_error: Arc<OnceLock<anyhow::Error>>,
}

impl RequestScope {
    /// 创建空的作用域
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录原始错误，只有第一次写入生效
    ///
    /// 返回是否写入成功。
    pub fn store(&self, err: anyhow::Error) -> bool {
        self.original_error.set(err).is_ok()
    }

    /// 读取原始错误
    #[must_use]
    pub fn original_error(&self) -> Option<&anyhow::Error> {
        self.original_error.get()
    }

    /// 从请求扩展中取出作用域
    #[must_use]
    pub fn from_request(request: &Request) -> Option<Self> {
        request.extensions().get::<Self>().cloned()
    }
}
