//! # 请求适配器
//!
//! 把可能失败的处理函数包装成 axum 处理函数：成功时原样返回处理函数自己
//! 写出的响应；失败时分类、写状态码和 JSON 错误体。

use crate::api_error::Classifier;
use crate::middleware::RequestScope;
use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// 错误边界，持有共享的分类器
#[derive(Debug, Clone, Default)]
pub struct ErrorBoundary {
    classifier: Arc<Classifier>,
}

impl ErrorBoundary {
    /// 使用给定分类器
    #[must_use]
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier: Arc::new(classifier),
        }
    }

    /// 共享的分类器
    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// 包装处理函数
    ///
    /// 返回值可以直接交给 `axum::routing::get` 等路由方法。
    pub fn wrap<H, Fut, R, E>(
        &self,
        handler: H,
    ) -> impl Fn(Request) -> BoxFuture<'static, Response> + Clone + Send + Sync + use<H, Fut, R, E>
    where
        H: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: IntoResponse + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let classifier = Arc::clone(&self.classifier);
        move |request: Request| -> BoxFuture<'static, Response> {
            let classifier = Arc::clone(&classifier);
            let handler = handler.clone();
            Box::pin(async move {
                let scope = RequestScope::from_request(&request);
                match handler(request).await {
                    Ok(response) => response.into_response(),
                    Err(err) => classifier
                        .classify(err.into(), scope.as_ref())
                        .to_response(),
                }
            })
        }
    }
}

/// 使用不带翻译器的分类器包装处理函数
pub fn public<H, Fut, R, E>(
    handler: H,
) -> impl Fn(Request) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static
where
    H: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + 'static,
    E: Into<anyhow::Error> + 'static,
{
    ErrorBoundary::default().wrap(handler)
}
