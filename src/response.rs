//! # 响应辅助函数
//!
//! 处理函数写出成功响应时使用。

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// 以给定状态码写出 JSON 响应
///
/// 编码失败时退化为 500 纯文本。
pub fn json<T: Serialize + ?Sized>(status: StatusCode, data: &T) -> Response {
    match serde_json::to_vec(data) {
        Ok(body) => (
            status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode response");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode response").into_response()
        }
    }
}

/// 只写状态码，不带响应体
#[must_use]
pub fn status(status: StatusCode) -> Response {
    status.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde::ser::Error as _;
    use serde_json::json;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cannot encode"))
        }
    }

    #[tokio::test]
    async fn test_json_sets_status_and_content_type() {
        let response = json(StatusCode::CREATED, &json!({"id": 7, "name": "alice"}));

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"id": 7, "name": "alice"}));
    }

    #[tokio::test]
    async fn test_json_encoding_failure_falls_back() {
        let response = json(StatusCode::OK, &Unencodable);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Failed to encode response");
    }

    #[test]
    fn test_status_only() {
        let response = status(StatusCode::NO_CONTENT);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
