//! # 错误元数据
//!
//! 在错误沿调用链向上返回时附加键值对上下文（用户 ID、资源名等）。
//! 装饰层对分类和客户端完全透明：`Display` 与被包装的错误一致，
//! 只有审计日志会通过 [`get_metadata`] 把这些键值对取出来。

use serde_json::Map;
use std::error::Error as StdError;
use std::fmt;

pub use serde_json::Value;

/// 带元数据的错误包装
pub struct MetadataError {
    source: anyhow::Error,
    pairs: Vec<Value>,
}

impl MetadataError {
    /// 本层附加的键值对（扁平序列，长度总是偶数）
    #[must_use]
    pub fn pairs(&self) -> &[Value] {
        &self.pairs
    }

    /// 被包装的错误
    #[must_use]
    pub const fn inner(&self) -> &anyhow::Error {
        &self.source
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl fmt::Debug for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataError")
            .field("source", &self.source)
            .field("pairs", &self.pairs)
            .finish()
    }
}

impl StdError for MetadataError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        let source: &(dyn StdError + 'static) = &*self.source;
        Some(source)
    }
}

/// 带前缀消息的错误包装，`Display` 为 `"{message}: {source}"`
#[derive(Debug)]
pub struct MessageError {
    message: String,
    source: anyhow::Error,
}

impl MessageError {
    /// 前缀消息
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 被包装的错误
    #[must_use]
    pub const fn inner(&self) -> &anyhow::Error {
        &self.source
    }
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.source)
    }
}

impl StdError for MessageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        let source: &(dyn StdError + 'static) = &*self.source;
        Some(source)
    }
}

/// 为错误附加键值对
///
/// `pairs` 按 `key, value, key, value, ...` 排列；奇数个元素时最后一个
/// 没有配对的键会被丢弃。
pub fn with_metadata<E, I>(err: E, pairs: I) -> anyhow::Error
where
    E: Into<anyhow::Error>,
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let mut pairs: Vec<Value> = pairs.into_iter().map(Into::into).collect();
    if pairs.len() % 2 != 0 {
        pairs.pop();
    }

    anyhow::Error::new(MetadataError {
        source: err.into(),
        pairs,
    })
}

/// 与 [`with_metadata`] 相同，但没有错误时什么也不做
pub fn wrap<E, I>(err: Option<E>, pairs: I) -> Option<anyhow::Error>
where
    E: Into<anyhow::Error>,
    I: IntoIterator,
    I::Item: Into<Value>,
{
    err.map(|err| with_metadata(err, pairs))
}

/// 为错误加上一段说明文字，保留原错误在链上
pub fn wrap_msg<E, M>(err: E, message: M) -> anyhow::Error
where
    E: Into<anyhow::Error>,
    M: Into<String>,
{
    anyhow::Error::new(MessageError {
        message: message.into(),
        source: err.into(),
    })
}

/// 按从内到外的顺序收集整条错误链上的元数据
///
/// 最早包装（最内层）的键值对排在最前面，这样折叠成映射时外层覆盖内层。
#[must_use]
pub fn get_metadata(err: &anyhow::Error) -> Vec<Value> {
    let layers: Vec<&MetadataError> = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<MetadataError>())
        .collect();

    layers
        .into_iter()
        .rev()
        .flat_map(|layer| layer.pairs.iter().cloned())
        .collect()
}

/// 将元数据折叠为字符串键映射，非字符串键被跳过
///
/// 没有任何元数据时返回 `None`。
#[must_use]
pub fn get_metadata_map(err: &anyhow::Error) -> Option<Map<String, Value>> {
    let pairs = get_metadata(err);
    if pairs.is_empty() {
        return None;
    }

    let mut map = Map::new();
    for pair in pairs.chunks_exact(2) {
        if let Value::String(key) = &pair[0] {
            map.insert(key.clone(), pair[1].clone());
        }
    }
    Some(map)
}

/// 错误链上是否存在元数据装饰
#[must_use]
pub fn has_metadata(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<MetadataError>())
}

/// 在 `Result` 上直接附加元数据，`Ok` 原样透传
pub trait ResultMetadataExt<T> {
    /// 失败时为错误附加键值对
    fn with_metadata<I>(self, pairs: I) -> anyhow::Result<T>
    where
        I: IntoIterator,
        I::Item: Into<Value>;
}

impl<T, E> ResultMetadataExt<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn with_metadata<I>(self, pairs: I) -> anyhow::Result<T>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.map_err(|err| with_metadata(err, pairs))
    }
}

/// 以扁平参数形式附加元数据
///
/// ```
/// use api_boundary::{metadata, metadata::get_metadata_map};
///
/// let err = metadata!(anyhow::anyhow!("db down"), "user_id", 42, "op", "load");
/// let map = get_metadata_map(&err).unwrap();
/// assert_eq!(map["user_id"], 42);
/// ```
#[macro_export]
macro_rules! metadata {
    ($err:expr $(, $item:expr)* $(,)?) => {{
        let pairs: ::std::vec::Vec<$crate::metadata::Value> =
            ::std::vec![$($crate::metadata::Value::from($item)),*];
        $crate::metadata::with_metadata($err, pairs)
    }};
}
