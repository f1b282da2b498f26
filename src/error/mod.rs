//! The crate's own error type, used outside of request handling.

pub use types::BoundaryError;

/// A `Result` type for setup-time operations (config, logging, serving).
pub type Result<T> = std::result::Result<T, BoundaryError>;

pub mod types;
