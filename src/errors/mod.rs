//! Centralized error handling for the MediaWarp gateway
//!
//! # Error Categories
//!
//! - **Redirect Errors**: invalid seeds and redirect safety violations
//! - **Transform Errors**: response bodies that could not be rewritten
//! - **Upstream Errors**: media server queries
//! - **Storage Errors**: Alist endpoints
//!
//! # Usage
//!
//! ```rust
//! use mediawarp::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for redirect resolution Results
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Convenience type alias for media server Results
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Convenience type alias for storage Results
pub type StorageResult<T> = Result<T, StorageError>;
