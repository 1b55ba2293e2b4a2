//! LexForge Common Library
//!
//! Shared code for the LexForge evidence services including:
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod metrics;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, ErrorCode, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default cross-encoder rerank model
pub const DEFAULT_RERANK_MODEL: &str = "BAAI/bge-reranker-large";
