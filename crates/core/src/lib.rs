//! Core types and shared functionality for offgrid.
//!
//! This crate provides:
//! - The offline cache proxy (eligibility, install, activate, fetch)
//! - Network and storage seams the proxy is generic over
//! - Namespaced cache implementation with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod proxy;

pub use cache::{CacheDb, CacheNamespace, CacheStore};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use fetch::{FetchError, NetworkFetcher};
pub use http::{PageResponse, ProxyRequest, RequestIdentity};
pub use proxy::{InstallReport, Intercept, OfflineCacheProxy, ProxyConfig, ResponseSource, Served};
