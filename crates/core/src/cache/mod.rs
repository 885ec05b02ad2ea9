//! Versioned, namespaced response cache.
//!
//! The proxy talks to storage through the [`CacheStore`] and
//! [`CacheNamespace`] traits. [`CacheDb`] implements both on SQLite with
//! async access via tokio-rusqlite:
//!
//! - One row per namespace, entries cascade on namespace deletion
//! - Request identity keys derived with SHA-256
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod namespaces;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use namespaces::Namespace;
pub use store::{CacheNamespace, CacheStore};
