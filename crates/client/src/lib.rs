//! Client code for offgrid.
//!
//! This crate provides the HTTP fetch pipeline the proxy and the host use to
//! reach the network.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig};
