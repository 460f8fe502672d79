//! Connection management for the persistent link to the server
//!
//! This module handles:
//! - Persistent connections with automatic reconnection and backoff
//! - Logging in with the device token after every connect
//! - Keep-alive pings and bidirectional frame streaming

mod manager;

pub use manager::{ConnectionConfig, ConnectionEvent, ConnectionManager};
