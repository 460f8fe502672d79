//! Session management for connected hardware and app clients
//!
//! This module handles:
//! - Per-connection read loops and outbound frame queues
//! - Grouping connections into one session per account
//! - Fire-and-forget fan-out of device events to app connections

mod connection;
mod manager;
mod user_session;

pub use connection::{ChannelHandle, Connection, ConnectionId};
pub use manager::{SessionManager, SessionRegistry};
pub use user_session::{app_body, HardwareChannel, Session, UserKey};
