//! Command handling for hardware and app connections
//!
//! This module handles:
//! - Tracking what each connection is logged in as
//! - Routing decoded messages to the matching handler
//! - Turning handler outcomes into response frames

mod dispatcher;
pub mod handlers;

pub use dispatcher::{CommandDispatcher, ConnectionState, Role};
