//! Pluggable byte transports for the server connection

mod tcp;
mod traits;

pub use tcp::TcpConnector;
pub use traits::{TransportConnector, TransportStream};
