//! Bolt protocol client for the driver.
//!
//! ```text
//! Driver
//!   └── ConnectionPool
//!         └── BoltConnection (TCP/TLS + framing + handshake)
//!               ├── BoltMessageCodec (wire layer)
//!               └── Vendor / HealthCheck (liveness probing)
//! ```

pub mod connection;
pub mod health;
pub mod route;
pub mod stream;

pub use connection::{BoltConnection, ConnectionConfig, ConnectionState};
pub use health::{HealthCheck, Vendor};
pub use route::RoutingInfo;
pub use stream::BoltStream;

/// Client user agent string
pub const CLIENT_USER_AGENT: &str = concat!("graphbolt-driver/", env!("CARGO_PKG_VERSION"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_user_agent() {
        assert!(CLIENT_USER_AGENT.starts_with("graphbolt-driver/"));
    }
}
