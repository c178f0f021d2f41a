//! # graphbolt-driver
//!
//! An async client for graph databases that speak the Bolt protocol
//! (Neo4j, Memgraph and compatible servers).
//!
//! ## Features
//!
//! - **Bolt Protocol 4.4 - 5.4** - Packstream codec, chunked framing and version negotiation
//! - **Async/Await** - Built on Tokio, plain TCP or TLS via rustls
//! - **Connection Pooling** - Bounded pool with acquisition timeout and health checks
//! - **Transactions** - Auto-commit queries and explicit transactions with bookmarks
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use futures::FutureExt;
//! use graphbolt_driver::{AuthToken, Driver, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let driver = Driver::new(
//!         "bolt://localhost:7687",
//!         AuthToken::basic("neo4j", "password"),
//!     )?;
//!
//!     let names = driver
//!         .with_session(SessionConfig::default(), |session| {
//!             async move {
//!                 let result = session.run("MATCH (p:Person) RETURN p.name AS name").await?;
//!                 Ok(result
//!                     .filter_map(|record| record.get("name").and_then(|v| v.as_str()).map(str::to_string))
//!                     .collect::<Vec<_>>())
//!             }
//!             .boxed()
//!         })
//!         .await?;
//!
//!     println!("{:?}", names);
//!     driver.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Transactions
//!
//! A session holds at most one explicit transaction. Its bookmark is carried
//! into the next transaction begun by the same session.
//!
//! ```rust,no_run
//! # use futures::FutureExt;
//! # use graphbolt_driver::{AuthToken, Driver, Query, SessionConfig, TransactionConfig};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let driver = Driver::new("bolt://localhost:7687", AuthToken::basic("u", "p"))?;
//! driver
//!     .with_session(SessionConfig::default(), |session| {
//!         async move {
//!             session.begin_transaction(TransactionConfig::new()).await?;
//!             session
//!                 .run(Query::new("CREATE (n:Node {id: $id})").with_param("id", 1i64))
//!                 .await?;
//!             session.commit().await?;
//!             Ok(())
//!         }
//!         .boxed()
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Authentication
//!
//! ```rust
//! use graphbolt_driver::AuthToken;
//!
//! let basic = AuthToken::basic("username", "password");
//! let bearer = AuthToken::bearer("my-token");
//! let none = AuthToken::none();
//!
//! assert_eq!(basic.scheme(), "basic");
//! assert_eq!(bearer.to_auth_map().get_str("scheme"), Some("bearer"));
//! assert_eq!(none.scheme(), "none");
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use graphbolt_driver::{AuthToken, DriverConfig};
//! use std::time::Duration;
//!
//! let config = DriverConfig::builder()
//!     .uri("bolt+s://db.example.com:7687")
//!     .auth(AuthToken::basic("u", "p"))
//!     .with_max_connection_pool_size(50)
//!     .with_connection_timeout(Duration::from_secs(10))
//!     .build()
//!     .unwrap();
//!
//! assert!(config.encrypted);
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - Driver, pool, session and transaction types
//! - [`bolt`] - Low-level Bolt protocol implementation
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bolt;
pub mod driver;

// Re-exports for convenience
pub use driver::{
    AccessMode, AuthToken, Bookmark, Driver, DriverConfig, DriverConfigBuilder, DriverError,
    DriverResult, Query, QueryResult, Record, ResultSummary, ServerAddress, Session,
    SessionConfig, Transaction, TransactionConfig, Value,
};

pub use bolt::{BoltError, BoltVersion, PackStreamValue, ValueMap};

/// Config alias for convenience
pub type Config = DriverConfig;
