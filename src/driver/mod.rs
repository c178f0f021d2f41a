//! Driver Module
//!
//! Bolt 그래프 데이터베이스 클라이언트
//!
//! # 구성
//!
//! - 드라이버 (Driver, DriverConfig, AuthToken)
//! - 연결 풀링 (ConnectionPool, PoolConfig)
//! - 세션 관리 (Session, SessionConfig, Bookmark)
//! - 트랜잭션 API (Transaction, TransactionConfig)
//! - 연결 계층 (bolt::BoltConnection)
//!
//! # Example
//!
//! ```ignore
//! use futures::FutureExt;
//! use graphbolt_driver::driver::{AuthToken, Driver, Query, SessionConfig, TransactionConfig};
//! use graphbolt_driver::params;
//!
//! let driver = Driver::new("bolt://localhost:7687", AuthToken::basic("neo4j", "password"))?;
//!
//! driver
//!     .with_session(SessionConfig::default().with_database("movies"), |session| {
//!         async move {
//!             // 자동 커밋 쿼리
//!             let result = session.run("MATCH (n) RETURN n LIMIT 10").await?;
//!             for record in result {
//!                 println!("{}", record);
//!             }
//!
//!             // 명시적 트랜잭션
//!             session.begin_transaction(TransactionConfig::new()).await?;
//!             let query = Query::new("CREATE (n:Person {name: $name})")
//!                 .with_params(params! { "name" => "Alice" });
//!             session.run(query).await?;
//!             session.commit().await?;
//!             Ok(())
//!         }
//!         .boxed()
//!     })
//!     .await?;
//!
//! driver.close().await;
//! ```

pub mod bolt;
#[allow(clippy::module_inception)]
mod driver;
mod error;
mod pool;
mod record;
mod session;
mod transaction;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports
pub use driver::{AuthToken, Driver, DriverConfig, DriverConfigBuilder, ServerAddress, DEFAULT_PORT};
pub use error::{DriverError, DriverResult};
pub use pool::{ConnectionPool, PoolConfig, PoolConfigBuilder, PoolMetrics, PooledConnection};
pub use record::{Counters, QueryResult, QueryType, Record, ResultSummary};
pub use session::{Bookmark, Query, Session, SessionConfig};
pub use transaction::{Transaction, TransactionConfig, TransactionState};

pub use crate::bolt::AccessMode;

/// 드라이버 값 타입 (Packstream 값)
pub type Value = crate::bolt::PackStreamValue;

/// 파라미터 맵 생성 매크로
///
/// ```ignore
/// let params = params! { "name" => "Alice", "age" => 30i64 };
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::bolt::ValueMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::bolt::ValueMap::new();
        $(
            map.insert($key, $crate::driver::Value::from($value));
        )+
        map
    }};
}
