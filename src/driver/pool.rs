//! Connection Pool
//!
//! 연결 풀링
//!
//! 풀은 여러 태스크가 동시에 사용하는 공유 자원입니다. 유휴 연결 목록과
//! 전체 연결 수는 동기 뮤텍스로 보호하며, 뮤텍스를 잡은 채로 await 하지
//! 않습니다. 슬롯을 먼저 예약하고 연결 생성이나 상태 확인은 락 밖에서
//! 수행합니다. 연결을 기다리는 태스크는 [`Notify`]로 깨웁니다.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace, warn};

use super::bolt::{BoltConnection, ConnectionConfig};
use super::error::{DriverError, DriverResult};

// ============================================================================
// PoolConfig - 풀 설정
// ============================================================================

/// 연결 풀 설정
///
/// | 필드 | 기본값 | 설명 |
/// |------|--------|------|
/// | `max_size` | 100 | 최대 연결 수 (유휴 + 사용 중) |
/// | `acquisition_timeout` | 60초 | 연결 획득 대기 시간 |
/// | `validation_timeout` | 5초 | 유휴 연결 상태 확인 제한 시간 |
/// | `max_build_retries` | 3 | 연속 생성 실패 허용 횟수 (초과 시 troubled) |
/// | `connection` | 기본값 | 새 연결 설정 |
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// 최대 연결 수
    pub max_size: usize,
    /// 연결 획득 타임아웃
    pub acquisition_timeout: Duration,
    /// 유휴 연결 상태 확인 타임아웃 (남은 획득 시간을 넘지 않음)
    pub validation_timeout: Duration,
    /// 연속 생성 실패 허용 횟수
    pub max_build_retries: usize,
    /// 연결 설정
    pub connection: ConnectionConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            acquisition_timeout: Duration::from_secs(60),
            validation_timeout: Duration::from_secs(5),
            max_build_retries: 3,
            connection: ConnectionConfig::default(),
        }
    }
}

impl PoolConfig {
    /// 빌더 패턴으로 풀 설정 생성
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }
}

/// 풀 설정 빌더
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// 최대 연결 수 설정
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self
    }

    /// 획득 타임아웃 설정
    pub fn acquisition_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquisition_timeout = timeout;
        self
    }

    /// 상태 확인 타임아웃 설정
    pub fn validation_timeout(mut self, timeout: Duration) -> Self {
        self.config.validation_timeout = timeout;
        self
    }

    /// 생성 실패 허용 횟수 설정
    pub fn max_build_retries(mut self, retries: usize) -> Self {
        self.config.max_build_retries = retries;
        self
    }

    /// 연결 설정
    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.config.connection = connection;
        self
    }

    /// 설정 빌드
    pub fn build(self) -> PoolConfig {
        self.config
    }
}

// ============================================================================
// PoolMetrics - 풀 메트릭
// ============================================================================

/// 풀 메트릭 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// 전체 연결 수 (생성 중인 연결 포함)
    pub total: usize,
    /// 유휴 연결 수
    pub idle: usize,
    /// 사용 중인 연결 수
    pub in_use: usize,
    /// 총 획득 횟수
    pub acquired: u64,
    /// 총 생성 횟수
    pub created: u64,
    /// 총 제거 횟수
    pub evicted: u64,
    /// 총 타임아웃 횟수
    pub timeouts: u64,
    /// 총 생성 실패 횟수
    pub build_failures: u64,
    /// 연속 생성 실패로 문제 상태인지 여부
    pub troubled: bool,
}

// ============================================================================
// Internal state
// ============================================================================

struct PoolEntry {
    connection: BoltConnection,
    id: u64,
    created_at: Instant,
    last_used: Instant,
}

struct PoolState {
    idle: VecDeque<PoolEntry>,
    /// 유휴 + 사용 중 + 생성 중
    total: usize,
    closed: bool,
}

struct PoolShared {
    config: PoolConfig,
    state: Mutex<PoolState>,
    released: Notify,
    next_id: AtomicU64,
    acquired: AtomicU64,
    created: AtomicU64,
    evicted: AtomicU64,
    timeouts: AtomicU64,
    build_failures: AtomicU64,
    consecutive_failures: AtomicUsize,
    troubled: AtomicBool,
}

impl PoolShared {
    /// 슬롯 반납 (전체 수 감소 후 대기자 하나 깨움)
    fn free_slot(&self) {
        {
            let mut state = self.state.lock();
            state.total = state.total.saturating_sub(1);
        }
        self.released.notify_one();
    }

    /// 연결을 유휴 목록으로 되돌림. 재사용할 수 없으면 버림.
    fn release(&self, mut entry: PoolEntry, slot: &mut SlotGuard) {
        if !entry.connection.is_reusable() {
            self.evicted.fetch_add(1, Ordering::Relaxed);
            debug!(
                id = entry.id,
                state = ?entry.connection.state(),
                "Discarding connection that cannot be reused"
            );
            return;
        }

        entry.last_used = Instant::now();
        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            self.evicted.fetch_add(1, Ordering::Relaxed);
            trace!(id = entry.id, "Pool closed, dropping released connection");
            return;
        }
        trace!(id = entry.id, "Connection returned to pool");
        state.idle.push_back(entry);
        slot.disarm();
        drop(state);
        self.released.notify_one();
    }
}

/// 예약된 슬롯. 해제되지 않고 버려지면 전체 수를 줄이고 대기자를 깨웁니다.
struct SlotGuard {
    shared: Arc<PoolShared>,
    armed: bool,
}

impl SlotGuard {
    fn new(shared: Arc<PoolShared>) -> Self {
        Self { shared, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if self.armed {
            self.shared.free_slot();
        }
    }
}

enum Checkout {
    Idle(PoolEntry, SlotGuard),
    Build(SlotGuard),
    Full,
}

// ============================================================================
// PooledConnection - 풀링된 연결
// ============================================================================

const DEREF_ERR: &str = "PooledConnection used after release";

/// 풀에서 빌린 연결
///
/// `BoltConnection`으로 Deref 됩니다. 드롭되면 풀로 반환되고, 재사용할 수
/// 없는 상태(끊김, 실패, 응답을 기다리는 요청 존재)면 버려집니다.
pub struct PooledConnection {
    entry: Option<PoolEntry>,
    slot: SlotGuard,
}

impl PooledConnection {
    /// 풀 내부 연결 ID
    pub fn id(&self) -> u64 {
        self.entry().id
    }

    /// 생성 시간
    pub fn created_at(&self) -> Instant {
        self.entry().created_at
    }

    /// 마지막 반환 시간
    pub fn last_used(&self) -> Instant {
        self.entry().last_used
    }

    fn entry(&self) -> &PoolEntry {
        self.entry.as_ref().expect(DEREF_ERR)
    }

    /// 연결을 닫고 풀에서 제거
    async fn discard(mut self) {
        if let Some(mut entry) = self.entry.take() {
            if let Err(e) = entry.connection.close().await {
                trace!(id = entry.id, error = %e, "Close of evicted connection failed");
            }
            self.slot.shared.evicted.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Deref for PooledConnection {
    type Target = BoltConnection;

    fn deref(&self) -> &Self::Target {
        &self.entry().connection
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entry.as_mut().expect(DEREF_ERR).connection
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            let shared = Arc::clone(&self.slot.shared);
            shared.release(entry, &mut self.slot);
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("PooledConnection");
        if let Some(entry) = &self.entry {
            s.field("id", &entry.id)
                .field("connection", &entry.connection)
                .field("age", &entry.created_at.elapsed());
        }
        s.finish()
    }
}

// ============================================================================
// ConnectionPool - 연결 풀
// ============================================================================

/// 연결 풀
///
/// 복제해도 같은 풀을 가리킵니다.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// 새 연결 풀 생성 (연결은 필요할 때 생성)
    pub fn new(config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                config,
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    total: 0,
                    closed: false,
                }),
                released: Notify::new(),
                next_id: AtomicU64::new(1),
                acquired: AtomicU64::new(0),
                created: AtomicU64::new(0),
                evicted: AtomicU64::new(0),
                timeouts: AtomicU64::new(0),
                build_failures: AtomicU64::new(0),
                consecutive_failures: AtomicUsize::new(0),
                troubled: AtomicBool::new(false),
            }),
        }
    }

    /// 연결 획득
    ///
    /// 유휴 연결은 상태 확인을 통과해야 반환되고, 실패하면 제거됩니다.
    /// 상태 확인은 `validation_timeout`과 남은 획득 시간 중 짧은 쪽으로
    /// 제한되며, 응답이 없는 연결은 버려집니다.
    /// 유휴 연결이 없고 여유가 있으면 새로 생성합니다. 풀이 가득 차면
    /// `acquisition_timeout` 동안 반환을 기다리며, 시간이 지나면
    /// [`DriverError::PoolTimeout`]을 반환합니다.
    pub async fn acquire(&self) -> DriverResult<PooledConnection> {
        let timeout = self.shared.config.acquisition_timeout;
        let deadline = Instant::now() + timeout;

        loop {
            // 확인 전에 등록해야 그 사이의 반환 알림을 놓치지 않음
            let notified = self.shared.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.checkout()? {
                Checkout::Idle(entry, slot) => {
                    let mut pooled = PooledConnection {
                        entry: Some(entry),
                        slot,
                    };
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    let limit = self.shared.config.validation_timeout.min(remaining);
                    if pooled.is_viable(limit).await {
                        self.shared.acquired.fetch_add(1, Ordering::Relaxed);
                        trace!(id = pooled.id(), "Reusing idle connection");
                        return Ok(pooled);
                    }
                    debug!(id = pooled.id(), "Evicting idle connection that failed its health check");
                    pooled.discard().await;
                }
                Checkout::Build(slot) => return self.build(slot).await,
                Checkout::Full => {
                    if timeout_at(deadline, notified).await.is_err() {
                        self.shared.timeouts.fetch_add(1, Ordering::Relaxed);
                        debug!(?timeout, "Timed out waiting for a pooled connection");
                        return Err(DriverError::PoolTimeout(timeout));
                    }
                }
            }
        }
    }

    fn checkout(&self) -> DriverResult<Checkout> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(DriverError::pool("Connection pool is closed"));
        }
        if let Some(entry) = state.idle.pop_front() {
            return Ok(Checkout::Idle(entry, SlotGuard::new(Arc::clone(&self.shared))));
        }
        if state.total < self.shared.config.max_size {
            state.total += 1;
            return Ok(Checkout::Build(SlotGuard::new(Arc::clone(&self.shared))));
        }
        Ok(Checkout::Full)
    }

    /// 예약된 슬롯에 새 연결 생성. 실패하면 슬롯은 반납됩니다.
    async fn build(&self, slot: SlotGuard) -> DriverResult<PooledConnection> {
        let shared = &self.shared;
        match BoltConnection::connect(&shared.config.connection).await {
            Ok(connection) => {
                shared.consecutive_failures.store(0, Ordering::Relaxed);
                if shared.troubled.swap(false, Ordering::Relaxed) {
                    debug!(address = connection.address(), "Connection pool recovered");
                }
                shared.created.fetch_add(1, Ordering::Relaxed);
                shared.acquired.fetch_add(1, Ordering::Relaxed);

                let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
                debug!(id, address = connection.address(), "Opened pooled connection");
                let now = Instant::now();
                Ok(PooledConnection {
                    entry: Some(PoolEntry {
                        connection,
                        id,
                        created_at: now,
                        last_used: now,
                    }),
                    slot,
                })
            }
            Err(e) => {
                shared.build_failures.fetch_add(1, Ordering::Relaxed);
                let failures = shared.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(failures, error = %e, "Failed to open pooled connection");
                if failures >= shared.config.max_build_retries
                    && !shared.troubled.swap(true, Ordering::Relaxed)
                {
                    warn!(
                        failures,
                        address = %shared.config.connection.address(),
                        "Connection pool is troubled"
                    );
                }
                Err(e)
            }
        }
    }

    /// 연결 반환 (드롭과 같음)
    pub fn release(&self, connection: PooledConnection) {
        drop(connection);
    }

    /// 연결을 빌려 작업 실행. 결과와 상관없이 연결은 반환됩니다.
    ///
    /// ```rust,ignore
    /// use futures::FutureExt;
    ///
    /// let id = pool
    ///     .with_connection(|conn| async move { Ok(conn.connection_id().map(str::to_string)) }.boxed())
    ///     .await?;
    /// ```
    pub async fn with_connection<T, F>(&self, work: F) -> DriverResult<T>
    where
        F: for<'c> FnOnce(&'c mut BoltConnection) -> BoxFuture<'c, DriverResult<T>>,
    {
        let mut connection = self.acquire().await?;
        let result = work(&mut connection).await;
        self.release(connection);
        result
    }

    /// 풀 닫기
    ///
    /// 유휴 연결을 모두 닫고, 기다리던 획득 요청은 에러로 깨웁니다. 사용 중인
    /// 연결은 반환될 때 닫힙니다. 개별 연결을 닫다 생긴 에러는 무시합니다.
    pub async fn close(&self) {
        let idle: Vec<PoolEntry> = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let idle: Vec<_> = state.idle.drain(..).collect();
            state.total = state.total.saturating_sub(idle.len());
            idle
        };
        self.shared.released.notify_waiters();

        debug!(idle = idle.len(), "Closing connection pool");
        for mut entry in idle {
            if let Err(e) = entry.connection.close().await {
                debug!(id = entry.id, error = %e, "Failed to close pooled connection");
            }
            self.shared.evicted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 닫힘 여부
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// 연속 생성 실패로 문제 상태인지 여부 (획득을 막지는 않음)
    pub fn is_troubled(&self) -> bool {
        self.shared.troubled.load(Ordering::Relaxed)
    }

    /// 풀 설정
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// 메트릭 조회
    pub fn metrics(&self) -> PoolMetrics {
        let (total, idle) = {
            let state = self.shared.state.lock();
            (state.total, state.idle.len())
        };
        let shared = &self.shared;

        PoolMetrics {
            total,
            idle,
            in_use: total - idle,
            acquired: shared.acquired.load(Ordering::Relaxed),
            created: shared.created.load(Ordering::Relaxed),
            evicted: shared.evicted.load(Ordering::Relaxed),
            timeouts: shared.timeouts.load(Ordering::Relaxed),
            build_failures: shared.build_failures.load(Ordering::Relaxed),
            troubled: shared.troubled.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metrics = self.metrics();
        f.debug_struct("ConnectionPool")
            .field("address", &self.shared.config.connection.address())
            .field("total", &metrics.total)
            .field("idle", &metrics.idle)
            .field("in_use", &metrics.in_use)
            .field("troubled", &metrics.troubled)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::{BoltRequest, RunMessage, ValueMap};
    use crate::driver::test_support::{MockBehavior, MockServer};
    use futures::FutureExt;

    fn pool_for(server: &MockServer, max_size: usize) -> ConnectionPool {
        ConnectionPool::new(
            PoolConfig::builder()
                .max_size(max_size)
                .connection(server.connection_config())
                .build(),
        )
    }

    #[test]
    fn test_pool_config_default() {
        let config = PoolConfig::default();
        assert_eq!(config.max_size, 100);
        assert_eq!(config.acquisition_timeout, Duration::from_secs(60));
        assert_eq!(config.max_build_retries, 3);
    }

    #[tokio::test]
    async fn test_third_acquire_waits_for_release() {
        let server = MockServer::start(MockBehavior::default()).await;
        let pool = pool_for(&server, 2);

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        assert_eq!(pool.metrics().in_use, 2);
        let released_id = first.connection_id().map(str::to_string);

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let conn = pool.acquire().await?;
                Ok::<_, DriverError>(conn.connection_id().map(str::to_string))
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        pool.release(first);
        let reused = waiter.await.unwrap().unwrap();
        assert_eq!(reused, released_id);
        assert_eq!(pool.metrics().created, 2);
        drop(second);
    }

    #[tokio::test]
    async fn test_acquire_times_out_when_exhausted() {
        let server = MockServer::start(MockBehavior::default()).await;
        let pool = ConnectionPool::new(
            PoolConfig::builder()
                .max_size(1)
                .acquisition_timeout(Duration::from_millis(50))
                .connection(server.connection_config())
                .build(),
        );

        let _held = pool.acquire().await.unwrap();
        let started = Instant::now();
        let err = pool.acquire().await.unwrap_err();
        let waited = started.elapsed();

        assert!(matches!(err, DriverError::PoolTimeout(_)), "got {:?}", err);
        assert!(err.is_retryable());
        assert!(waited >= Duration::from_millis(45), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(2), "waited {:?}", waited);
        assert_eq!(pool.metrics().timeouts, 1);
        assert_eq!(pool.metrics().total, 1);
    }

    #[tokio::test]
    async fn test_released_connection_is_reused() {
        let server = MockServer::start(MockBehavior::default()).await;
        let pool = pool_for(&server, 4);

        let conn = pool.acquire().await.unwrap();
        let id = conn.id();
        drop(conn);
        assert_eq!(pool.metrics().idle, 1);

        let conn = pool.acquire().await.unwrap();
        assert_eq!(conn.id(), id);
        let metrics = pool.metrics();
        assert_eq!(metrics.created, 1);
        assert_eq!(metrics.acquired, 2);
        assert_eq!(metrics.in_use, 1);
    }

    #[tokio::test]
    async fn test_dead_idle_connection_is_evicted() {
        let server = MockServer::start(MockBehavior::default()).await;
        let pool = pool_for(&server, 4);

        drop(pool.acquire().await.unwrap());
        server.disconnect_all().await;

        let conn = pool.acquire().await.unwrap();
        assert_eq!(conn.connection_id(), Some("bolt-2"));
        let metrics = pool.metrics();
        assert_eq!(metrics.evicted, 1);
        assert_eq!(metrics.created, 2);
        assert_eq!(metrics.total, 1);
    }

    #[tokio::test]
    async fn test_unresponsive_idle_connection_is_evicted_within_deadline() {
        let server = MockServer::start(MockBehavior::default().stalling_after_auth()).await;
        let pool = ConnectionPool::new(
            PoolConfig::builder()
                .max_size(1)
                .acquisition_timeout(Duration::from_millis(100))
                .connection(server.connection_config())
                .build(),
        );

        drop(pool.acquire().await.unwrap());
        assert_eq!(pool.metrics().idle, 1);

        let conn = tokio::time::timeout(Duration::from_secs(3), pool.acquire())
            .await
            .expect("acquire must not hang on a silent server")
            .unwrap();
        assert_eq!(conn.connection_id(), Some("bolt-2"));
        let metrics = pool.metrics();
        assert_eq!(metrics.evicted, 1);
        assert_eq!(metrics.total, 1);
    }

    #[tokio::test]
    async fn test_repeated_build_failures_mark_pool_troubled() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let pool = ConnectionPool::new(
            PoolConfig::builder()
                .max_size(1)
                .max_build_retries(2)
                .connection(ConnectionConfig::new("127.0.0.1", port))
                .build(),
        );

        assert!(pool.acquire().await.is_err());
        assert!(!pool.is_troubled());
        // The flag is advisory: the next attempt still tries to connect.
        assert!(pool.acquire().await.is_err());
        assert!(pool.is_troubled());

        let metrics = pool.metrics();
        assert_eq!(metrics.build_failures, 2);
        assert_eq!(metrics.total, 0);
    }

    #[tokio::test]
    async fn test_connection_with_unanswered_request_is_discarded() {
        let server = MockServer::start(MockBehavior::default()).await;
        let pool = pool_for(&server, 4);

        let mut conn = pool.acquire().await.unwrap();
        let run = RunMessage::new("RETURN 1", ValueMap::new(), ValueMap::new());
        conn.write_message(BoltRequest::Run(run)).await.unwrap();
        drop(conn);

        let metrics = pool.metrics();
        assert_eq!(metrics.idle, 0);
        assert_eq!(metrics.total, 0);
        assert_eq!(metrics.evicted, 1);
    }

    #[tokio::test]
    async fn test_with_connection_releases_on_error() {
        let server = MockServer::start(MockBehavior::default()).await;
        let pool = pool_for(&server, 4);

        let id = pool
            .with_connection(|conn| async move { Ok(conn.connection_id().map(str::to_string)) }.boxed())
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("bolt-1"));

        let err = pool
            .with_connection(|_conn| async move { Err::<(), _>(DriverError::session("boom")) }.boxed())
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Session(_)));

        let metrics = pool.metrics();
        assert_eq!(metrics.idle, 1);
        assert_eq!(metrics.in_use, 0);
    }

    #[tokio::test]
    async fn test_close_drains_and_rejects() {
        let server = MockServer::start(MockBehavior::default()).await;
        let pool = pool_for(&server, 1);

        let held = pool.acquire().await.unwrap();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        pool.close().await;
        assert!(pool.is_closed());
        assert!(matches!(waiter.await.unwrap(), Err(DriverError::Pool(_))));
        assert!(matches!(pool.acquire().await, Err(DriverError::Pool(_))));

        // A connection returned after close is dropped, not pooled.
        drop(held);
        let metrics = pool.metrics();
        assert_eq!(metrics.total, 0);
        assert_eq!(metrics.idle, 0);

        pool.close().await;
    }

    #[tokio::test]
    async fn test_close_says_goodbye_to_idle_connections() {
        let server = MockServer::start(MockBehavior::default()).await;
        let pool = pool_for(&server, 2);

        drop(pool.acquire().await.unwrap());
        pool.close().await;

        server.wait_for_requests(3).await;
        assert!(matches!(server.requests().last(), Some(BoltRequest::Goodbye)));
        assert_eq!(pool.metrics().evicted, 1);
    }
}
