//! Transaction API
//!
//! 명시적 트랜잭션 (BEGIN / RUN+PULL / COMMIT / ROLLBACK)
//!
//! 트랜잭션은 연결을 소유하지 않습니다. 모든 동작은 호출자가 넘겨준
//! `&mut BoltConnection` 위에서 수행되며, 연결의 소유권은 세션(또는 풀)에
//! 남아 있습니다.

use std::time::Duration;

use tracing::{debug, warn};

use crate::bolt::{
    AccessMode, BeginMessage, BoltRequest, BoltResponse, PullMessage, RunMessage, SuccessMessage,
    ValueMap,
};

use super::bolt::BoltConnection;
use super::error::{DriverError, DriverResult};
use super::record::{QueryResult, ResultSummary};
use super::session::{Bookmark, Query};
use super::Value;

// ============================================================================
// TransactionConfig - 트랜잭션 설정
// ============================================================================

/// 트랜잭션 설정
#[derive(Debug, Clone, Default)]
pub struct TransactionConfig {
    /// 데이터베이스 (None이면 서버 기본값)
    pub database: Option<String>,
    /// 접근 모드 (None이면 쓰기)
    pub access_mode: Option<AccessMode>,
    /// 타임아웃
    pub timeout: Option<Duration>,
    /// 메타데이터
    pub metadata: ValueMap,
}

impl TransactionConfig {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 데이터베이스 설정
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// 접근 모드 설정
    pub fn with_access_mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = Some(mode);
        self
    }

    /// 타임아웃 설정
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 메타데이터 추가
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key, value);
        self
    }
}

// ============================================================================
// TransactionState - 트랜잭션 상태
// ============================================================================

/// 트랜잭션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// 활성 상태
    Active,
    /// 커밋됨
    Committed,
    /// 롤백됨
    RolledBack,
    /// 실패 (롤백만 가능)
    Failed,
}

impl TransactionState {
    /// 완료 상태 여부
    pub fn is_terminated(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

// ============================================================================
// Transaction - 트랜잭션
// ============================================================================

/// 명시적 트랜잭션
#[derive(Debug)]
pub struct Transaction {
    /// 상태
    state: TransactionState,
    /// BEGIN 응답 메타데이터
    metadata: ValueMap,
    /// BEGIN에 실린 데이터베이스
    database: Option<String>,
    /// 커밋 후 받은 북마크
    bookmark: Option<Bookmark>,
}

impl Transaction {
    /// 트랜잭션 시작
    ///
    /// 서버가 BEGIN을 거부하면 연결을 RESET한 뒤 쿼리 에러를 반환합니다.
    pub async fn begin(
        connection: &mut BoltConnection,
        config: &TransactionConfig,
        bookmarks: &[Bookmark],
    ) -> DriverResult<Self> {
        let bookmarks: Vec<String> = bookmarks
            .iter()
            .filter(|b| !b.is_empty())
            .map(|b| b.value().to_string())
            .collect();
        let extra = BeginMessage::metadata(
            &bookmarks,
            config.database.as_deref(),
            config.access_mode,
            config.timeout,
            Some(&config.metadata),
        );
        let begin = BeginMessage::new(extra, &connection.database_support());
        let database = begin.database().map(str::to_string);

        match connection.request(BoltRequest::Begin(begin)).await? {
            BoltResponse::Success(success) => {
                debug!(address = connection.address(), db = ?database, "Transaction started");
                Ok(Self {
                    state: TransactionState::Active,
                    metadata: success.metadata,
                    database,
                    bookmark: None,
                })
            }
            BoltResponse::Failure(failure) => {
                if let Err(e) = connection.reset().await {
                    debug!(error = %e, "Reset after BEGIN failure failed");
                }
                Err(DriverError::from_failure(failure))
            }
            other => Err(connection.unexpected(&other, "BEGIN")),
        }
    }

    /// 쿼리 실행
    ///
    /// 활성 상태에서만 가능합니다. 실패하면 트랜잭션은 `Failed`가 됩니다.
    pub async fn run(
        &mut self,
        connection: &mut BoltConnection,
        query: impl Into<Query>,
    ) -> DriverResult<QueryResult> {
        self.ensure_active()?;

        let result = Self::execute(connection, query.into()).await;
        if result.is_err() {
            self.state = TransactionState::Failed;
        }
        result
    }

    /// RUN + PULL 전체
    async fn execute(connection: &mut BoltConnection, query: Query) -> DriverResult<QueryResult> {
        let run = RunMessage::new(query.text, query.parameters, ValueMap::new());
        let header = match connection.request(BoltRequest::Run(run)).await? {
            BoltResponse::Success(success) => success,
            BoltResponse::Failure(failure) => return Err(DriverError::from_failure(failure)),
            other => return Err(connection.unexpected(&other, "RUN")),
        };

        let fields = header.fields();
        let pull = PullMessage::all().with_qid(header.qid());
        connection.write_message(BoltRequest::Pull(pull)).await?;

        let mut rows = Vec::new();
        loop {
            match connection.read_message().await? {
                BoltResponse::Record(record) => rows.push(record.fields),
                BoltResponse::Success(summary) => {
                    let summary = Self::summary(header, summary);
                    return Ok(QueryResult::new(fields, rows, summary));
                }
                BoltResponse::Failure(failure) => return Err(DriverError::from_failure(failure)),
                other => return Err(connection.unexpected(&other, "PULL")),
            }
        }
    }

    fn summary(header: SuccessMessage, pulled: SuccessMessage) -> ResultSummary {
        let mut metadata = header.metadata;
        metadata.remove("fields");
        metadata.extend_from(&pulled.metadata);
        ResultSummary::from_metadata(metadata)
    }

    /// 커밋
    ///
    /// 성공하면 서버가 돌려준 북마크를 반환합니다.
    pub async fn commit(&mut self, connection: &mut BoltConnection) -> DriverResult<Option<Bookmark>> {
        self.ensure_active()?;

        let response = match connection.request(BoltRequest::Commit).await {
            Ok(response) => response,
            Err(e) => {
                self.state = TransactionState::Failed;
                return Err(e);
            }
        };

        match response {
            BoltResponse::Success(success) => {
                self.state = TransactionState::Committed;
                self.bookmark = success.bookmark().map(Bookmark::new);
                debug!(address = connection.address(), bookmark = ?self.bookmark, "Transaction committed");
                Ok(self.bookmark.clone())
            }
            BoltResponse::Failure(failure) => {
                self.state = TransactionState::Failed;
                Err(DriverError::from_failure(failure))
            }
            other => {
                self.state = TransactionState::Failed;
                Err(connection.unexpected(&other, "COMMIT"))
            }
        }
    }

    /// 롤백
    ///
    /// 에러를 반환하지 않습니다. 서버가 ROLLBACK을 받아들이지 않으면 연결을
    /// RESET하고, 그것도 실패하면 로그만 남깁니다. 끝나면 항상 `RolledBack`입니다.
    pub async fn rollback(&mut self, connection: &mut BoltConnection) {
        if matches!(
            self.state,
            TransactionState::Committed | TransactionState::RolledBack
        ) {
            return;
        }

        match connection.request(BoltRequest::Rollback).await {
            Ok(BoltResponse::Success(_)) => {
                debug!(address = connection.address(), "Transaction rolled back");
            }
            Ok(other) => {
                warn!(
                    address = connection.address(),
                    response = other.name(),
                    "ROLLBACK not acknowledged, resetting connection"
                );
                if let Err(e) = connection.reset().await {
                    warn!(error = %e, "Reset after ROLLBACK failed");
                }
            }
            Err(e) => {
                warn!(address = connection.address(), error = %e, "ROLLBACK failed");
            }
        }
        self.state = TransactionState::RolledBack;
    }

    /// 활성 상태 확인
    fn ensure_active(&self) -> DriverResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => {
                Err(DriverError::transaction("Transaction already committed"))
            }
            TransactionState::RolledBack => {
                Err(DriverError::transaction("Transaction already rolled back"))
            }
            TransactionState::Failed => {
                Err(DriverError::transaction("Transaction in failed state"))
            }
        }
    }

    /// 트랜잭션 상태
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// 데이터베이스
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// BEGIN 응답 메타데이터
    pub fn metadata(&self) -> &ValueMap {
        &self.metadata
    }

    /// 커밋 북마크
    pub fn bookmark(&self) -> Option<&Bookmark> {
        self.bookmark.as_ref()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::test_support::{MockBehavior, MockServer};

    async fn connect(server: &MockServer) -> BoltConnection {
        BoltConnection::connect(&server.connection_config()).await.unwrap()
    }

    #[test]
    fn test_transaction_config() {
        let config = TransactionConfig::new()
            .with_database("movies")
            .with_access_mode(AccessMode::Read)
            .with_timeout(Duration::from_secs(30))
            .with_metadata("app", "test");

        assert_eq!(config.database.as_deref(), Some("movies"));
        assert_eq!(config.access_mode, Some(AccessMode::Read));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.metadata.get_str("app"), Some("test"));
    }

    #[test]
    fn test_transaction_state_terminated() {
        assert!(!TransactionState::Active.is_terminated());
        assert!(TransactionState::Committed.is_terminated());
        assert!(TransactionState::RolledBack.is_terminated());
        assert!(TransactionState::Failed.is_terminated());
    }

    #[tokio::test]
    async fn test_begin_run_commit() {
        let server = MockServer::start(MockBehavior::default()).await;
        let mut conn = connect(&server).await;

        let mut tx = Transaction::begin(&mut conn, &TransactionConfig::new(), &[]).await.unwrap();
        assert_eq!(tx.state(), TransactionState::Active);

        let result = tx.run(&mut conn, "RETURN 42 AS answer").await.unwrap();
        assert_eq!(result.fields(), ["answer"]);
        assert_eq!(result.summary().database.as_deref(), Some("neo4j"));
        let record = result.single().unwrap();
        assert_eq!(record.get("answer"), Some(&Value::Integer(42)));

        let bookmark = tx.commit(&mut conn).await.unwrap();
        assert_eq!(bookmark, Some(Bookmark::new("bm:bolt-1:1")));
        assert_eq!(tx.state(), TransactionState::Committed);
        assert!(conn.is_reusable());

        let pulls: Vec<_> = server
            .requests()
            .into_iter()
            .filter_map(|r| match r {
                BoltRequest::Pull(pull) => Some(pull),
                _ => None,
            })
            .collect();
        assert_eq!(pulls, vec![PullMessage::all().with_qid(Some(0))]);
    }

    #[tokio::test]
    async fn test_begin_carries_config_and_bookmarks() {
        let server = MockServer::start(MockBehavior::default()).await;
        let mut conn = connect(&server).await;

        let config = TransactionConfig::new()
            .with_database("movies")
            .with_access_mode(AccessMode::Read)
            .with_timeout(Duration::from_secs(5));
        let bookmarks = [Bookmark::new("bm:1"), Bookmark::new("")];
        let mut tx = Transaction::begin(&mut conn, &config, &bookmarks).await.unwrap();
        assert_eq!(tx.database(), Some("movies"));
        tx.rollback(&mut conn).await;

        let begin = server
            .requests()
            .into_iter()
            .find_map(|r| match r {
                BoltRequest::Begin(begin) => Some(begin),
                _ => None,
            })
            .unwrap();
        assert_eq!(begin.mode(), AccessMode::Read);
        assert_eq!(begin.database(), Some("movies"));
        assert_eq!(begin.bookmarks(), vec!["bm:1".to_string()]);
        assert_eq!(begin.tx_timeout(), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_failed_transaction_rejects_run_and_commit() {
        let server = MockServer::start(MockBehavior::default()).await;
        let mut conn = connect(&server).await;
        let mut tx = Transaction::begin(&mut conn, &TransactionConfig::new(), &[]).await.unwrap();

        let err = tx.run(&mut conn, "FAIL").await.unwrap_err();
        assert_eq!(err.code(), Some("Neo.ClientError.Statement.SyntaxError"));
        assert_eq!(tx.state(), TransactionState::Failed);

        assert!(matches!(
            tx.run(&mut conn, "RETURN 1").await,
            Err(DriverError::Transaction(_))
        ));
        assert!(matches!(tx.commit(&mut conn).await, Err(DriverError::Transaction(_))));

        // ROLLBACK is IGNORED by the failed server, the RESET recovers it.
        tx.rollback(&mut conn).await;
        assert_eq!(tx.state(), TransactionState::RolledBack);
        assert!(conn.is_reusable());
        assert!(matches!(server.requests().last(), Some(BoltRequest::Reset)));
    }

    #[tokio::test]
    async fn test_rollback_after_commit_is_noop() {
        let server = MockServer::start(MockBehavior::default()).await;
        let mut conn = connect(&server).await;
        let mut tx = Transaction::begin(&mut conn, &TransactionConfig::new(), &[]).await.unwrap();
        tx.commit(&mut conn).await.unwrap();

        let sent = server.requests().len();
        tx.rollback(&mut conn).await;
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(server.requests().len(), sent);
    }

    #[tokio::test]
    async fn test_commit_failure_marks_failed() {
        let server = MockServer::start(MockBehavior::default().failing_commit()).await;
        let mut conn = connect(&server).await;
        let mut tx = Transaction::begin(&mut conn, &TransactionConfig::new(), &[]).await.unwrap();

        let err = tx.commit(&mut conn).await.unwrap_err();
        assert!(matches!(err, DriverError::Query { .. }));
        assert_eq!(tx.state(), TransactionState::Failed);
        assert!(tx.bookmark().is_none());
    }

    #[tokio::test]
    async fn test_rollback_swallows_failure() {
        let server = MockServer::start(MockBehavior::default().failing_rollback()).await;
        let mut conn = connect(&server).await;
        let mut tx = Transaction::begin(&mut conn, &TransactionConfig::new(), &[]).await.unwrap();

        tx.rollback(&mut conn).await;
        assert_eq!(tx.state(), TransactionState::RolledBack);
        assert!(conn.is_reusable());
    }

    #[tokio::test]
    async fn test_rollback_survives_dropped_connection() {
        let server = MockServer::start(MockBehavior::default().dropping_on_rollback()).await;
        let mut conn = connect(&server).await;
        let mut tx = Transaction::begin(&mut conn, &TransactionConfig::new(), &[]).await.unwrap();

        tx.rollback(&mut conn).await;
        assert_eq!(tx.state(), TransactionState::RolledBack);
        assert!(!conn.is_connected());
    }
}
