//! Session Management
//!
//! 세션 관리
//!
//! 세션은 풀에서 빌린 연결 하나를 빌려 쓰며, 동시에 최대 하나의 명시적
//! 트랜잭션만 추적합니다. 커밋된 트랜잭션의 북마크는 다음 BEGIN에 실립니다.

use std::fmt;

use tracing::debug;

use crate::bolt::{AccessMode, ValueMap};

use super::bolt::BoltConnection;
use super::error::{DriverError, DriverResult};
use super::record::QueryResult;
use super::transaction::{Transaction, TransactionConfig, TransactionState};
use super::Value;

// ============================================================================
// Bookmark - 북마크
// ============================================================================

/// 인과적 일관성 북마크
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bookmark {
    /// 북마크 값
    value: String,
}

impl Bookmark {
    /// 새 북마크 생성
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// 북마크 값
    pub fn value(&self) -> &str {
        &self.value
    }

    /// 빈 북마크 여부
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Display for Bookmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl From<String> for Bookmark {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Bookmark {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// SessionConfig - 세션 설정
// ============================================================================

/// 세션 설정
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// 데이터베이스 이름
    pub database: Option<String>,
    /// 기본 접근 모드
    pub default_access_mode: Option<AccessMode>,
    /// 초기 북마크
    pub bookmarks: Vec<Bookmark>,
}

impl SessionConfig {
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
        self.default_access_mode = Some(mode);
        self
    }

    /// 북마크 설정
    pub fn with_bookmarks(mut self, bookmarks: Vec<Bookmark>) -> Self {
        self.bookmarks = bookmarks;
        self
    }
}

// ============================================================================
// Query - 쿼리
// ============================================================================

/// 쿼리
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// 쿼리 텍스트
    pub text: String,
    /// 파라미터
    pub parameters: ValueMap,
    /// 자동 커밋 트랜잭션의 접근 모드
    pub mode: Option<AccessMode>,
}

impl Query {
    /// 새 쿼리 생성
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: ValueMap::new(),
            mode: None,
        }
    }

    /// 파라미터 추가
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key, value);
        self
    }

    /// 파라미터들 추가
    pub fn with_params(mut self, params: ValueMap) -> Self {
        self.parameters.extend_from(&params);
        self
    }

    /// 접근 모드 설정
    pub fn with_mode(mut self, mode: AccessMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

impl From<&str> for Query {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Query {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// Session - 세션
// ============================================================================

/// 데이터베이스 세션
///
/// 연결을 빌려 쓰므로 세션의 수명은 체크아웃 기간을 넘지 못합니다.
pub struct Session<'c> {
    /// 빌린 연결
    connection: &'c mut BoltConnection,
    /// 세션 설정
    config: SessionConfig,
    /// 열린 명시적 트랜잭션
    transaction: Option<Transaction>,
    /// 다음 BEGIN에 실을 북마크
    bookmarks: Vec<Bookmark>,
}

impl<'c> Session<'c> {
    /// 새 세션 생성
    pub fn new(connection: &'c mut BoltConnection, config: SessionConfig) -> Self {
        let bookmarks = config.bookmarks.clone();
        Self {
            connection,
            config,
            transaction: None,
            bookmarks,
        }
    }

    /// 쿼리 실행
    ///
    /// 열린 트랜잭션이 있으면 그 안에서, 없으면 자동 커밋 트랜잭션
    /// (BEGIN, RUN, COMMIT)으로 실행합니다. 자동 커밋이 실패하면 롤백합니다.
    pub async fn run(&mut self, query: impl Into<Query>) -> DriverResult<QueryResult> {
        let query = query.into();

        if let Some(tx) = self.transaction.as_mut() {
            return tx.run(self.connection, query).await;
        }

        let config = self.transaction_config(TransactionConfig {
            access_mode: query.mode,
            ..TransactionConfig::default()
        });
        // 세션에 보관해야 실행 중 취소되면 드롭이 연결을 버립니다
        let tx = self
            .transaction
            .insert(Transaction::begin(self.connection, &config, &self.bookmarks).await?);

        let outcome = match tx.run(self.connection, query).await {
            Ok(result) => tx.commit(self.connection).await.map(|bookmark| (result, bookmark)),
            Err(e) => Err(e),
        };
        if outcome.is_err() {
            tx.rollback(self.connection).await;
        }
        self.transaction = None;

        let (result, bookmark) = outcome?;
        self.update_bookmarks(bookmark);
        Ok(result)
    }

    /// 명시적 트랜잭션 시작
    ///
    /// 비어 있는 데이터베이스와 접근 모드는 세션 설정으로 채웁니다.
    pub async fn begin_transaction(&mut self, config: TransactionConfig) -> DriverResult<()> {
        if self.transaction.is_some() {
            return Err(DriverError::session("A transaction is already open in this session"));
        }

        let config = self.transaction_config(config);
        let tx = Transaction::begin(self.connection, &config, &self.bookmarks).await?;
        self.transaction = Some(tx);
        Ok(())
    }

    /// 열린 트랜잭션 커밋
    ///
    /// 결과와 상관없이 트랜잭션은 세션에서 제거됩니다. 실패한 트랜잭션은
    /// 롤백을 거쳐 연결을 정리합니다.
    pub async fn commit(&mut self) -> DriverResult<Option<Bookmark>> {
        let Some(mut tx) = self.transaction.take() else {
            return Err(DriverError::session("No open transaction to commit"));
        };

        match tx.commit(self.connection).await {
            Ok(bookmark) => {
                self.update_bookmarks(bookmark.clone());
                Ok(bookmark)
            }
            Err(e) => {
                tx.rollback(self.connection).await;
                Err(e)
            }
        }
    }

    /// 열린 트랜잭션 롤백 (없으면 아무 것도 하지 않음)
    pub async fn rollback(&mut self) {
        if let Some(mut tx) = self.transaction.take() {
            tx.rollback(self.connection).await;
        }
    }

    /// 세션 닫기 (열린 트랜잭션은 롤백)
    pub async fn close(mut self) {
        if self.transaction.is_some() {
            debug!(address = self.connection.address(), "Rolling back open transaction on session close");
        }
        self.rollback().await;
    }

    /// 열린 트랜잭션
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    /// 열린 트랜잭션 상태
    pub fn transaction_state(&self) -> Option<TransactionState> {
        self.transaction.as_ref().map(Transaction::state)
    }

    /// 마지막 북마크
    pub fn last_bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    /// 세션 설정
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 빌린 연결
    pub fn connection(&self) -> &BoltConnection {
        self.connection
    }

    fn transaction_config(&self, mut config: TransactionConfig) -> TransactionConfig {
        if config.database.is_none() {
            config.database = self.config.database.clone();
        }
        if config.access_mode.is_none() {
            config.access_mode = self.config.default_access_mode;
        }
        config
    }

    fn update_bookmarks(&mut self, bookmark: Option<Bookmark>) {
        if let Some(bookmark) = bookmark {
            self.bookmarks = vec![bookmark];
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        // 트랜잭션이 열린 채 버려지면 (취소 등) 서버 상태를 알 수 없으므로 연결을 닫음
        if self.transaction.take().is_some() {
            self.connection.abandon();
        }
    }
}

impl fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.connection.address())
            .field("database", &self.config.database)
            .field("transaction", &self.transaction_state())
            .field("bookmarks", &self.bookmarks)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
