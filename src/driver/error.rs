//! Driver Error Types
//!
//! 드라이버 에러 정의

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::bolt::{BoltError, FailureMessage, HandshakeError, PackStreamError};

// ============================================================================
// DriverError - 드라이버 에러
// ============================================================================

/// 드라이버 에러
#[derive(Error, Debug)]
pub enum DriverError {
    /// 연결 에러 (I/O 실패, 핸드셰이크/인증 실패)
    #[error("Connection error: {0}")]
    Connection(String),

    /// 인증 에러
    #[error("Authentication error: {code} - {message}")]
    Authentication { code: String, message: String },

    /// 프로토콜 에러
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 쿼리 에러 (서버 FAILURE)
    #[error("Query error: {code} - {message}")]
    Query { code: String, message: String },

    /// 풀 획득 타임아웃
    #[error("Timed out after {0:?} waiting for a pooled connection")]
    PoolTimeout(Duration),

    /// 풀 에러
    #[error("Pool error: {0}")]
    Pool(String),

    /// 트랜잭션 에러
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// 세션 에러
    #[error("Session error: {0}")]
    Session(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 타임아웃 에러
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 값 인코딩 에러
    #[error("Encoding error: {0}")]
    Encoding(#[from] PackStreamError),

    /// I/O 에러
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DriverError {
    /// 연결 에러 생성
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// 프로토콜 에러 생성
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// 쿼리 에러 생성
    pub fn query(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            code: code.into(),
            message: message.into(),
        }
    }

    /// 풀 에러 생성
    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }

    /// 트랜잭션 에러 생성
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// 세션 에러 생성
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 타임아웃 에러 생성
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// 서버 FAILURE를 쿼리 에러로 변환
    pub fn from_failure(failure: FailureMessage) -> Self {
        Self::Query {
            code: failure.code,
            message: failure.message,
        }
    }

    /// 서버 코드 (쿼리/인증 에러만)
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Query { code, .. } | Self::Authentication { code, .. } => Some(code),
            _ => None,
        }
    }

    /// 재시도 가능 여부
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::PoolTimeout(_) | Self::Timeout(_) | Self::Io(_) => true,
            Self::Query { code, .. } => is_retryable_code(code),
            _ => false,
        }
    }

    /// 연결이 더 이상 사용 불가능한 에러 여부
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Authentication { .. }
                | Self::Protocol(_)
                | Self::Timeout(_)
                | Self::Io(_)
        )
    }
}

/// 재시도 가능한 에러 코드 확인
fn is_retryable_code(code: &str) -> bool {
    code.contains("TransientError")
        || code == "Neo.ClientError.Cluster.NotALeader"
        || code == "Neo.ClientError.General.ForbiddenOnReadOnlyDatabase"
}

impl From<BoltError> for DriverError {
    fn from(err: BoltError) -> Self {
        match err {
            BoltError::Io(e) => Self::Connection(e.to_string()),
            BoltError::ConnectionClosed => Self::Connection("Connection closed by server".to_string()),
            BoltError::Handshake(e) => e.into(),
            BoltError::PackStream(e) => Self::Protocol(format!("Malformed message: {}", e)),
            BoltError::Protocol(msg) => Self::Protocol(msg),
            err @ BoltError::MessageTooLarge { .. } => Self::Protocol(err.to_string()),
        }
    }
}

impl From<HandshakeError> for DriverError {
    fn from(err: HandshakeError) -> Self {
        Self::Protocol(format!("Handshake failed: {}", err))
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 드라이버 결과 타입
pub type DriverResult<T> = Result<T, DriverError>;

// ============================================================================
// Tests
// ============================================================================
