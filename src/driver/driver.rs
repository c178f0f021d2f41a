//! Driver
//!
//! 드라이버 인스턴스 및 설정. 드라이버는 단일 서버 주소에 대한 연결 풀을
//! 소유하고, 세션은 풀에서 빌린 연결 위에서만 존재합니다.

use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use crate::bolt::{BoltVersion, ValueMap};

use super::bolt::{ConnectionConfig, CLIENT_USER_AGENT};
use super::error::{DriverError, DriverResult};
use super::pool::{ConnectionPool, PoolConfig, PoolMetrics};
use super::session::{Session, SessionConfig};

/// 기본 Bolt 포트
pub const DEFAULT_PORT: u16 = 7687;

// ============================================================================
// AuthToken - 인증 토큰
// ============================================================================

/// 인증 토큰
#[derive(Clone, PartialEq, Eq, Default)]
pub enum AuthToken {
    /// 인증 없음
    #[default]
    None,
    /// Basic 인증 (사용자명/비밀번호)
    Basic {
        username: String,
        password: String,
        realm: Option<String>,
    },
    /// Bearer 토큰
    Bearer { token: String },
}

impl AuthToken {
    /// Basic 인증 토큰 생성
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
            realm: None,
        }
    }

    /// Basic 인증 토큰 생성 (realm 포함)
    pub fn basic_with_realm(
        username: impl Into<String>,
        password: impl Into<String>,
        realm: impl Into<String>,
    ) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
            realm: Some(realm.into()),
        }
    }

    /// Bearer 토큰 생성
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// 인증 없음
    pub fn none() -> Self {
        Self::None
    }

    /// 인증 스킴
    pub fn scheme(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Basic { .. } => "basic",
            Self::Bearer { .. } => "bearer",
        }
    }

    /// HELLO/LOGON에 실리는 Bolt 인증 맵
    pub fn to_auth_map(&self) -> ValueMap {
        let mut map = ValueMap::new();
        map.insert("scheme", self.scheme());
        match self {
            Self::None => {}
            Self::Basic {
                username,
                password,
                realm,
            } => {
                map.insert("principal", username.as_str());
                map.insert("credentials", password.as_str());
                if let Some(realm) = realm {
                    map.insert("realm", realm.as_str());
                }
            }
            Self::Bearer { token } => {
                map.insert("credentials", token.as_str());
            }
        }
        map
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic { username, realm, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .field("realm", realm)
                .finish(),
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
        }
    }
}

// ============================================================================
// ServerAddress - 서버 주소
// ============================================================================

/// 서버 주소
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    /// 호스트 (IPv6는 괄호 없이 저장)
    pub host: String,
    /// 포트
    pub port: u16,
}

impl ServerAddress {
    /// 새 서버 주소 생성
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host[:port]` 파싱
    ///
    /// IPv6 주소는 `[::1]:7687`처럼 괄호로 감싸야 합니다. 포트가 없으면 7687.
    pub fn parse(s: &str) -> DriverResult<Self> {
        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, after) = rest.split_once(']').ok_or_else(|| {
                DriverError::configuration(format!("Unterminated IPv6 address: {}", s))
            })?;
            let port = match after {
                "" => None,
                _ => Some(after.strip_prefix(':').ok_or_else(|| {
                    DriverError::configuration(format!("Invalid server address: {}", s))
                })?),
            };
            (host, port)
        } else if s.matches(':').count() > 1 {
            return Err(DriverError::configuration(format!(
                "IPv6 addresses must be bracketed: {}",
                s
            )));
        } else {
            match s.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (s, None),
            }
        };

        if host.is_empty() {
            return Err(DriverError::configuration(format!("Missing host: {}", s)));
        }

        let port = match port {
            Some(port) => port
                .parse()
                .map_err(|_| DriverError::configuration(format!("Invalid port: {}", port)))?,
            None => DEFAULT_PORT,
        };

        Ok(Self::new(host, port))
    }

    /// 소켓 주소로 변환
    pub fn to_socket_addr(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

/// URI 파싱 결과
struct ParsedUri {
    address: ServerAddress,
    encrypted: bool,
    verify_certificate: bool,
}

/// `scheme://host:port` 파싱. 스킴이 없으면 평문 연결로 취급합니다.
fn parse_uri(uri: &str) -> DriverResult<ParsedUri> {
    let (scheme, rest) = uri.split_once("://").unwrap_or(("bolt", uri));

    let (encrypted, verify_certificate) = match scheme {
        "bolt" | "neo4j" => (false, true),
        "bolt+s" | "neo4j+s" => (true, true),
        "bolt+ssc" | "neo4j+ssc" => (true, false),
        other => {
            return Err(DriverError::configuration(format!(
                "Unsupported URI scheme: {}",
                other
            )))
        }
    };

    // 경로와 쿼리 문자열은 무시 (라우팅 컨텍스트 미지원)
    let authority = rest.split(['/', '?']).next().unwrap_or_default();

    Ok(ParsedUri {
        address: ServerAddress::parse(authority)?,
        encrypted,
        verify_certificate,
    })
}

// ============================================================================
// DriverConfig - 드라이버 설정
// ============================================================================

/// 드라이버 설정
///
/// | 필드 | 기본값 |
/// |------|--------|
/// | `max_connection_pool_size` | 100 |
/// | `connection_acquisition_timeout` | 60초 |
/// | `connection_validation_timeout` | 5초 |
/// | `connection_timeout` | 30초 |
/// | `max_build_retries` | 3 |
/// | `protocol_versions` | 5.4, 5.2, 5.0, 4.4 |
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// 서버 주소
    pub address: ServerAddress,
    /// 인증 토큰
    pub auth: AuthToken,
    /// TLS 암호화
    pub encrypted: bool,
    /// 서버 인증서 검증
    pub verify_certificate: bool,
    /// 연결 풀 최대 크기
    pub max_connection_pool_size: usize,
    /// 연결 획득 타임아웃
    pub connection_acquisition_timeout: Duration,
    /// 유휴 연결 상태 확인 타임아웃
    pub connection_validation_timeout: Duration,
    /// 연결 타임아웃 (TCP, TLS, 핸드셰이크, 인증 포함)
    pub connection_timeout: Duration,
    /// 연속 연결 생성 실패 허용 횟수
    pub max_build_retries: usize,
    /// User Agent
    pub user_agent: String,
    /// 제안할 프로토콜 버전 (선호 순서)
    pub protocol_versions: Vec<BoltVersion>,
}

impl DriverConfig {
    /// URI와 인증 토큰으로 설정 생성
    pub fn new(uri: &str, auth: AuthToken) -> DriverResult<Self> {
        Self::builder().uri(uri).auth(auth).build()
    }

    /// 빌더 시작
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::default()
    }

    /// 설정 검증
    pub fn validate(&self) -> DriverResult<()> {
        if self.address.host.is_empty() {
            return Err(DriverError::configuration("Server host must not be empty"));
        }
        if self.max_connection_pool_size == 0 {
            return Err(DriverError::configuration(
                "max_connection_pool_size must be greater than zero",
            ));
        }
        if self.protocol_versions.is_empty() {
            return Err(DriverError::configuration("At least one protocol version is required"));
        }
        if self.protocol_versions.len() > 4 {
            return Err(DriverError::configuration(format!(
                "At most 4 protocol versions can be proposed, got {}",
                self.protocol_versions.len()
            )));
        }
        Ok(())
    }

    /// 개별 연결 설정
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.address.host.clone(), self.address.port)
            .with_auth(self.auth.to_auth_map())
            .with_tls(self.encrypted, self.verify_certificate)
            .with_versions(self.protocol_versions.clone())
            .with_connect_timeout(self.connection_timeout)
            .with_user_agent(self.user_agent.clone())
    }

    /// 연결 풀 설정
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::builder()
            .max_size(self.max_connection_pool_size)
            .acquisition_timeout(self.connection_acquisition_timeout)
            .validation_timeout(self.connection_validation_timeout)
            .max_build_retries(self.max_build_retries)
            .connection(self.connection_config())
            .build()
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            address: ServerAddress::default(),
            auth: AuthToken::default(),
            encrypted: false,
            verify_certificate: true,
            max_connection_pool_size: 100,
            connection_acquisition_timeout: Duration::from_secs(60),
            connection_validation_timeout: Duration::from_secs(5),
            connection_timeout: Duration::from_secs(30),
            max_build_retries: 3,
            user_agent: CLIENT_USER_AGENT.to_string(),
            protocol_versions: BoltVersion::DEFAULT_PROPOSALS.to_vec(),
        }
    }
}

// ============================================================================
// DriverConfigBuilder - 설정 빌더
// ============================================================================

/// 드라이버 설정 빌더
///
/// URI 파싱 에러는 `build()`에서 반환됩니다.
#[derive(Debug, Default)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
    error: Option<DriverError>,
}

impl DriverConfigBuilder {
    /// URI에서 주소와 TLS 설정을 가져옴
    pub fn uri(mut self, uri: &str) -> Self {
        match parse_uri(uri) {
            Ok(parsed) => {
                self.config.address = parsed.address;
                self.config.encrypted = parsed.encrypted;
                self.config.verify_certificate = parsed.verify_certificate;
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// 서버 주소 설정
    pub fn with_address(mut self, address: ServerAddress) -> Self {
        self.config.address = address;
        self
    }

    /// 인증 토큰 설정
    pub fn auth(mut self, auth: AuthToken) -> Self {
        self.config.auth = auth;
        self
    }

    /// TLS 설정
    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.config.encrypted = encrypted;
        self
    }

    /// 인증서 검증 설정
    pub fn with_verify_certificate(mut self, verify: bool) -> Self {
        self.config.verify_certificate = verify;
        self
    }

    /// 연결 풀 크기 설정
    pub fn with_max_connection_pool_size(mut self, size: usize) -> Self {
        self.config.max_connection_pool_size = size;
        self
    }

    /// 연결 획득 타임아웃 설정
    pub fn with_connection_acquisition_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_acquisition_timeout = timeout;
        self
    }

    /// 유휴 연결 상태 확인 타임아웃 설정
    pub fn with_connection_validation_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_validation_timeout = timeout;
        self
    }

    /// 연결 타임아웃 설정
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// 연속 생성 실패 허용 횟수 설정
    pub fn with_max_build_retries(mut self, retries: usize) -> Self {
        self.config.max_build_retries = retries;
        self
    }

    /// User Agent 설정
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// 제안할 프로토콜 버전 설정
    pub fn with_protocol_versions(mut self, versions: Vec<BoltVersion>) -> Self {
        self.config.protocol_versions = versions;
        self
    }

    /// 빌드
    pub fn build(self) -> DriverResult<DriverConfig> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.config.validate()?;
        Ok(self.config)
    }
}

// ============================================================================
// Driver - 드라이버
// ============================================================================

/// 그래프 데이터베이스 드라이버
///
/// ```rust,ignore
/// use futures::FutureExt;
///
/// let driver = Driver::new("bolt://localhost:7687", AuthToken::basic("neo4j", "password"))?;
/// let count = driver
///     .with_session(SessionConfig::default(), |session| {
///         async move {
///             let result = session.run("MATCH (n) RETURN count(n) AS c").await?;
///             Ok(result.single()?.get("c").and_then(|v| v.as_int()))
///         }
///         .boxed()
///     })
///     .await?;
/// driver.close().await;
/// ```
pub struct Driver {
    /// 설정
    config: DriverConfig,
    /// 연결 풀
    pool: ConnectionPool,
}

impl Driver {
    /// 새 드라이버 생성. 연결은 처음 필요할 때 만들어집니다.
    pub fn new(uri: &str, auth: AuthToken) -> DriverResult<Self> {
        let config = DriverConfig::new(uri, auth)?;
        Self::with_config(config)
    }

    /// 설정으로 드라이버 생성
    pub fn with_config(config: DriverConfig) -> DriverResult<Self> {
        config.validate()?;
        let pool = ConnectionPool::new(config.pool_config());
        debug!(address = %config.address, encrypted = config.encrypted, "Driver created");
        Ok(Self { config, pool })
    }

    /// 세션에서 작업 실행
    ///
    /// 풀에서 연결을 빌려 세션을 만들고 `work`를 실행합니다. 작업이 끝나면
    /// 남은 트랜잭션을 롤백하고 연결을 반환합니다.
    pub async fn with_session<T, F>(&self, config: SessionConfig, work: F) -> DriverResult<T>
    where
        F: for<'s, 'c> FnOnce(&'s mut Session<'c>) -> BoxFuture<'s, DriverResult<T>>,
    {
        let mut connection = self.pool.acquire().await?;
        let mut session = Session::new(&mut connection, config);
        let result = work(&mut session).await;
        session.close().await;
        self.pool.release(connection);
        result
    }

    /// 연결 테스트 (`RETURN 1` 실행)
    pub async fn verify_connectivity(&self) -> DriverResult<()> {
        self.with_session(SessionConfig::default(), |session| {
            async move { session.run("RETURN 1").await.map(|_| ()) }.boxed()
        })
        .await?;
        debug!(address = %self.config.address, "Connectivity verified");
        Ok(())
    }

    /// 드라이버 종료 (여러 번 호출해도 안전)
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// 열린 상태 확인
    pub fn is_open(&self) -> bool {
        !self.pool.is_closed()
    }

    /// 드라이버 설정
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// 메트릭 조회
    pub fn metrics(&self) -> PoolMetrics {
        self.pool.metrics()
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("address", &self.config.address)
            .field("encrypted", &self.config.encrypted)
            .field("open", &self.is_open())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
