//! Bolt protocol connection for client-side use.
//!
//! Handles TCP/TLS connection, handshake, authentication and message framing.
//! A connection is single-plex: one request/response exchange at a time,
//! serialized by whoever holds `&mut BoltConnection`.

use std::fmt;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace, warn};

use crate::bolt::codec::DEFAULT_MAX_MESSAGE_SIZE;
use crate::bolt::handshake::HANDSHAKE_RESPONSE_SIZE;
use crate::bolt::{
    BoltError, BoltMessage, BoltMessageCodec, BoltRequest, BoltResponse, BoltVersion,
    DatabaseSupport, Handshake, HelloMessage, LogonMessage, PullMessage, RouteMessage,
    RunMessage, SuccessMessage, ValueMap,
};
use crate::driver::error::{DriverError, DriverResult};

use super::health::{HealthCheck, Vendor};
use super::route::RoutingInfo;
use super::stream::BoltStream;
use super::CLIENT_USER_AGENT;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected, or closed after an I/O error or explicit close
    Disconnected,
    /// Handshake and authentication completed
    Connected,
    /// Unrecoverable handshake, auth or protocol error; transport closed
    Failed,
}

/// Everything needed to open a connection.
#[derive(Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Wrap the stream in TLS
    pub secure: bool,
    /// Check the server certificate against the web PKI roots
    pub verify_certificate: bool,
    /// Bolt auth map (`scheme`, `principal`, `credentials`, ...)
    pub auth: ValueMap,
    pub user_agent: String,
    /// Proposed protocol versions, most preferred first (at most four)
    pub versions: Vec<BoltVersion>,
    /// Bound on TCP connect + TLS + handshake + HELLO/LOGON
    pub connect_timeout: Duration,
    pub max_message_size: usize,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_auth(mut self, auth: ValueMap) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_tls(mut self, secure: bool, verify_certificate: bool) -> Self {
        self.secure = secure;
        self.verify_certificate = verify_certificate;
        self
    }

    pub fn with_versions(mut self, versions: Vec<BoltVersion>) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// `host:port`, with IPv6 hosts bracketed.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7687,
            secure: false,
            verify_certificate: true,
            auth: [("scheme", "none")].into_iter().collect(),
            user_agent: CLIENT_USER_AGENT.to_string(),
            versions: BoltVersion::DEFAULT_PROPOSALS.to_vec(),
            connect_timeout: Duration::from_secs(30),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("address", &self.address())
            .field("secure", &self.secure)
            .field("verify_certificate", &self.verify_certificate)
            .field("auth_scheme", &self.auth.get_str("scheme"))
            .field("versions", &self.versions)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Client-side Bolt connection.
pub struct BoltConnection {
    /// Transport; `None` once closed
    stream: Option<BoltStream>,
    codec: BoltMessageCodec,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
    state: ConnectionState,
    protocol_version: Option<BoltVersion>,
    server_agent: Option<String>,
    connection_id: Option<String>,
    vendor: Vendor,
    address: String,
    /// Requests written whose summary has not been read yet
    outstanding: usize,
}

impl BoltConnection {
    /// Open a connection: transport, handshake, HELLO and (5.1+) LOGON.
    ///
    /// The whole sequence is bounded by `connect_timeout`; on timeout or
    /// failure the half-open transport is dropped.
    pub async fn connect(config: &ConnectionConfig) -> DriverResult<Self> {
        let handshake = Handshake::new(&config.versions)
            .map_err(|e| DriverError::configuration(e.to_string()))?;

        match tokio::time::timeout(config.connect_timeout, Self::establish(config, &handshake)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(address = %config.address(), timeout = ?config.connect_timeout, "Connection attempt timed out");
                Err(DriverError::timeout(format!(
                    "Connecting to {} timed out after {:?}",
                    config.address(),
                    config.connect_timeout
                )))
            }
        }
    }

    async fn establish(config: &ConnectionConfig, handshake: &Handshake) -> DriverResult<Self> {
        let address = config.address();
        let tcp = TcpStream::connect(&address)
            .await
            .map_err(|e| DriverError::connection(format!("Failed to connect to {}: {}", address, e)))?;

        // Enable TCP nodelay for lower latency
        tcp.set_nodelay(true).ok();

        let stream = if config.secure {
            BoltStream::tls(tcp, &config.host, config.verify_certificate)
                .await
                .map_err(|e| DriverError::connection(format!("TLS handshake with {} failed: {}", address, e)))?
        } else {
            BoltStream::Plain(tcp)
        };

        let mut conn = Self {
            stream: Some(stream),
            codec: BoltMessageCodec::with_max_size(config.max_message_size),
            read_buffer: BytesMut::with_capacity(8192),
            write_buffer: BytesMut::with_capacity(8192),
            state: ConnectionState::Connected,
            protocol_version: None,
            server_agent: None,
            connection_id: None,
            vendor: Vendor::Unknown,
            address,
            outstanding: 0,
        };

        if let Err(e) = conn.initialize(config, handshake).await {
            debug!(address = %conn.address, error = %e, "Connection setup failed");
            conn.fail();
            return Err(e);
        }

        debug!(
            address = %conn.address,
            version = ?conn.protocol_version,
            server = conn.server_agent.as_deref().unwrap_or("unknown"),
            connection_id = conn.connection_id.as_deref().unwrap_or("-"),
            "Connection established"
        );
        Ok(conn)
    }

    async fn initialize(&mut self, config: &ConnectionConfig, handshake: &Handshake) -> DriverResult<()> {
        let version = self.handshake(handshake).await?;
        self.hello(config, version).await
    }

    /// Send the magic preamble and proposals, read back the chosen version.
    async fn handshake(&mut self, handshake: &Handshake) -> DriverResult<BoltVersion> {
        let stream = self.stream.as_mut().ok_or_else(|| DriverError::connection("Connection is closed"))?;

        stream
            .write_all(&handshake.request_bytes())
            .await
            .map_err(|e| DriverError::connection(format!("Handshake write failed: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| DriverError::connection(format!("Handshake flush failed: {}", e)))?;

        let mut response = [0u8; HANDSHAKE_RESPONSE_SIZE];
        stream
            .read_exact(&mut response)
            .await
            .map_err(|e| DriverError::connection(format!("Handshake read failed: {}", e)))?;

        let version = handshake.negotiate(response)?;
        debug!(address = %self.address, %version, "Negotiated Bolt version");
        self.protocol_version = Some(version);
        Ok(version)
    }

    /// HELLO, then LOGON on 5.1+. Before 5.1 the auth map rides in HELLO.
    async fn hello(&mut self, config: &ConnectionConfig, version: BoltVersion) -> DriverResult<()> {
        let mut hello = HelloMessage::new(&config.user_agent);
        if version.supports_bolt_agent() {
            hello = hello.with_bolt_agent(CLIENT_USER_AGENT);
        }
        if !version.supports_logon() {
            hello = hello.with_auth(&config.auth);
        }

        let success = self.init_request(BoltRequest::Hello(hello)).await?;
        self.server_agent = success.server().map(str::to_string);
        self.connection_id = success.connection_id().map(str::to_string);
        self.vendor = Vendor::detect(self.server_agent.as_deref());

        if version.supports_logon() {
            self.init_request(BoltRequest::Logon(LogonMessage::new(config.auth.clone())))
                .await?;
        }
        Ok(())
    }

    /// A FAILURE during setup is fatal for the connection.
    async fn init_request(&mut self, request: BoltRequest) -> DriverResult<SuccessMessage> {
        let name = request.name();
        match self.request(request).await? {
            BoltResponse::Success(success) => Ok(success),
            BoltResponse::Failure(failure) if failure.is_security_error() => {
                Err(DriverError::Authentication {
                    code: failure.code,
                    message: failure.message,
                })
            }
            BoltResponse::Failure(failure) => {
                Err(DriverError::connection(format!("{} failed: {}", name, failure)))
            }
            other => Err(DriverError::protocol(format!(
                "Unexpected {} in response to {}",
                other.name(),
                name
            ))),
        }
    }

    /// Frame and send one request.
    ///
    /// Values that cannot be encoded fail with [`DriverError::Encoding`]
    /// before anything is written, so the connection stays usable.
    pub async fn write_message(&mut self, request: BoltRequest) -> DriverResult<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(DriverError::connection(format!("Connection to {} is closed", self.address)));
        };
        let name = request.name();
        let expects_response = !matches!(request, BoltRequest::Goodbye);

        self.write_buffer.clear();
        self.codec
            .encode(request, &mut self.write_buffer)
            .map_err(|e| match e {
                BoltError::PackStream(e) => DriverError::Encoding(e),
                other => DriverError::from(other),
            })?;
        trace!(address = %self.address, message = name, bytes = self.write_buffer.len(), "C: send");

        // Counted before the first byte goes out, so a write cancelled
        // halfway leaves the connection unusable.
        self.outstanding += 1;
        let mut written = stream.write_all(&self.write_buffer).await;
        if written.is_ok() {
            written = stream.flush().await;
        }
        if let Err(e) = written {
            let reason = format!("Write to {} failed: {}", self.address, e);
            return Err(self.broken(reason));
        }

        if !expects_response {
            self.outstanding -= 1;
        }
        Ok(())
    }

    /// Read the next response.
    ///
    /// Structures with an unregistered signature are logged and skipped.
    pub async fn read_message(&mut self) -> DriverResult<BoltResponse> {
        loop {
            match self.codec.decode(&mut self.read_buffer) {
                Ok(Some(BoltMessage::Response(response))) => {
                    trace!(address = %self.address, message = response.name(), "S: recv");
                    if response.is_summary() {
                        self.outstanding = self.outstanding.saturating_sub(1);
                    }
                    return Ok(response);
                }
                Ok(Some(BoltMessage::Unknown(unknown))) => {
                    warn!(
                        address = %self.address,
                        signature = unknown.signature,
                        fields = unknown.fields.len(),
                        "Skipping unrecognized server message"
                    );
                    continue;
                }
                Ok(Some(BoltMessage::Request(request))) => {
                    return Err(self.violation(format!("Server sent request message {}", request.name())));
                }
                Ok(None) => {}
                Err(e) => return Err(self.violation(e.to_string())),
            }

            let Some(stream) = self.stream.as_mut() else {
                return Err(DriverError::connection(format!("Connection to {} is closed", self.address)));
            };
            match stream.read_buf(&mut self.read_buffer).await {
                Ok(0) => {
                    let reason = format!("Connection to {} closed by server", self.address);
                    return Err(self.broken(reason));
                }
                Ok(_) => {}
                Err(e) => {
                    let reason = format!("Read from {} failed: {}", self.address, e);
                    return Err(self.broken(reason));
                }
            }
        }
    }

    /// Send a request and read its first response.
    pub async fn request(&mut self, request: BoltRequest) -> DriverResult<BoltResponse> {
        self.write_message(request).await?;
        self.read_message().await
    }

    /// Close the connection after a response that does not fit the exchange.
    pub(crate) fn unexpected(&mut self, response: &BoltResponse, context: &str) -> DriverError {
        self.violation(format!("Unexpected {} in response to {}", response.name(), context))
    }

    /// Clear server-side state with RESET.
    ///
    /// Responses still owed for earlier requests are drained first. If the
    /// RESET itself fails the connection is closed.
    pub async fn reset(&mut self) -> DriverResult<()> {
        let result = self.exchange_reset().await;
        if let Err(e) = &result {
            warn!(address = %self.address, error = %e, "RESET failed, closing connection");
            self.fail();
        }
        result
    }

    async fn exchange_reset(&mut self) -> DriverResult<()> {
        self.write_message(BoltRequest::Reset).await?;
        loop {
            let response = self.read_message().await?;
            if self.outstanding > 0 {
                continue;
            }
            return match response {
                BoltResponse::Success(_) => Ok(()),
                BoltResponse::Failure(failure) => {
                    Err(DriverError::connection(format!("RESET failed: {}", failure)))
                }
                other => Err(DriverError::protocol(format!(
                    "Unexpected {} in response to RESET",
                    other.name()
                ))),
            };
        }
    }

    /// Run the vendor's probe query and time it. The connection is reset
    /// afterwards whatever the outcome.
    pub async fn health_check(&mut self) -> HealthCheck {
        if !self.is_connected() {
            return HealthCheck::unhealthy(Duration::ZERO, "not connected");
        }

        let started = Instant::now();
        let outcome = self.probe(self.vendor.probe_query()).await;
        let latency = started.elapsed();

        if let Err(e) = self.reset().await {
            debug!(address = %self.address, error = %e, "Reset after health probe failed");
        }

        match outcome {
            Ok(detail) if self.is_connected() => {
                trace!(address = %self.address, ?latency, %detail, "Health probe passed");
                HealthCheck::healthy(latency, detail)
            }
            Ok(_) => HealthCheck::unhealthy(latency, "connection lost after probe"),
            Err(e) => {
                debug!(address = %self.address, vendor = %self.vendor, error = %e, "Health probe failed");
                HealthCheck::unhealthy(latency, e.to_string())
            }
        }
    }

    async fn probe(&mut self, query: &str) -> DriverResult<String> {
        let run = RunMessage::new(query, ValueMap::new(), ValueMap::new());
        match self.request(BoltRequest::Run(run)).await? {
            BoltResponse::Success(_) => {}
            BoltResponse::Failure(failure) => return Err(DriverError::from_failure(failure)),
            other => return Err(DriverError::protocol(format!("Unexpected {} in response to RUN", other.name()))),
        }

        self.write_message(BoltRequest::Pull(PullMessage::with_n(1))).await?;
        let mut detail = None;
        loop {
            match self.read_message().await? {
                BoltResponse::Record(record) => {
                    if detail.is_none() {
                        detail = record
                            .fields
                            .first()
                            .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string));
                    }
                }
                BoltResponse::Success(_) => return Ok(detail.unwrap_or_else(|| self.vendor.to_string())),
                BoltResponse::Failure(failure) => return Err(DriverError::from_failure(failure)),
                BoltResponse::Ignored => return Err(DriverError::protocol("Health probe was ignored")),
            }
        }
    }

    /// [`health_check`](Self::health_check) bounded by `limit`. A probe
    /// that does not finish in time abandons the connection.
    pub async fn health_check_within(&mut self, limit: Duration) -> HealthCheck {
        match tokio::time::timeout(limit, self.health_check()).await {
            Ok(check) => check,
            Err(_) => {
                debug!(address = %self.address, ?limit, "Health probe timed out");
                self.abandon();
                HealthCheck::unhealthy(limit, "health probe timed out")
            }
        }
    }

    /// Connected and answering a health probe within `limit`.
    pub async fn is_viable(&mut self, limit: Duration) -> bool {
        self.is_connected() && self.health_check_within(limit).await.healthy
    }

    /// Ask the server for its routing table (Bolt 4.3+).
    pub async fn route(
        &mut self,
        routing: ValueMap,
        bookmarks: Vec<String>,
        database: Option<String>,
    ) -> DriverResult<RoutingInfo> {
        match self.protocol_version {
            Some(v) if v.supports_route() => {}
            other => {
                return Err(DriverError::protocol(format!(
                    "ROUTE requires Bolt 4.3 or later, negotiated {:?}",
                    other
                )))
            }
        }

        let request = BoltRequest::Route(RouteMessage::new(routing, bookmarks, database));
        match self.request(request).await? {
            BoltResponse::Success(success) => RoutingInfo::from_success(&success)
                .ok_or_else(|| DriverError::protocol("ROUTE response without routing table")),
            BoltResponse::Failure(failure) => {
                if let Err(e) = self.reset().await {
                    debug!(error = %e, "Reset after ROUTE failure failed");
                }
                Err(DriverError::from_failure(failure))
            }
            other => Err(self.unexpected(&other, "ROUTE")),
        }
    }

    /// Send GOODBYE and shut the transport down.
    pub async fn close(&mut self) -> DriverResult<()> {
        if self.stream.is_none() {
            return Ok(());
        }

        let goodbye = self.write_message(BoltRequest::Goodbye).await;
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                trace!(address = %self.address, error = %e, "Shutdown after GOODBYE failed");
            }
        }
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Disconnected;
        }
        debug!(address = %self.address, "Connection closed");
        goodbye
    }

    /// Transport error: the stream is gone.
    fn broken(&mut self, reason: String) -> DriverError {
        warn!(address = %self.address, %reason, "Connection lost");
        self.stream = None;
        self.state = ConnectionState::Disconnected;
        DriverError::Connection(reason)
    }

    /// Protocol violation: the stream position is unknown, close it.
    fn violation(&mut self, reason: String) -> DriverError {
        warn!(address = %self.address, %reason, "Protocol violation, closing connection");
        self.fail();
        DriverError::Protocol(reason)
    }

    /// Drop the transport without GOODBYE. Used when the owner goes away
    /// mid-exchange and the server-side state is unknown.
    pub(crate) fn abandon(&mut self) {
        if self.stream.take().is_some() {
            debug!(address = %self.address, "Abandoning connection");
        }
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Disconnected;
        }
    }

    fn fail(&mut self) {
        self.stream = None;
        self.state = ConnectionState::Failed;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.stream.is_some()
    }

    /// Connected with no response still owed; safe to hand to another caller.
    pub fn is_reusable(&self) -> bool {
        self.is_connected() && self.outstanding == 0
    }

    pub fn protocol_version(&self) -> Option<BoltVersion> {
        self.protocol_version
    }

    /// Server identity string from HELLO, e.g. `Neo4j/5.13.0`.
    pub fn server_agent(&self) -> Option<&str> {
        self.server_agent.as_deref()
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn database_support(&self) -> DatabaseSupport {
        self.vendor.database_support()
    }

    pub fn is_encrypted(&self) -> bool {
        self.stream.as_ref().is_some_and(BoltStream::is_encrypted)
    }
}

impl fmt::Debug for BoltConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoltConnection")
            .field("address", &self.address)
            .field("state", &self.state)
            .field("protocol_version", &self.protocol_version)
            .field("server_agent", &self.server_agent)
            .field("connection_id", &self.connection_id)
            .field("outstanding", &self.outstanding)
            .finish()
    }
}
