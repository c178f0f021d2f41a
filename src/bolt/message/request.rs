//! Bolt protocol request messages.
//!
//! Request messages are sent from the client to the server. Constructors
//! normalize their metadata maps so the server always sees the compact form:
//! single-character access mode, and a database key only where the backend
//! accepts it.

use std::fmt;
use std::time::Duration;

use super::tag;
use crate::bolt::packstream::{PackStreamError, PackStreamStructure, PackStreamValue, ValueMap};

/// Access mode for transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Read-write access (default)
    #[default]
    Write,
    /// Read-only access
    Read,
}

impl AccessMode {
    /// Parse a mode string; anything starting with `r` is read.
    pub fn parse(s: &str) -> Self {
        if s.starts_with(['r', 'R']) {
            AccessMode::Read
        } else {
            AccessMode::Write
        }
    }

    /// Wire form used in metadata maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "r",
            AccessMode::Write => "w",
        }
    }
}

/// Whether the backend accepts a `db` key in transaction metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSupport {
    /// The backend rejects database selection; the key is stripped.
    Rejected,
    /// The backend accepts database selection; `default` is filled in when
    /// an access mode is given without a database.
    Accepted { default: String },
}

impl Default for DatabaseSupport {
    fn default() -> Self {
        DatabaseSupport::Accepted {
            default: "neo4j".to_string(),
        }
    }
}

/// All Bolt request messages.
#[derive(Debug, Clone, PartialEq)]
pub enum BoltRequest {
    /// HELLO - Initialize connection
    Hello(HelloMessage),
    /// GOODBYE - Close connection gracefully
    Goodbye,
    /// RESET - Reset connection state
    Reset,
    /// RUN - Execute a query
    Run(RunMessage),
    /// PULL - Pull results
    Pull(PullMessage),
    /// DISCARD - Discard results
    Discard(DiscardMessage),
    /// BEGIN - Start transaction
    Begin(BeginMessage),
    /// COMMIT - Commit transaction
    Commit,
    /// ROLLBACK - Rollback transaction
    Rollback,
    /// ROUTE - Request routing information (Bolt 4.3+)
    Route(RouteMessage),
    /// LOGON - Authenticate (Bolt 5.1+)
    Logon(LogonMessage),
    /// LOGOFF - Deauthenticate (Bolt 5.1+)
    Logoff,
    /// TELEMETRY - Report driver API usage (Bolt 5.4+)
    Telemetry(TelemetryMessage),
}

impl BoltRequest {
    /// Get the message tag.
    pub fn tag(&self) -> u8 {
        match self {
            BoltRequest::Hello(_) => tag::HELLO,
            BoltRequest::Goodbye => tag::GOODBYE,
            BoltRequest::Reset => tag::RESET,
            BoltRequest::Run(_) => tag::RUN,
            BoltRequest::Pull(_) => tag::PULL,
            BoltRequest::Discard(_) => tag::DISCARD,
            BoltRequest::Begin(_) => tag::BEGIN,
            BoltRequest::Commit => tag::COMMIT,
            BoltRequest::Rollback => tag::ROLLBACK,
            BoltRequest::Route(_) => tag::ROUTE,
            BoltRequest::Logon(_) => tag::LOGON,
            BoltRequest::Logoff => tag::LOGOFF,
            BoltRequest::Telemetry(_) => tag::TELEMETRY,
        }
    }

    /// Get message name for logging.
    pub fn name(&self) -> &'static str {
        super::registry::name_of(self.tag())
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> PackStreamStructure {
        match self {
            BoltRequest::Hello(msg) => msg.to_structure(),
            BoltRequest::Run(msg) => msg.to_structure(),
            BoltRequest::Pull(msg) => msg.to_structure(tag::PULL),
            BoltRequest::Discard(msg) => msg.to_structure(tag::DISCARD),
            BoltRequest::Begin(msg) => msg.to_structure(),
            BoltRequest::Route(msg) => msg.to_structure(),
            BoltRequest::Logon(msg) => msg.to_structure(),
            BoltRequest::Telemetry(msg) => msg.to_structure(),
            BoltRequest::Goodbye
            | BoltRequest::Reset
            | BoltRequest::Commit
            | BoltRequest::Rollback
            | BoltRequest::Logoff => PackStreamStructure::new(self.tag(), vec![]),
        }
    }
}

pub(crate) fn map_field(
    s: &PackStreamStructure,
    index: usize,
    what: &str,
) -> Result<ValueMap, PackStreamError> {
    match s.field(index) {
        None => Ok(ValueMap::new()),
        Some(PackStreamValue::Map(m)) => Ok(m.clone()),
        Some(other) => Err(PackStreamError::InvalidStructure(format!(
            "{} must be a map, got {}",
            what,
            other.type_name()
        ))),
    }
}

pub(crate) fn string_list(value: Option<&PackStreamValue>) -> Vec<String> {
    value
        .and_then(PackStreamValue::as_list)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// HELLO message - Initialize connection.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloMessage {
    /// Client identification and, before Bolt 5.1, the auth token
    pub extra: ValueMap,
}

impl HelloMessage {
    /// Create a new HELLO message.
    pub fn new(user_agent: &str) -> Self {
        let mut extra = ValueMap::new();
        extra.insert("user_agent", user_agent);
        Self { extra }
    }

    /// Merge an auth token into the HELLO metadata (Bolt < 5.1).
    pub fn with_auth(mut self, auth: &ValueMap) -> Self {
        self.extra.extend_from(auth);
        self
    }

    /// Attach structured agent information (Bolt 5.3+).
    pub fn with_bolt_agent(mut self, product: &str) -> Self {
        let agent: ValueMap = [
            ("product", product.to_string()),
            ("platform", format!("{}; {}", std::env::consts::OS, std::env::consts::ARCH)),
            ("language", "Rust".to_string()),
        ]
        .into_iter()
        .collect();
        self.extra.insert("bolt_agent", agent);
        self
    }

    /// Set routing context.
    pub fn with_routing(mut self, routing: ValueMap) -> Self {
        self.extra.insert("routing", routing);
        self
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.extra.get_str("user_agent")
    }

    /// Auth scheme carried inline, if any.
    pub fn scheme(&self) -> Option<&str> {
        self.extra.get_str("scheme")
    }

    pub fn to_structure(&self) -> PackStreamStructure {
        PackStreamStructure::new(tag::HELLO, vec![self.extra.clone().into()])
    }

    pub fn from_structure(s: &PackStreamStructure) -> Result<Self, PackStreamError> {
        Ok(Self {
            extra: map_field(s, 0, "HELLO extra")?,
        })
    }
}

/// LOGON message - Authenticate (Bolt 5.1+).
#[derive(Clone, PartialEq)]
pub struct LogonMessage {
    /// Auth token: `scheme`, `principal`, `credentials`, ...
    pub auth: ValueMap,
}

impl LogonMessage {
    pub fn new(auth: ValueMap) -> Self {
        Self { auth }
    }

    pub fn scheme(&self) -> Option<&str> {
        self.auth.get_str("scheme")
    }

    pub fn principal(&self) -> Option<&str> {
        self.auth.get_str("principal")
    }

    pub fn to_structure(&self) -> PackStreamStructure {
        PackStreamStructure::new(tag::LOGON, vec![self.auth.clone().into()])
    }

    pub fn from_structure(s: &PackStreamStructure) -> Result<Self, PackStreamError> {
        Ok(Self {
            auth: map_field(s, 0, "LOGON auth")?,
        })
    }
}

impl fmt::Debug for LogonMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogonMessage")
            .field("scheme", &self.scheme())
            .field("principal", &self.principal())
            .field("credentials", &"<redacted>")
            .finish()
    }
}

/// RUN message - Execute a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMessage {
    /// Query string
    pub query: String,
    /// Query parameters
    pub parameters: ValueMap,
    /// Extra metadata (bookmarks, mode, db, tx_timeout, ...)
    pub metadata: ValueMap,
}

impl RunMessage {
    /// Create a RUN message. A multi-character `mode` is cut to its first
    /// character.
    pub fn new(query: impl Into<String>, parameters: ValueMap, mut metadata: ValueMap) -> Self {
        if let Some(first) = metadata.get_str("mode").and_then(|m| m.chars().next()) {
            metadata.insert("mode", first.to_string());
        }
        Self {
            query: query.into(),
            parameters,
            metadata,
        }
    }

    pub fn mode(&self) -> Option<&str> {
        self.metadata.get_str("mode")
    }

    pub fn to_structure(&self) -> PackStreamStructure {
        PackStreamStructure::new(
            tag::RUN,
            vec![
                self.query.as_str().into(),
                self.parameters.clone().into(),
                self.metadata.clone().into(),
            ],
        )
    }

    pub fn from_structure(s: &PackStreamStructure) -> Result<Self, PackStreamError> {
        let query = s
            .field(0)
            .and_then(PackStreamValue::as_str)
            .ok_or_else(|| PackStreamError::InvalidStructure("RUN query must be string".to_string()))?
            .to_string();

        Ok(Self {
            query,
            parameters: map_field(s, 1, "RUN parameters")?,
            metadata: map_field(s, 2, "RUN metadata")?,
        })
    }
}

/// PULL/DISCARD body: how many records and for which query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    /// Number of records (-1 for all)
    pub n: i64,
    /// Query ID inside an explicit transaction
    pub qid: Option<i64>,
}

/// PULL message - Pull query results.
pub type PullMessage = StreamRequest;
/// DISCARD message - Discard query results.
pub type DiscardMessage = StreamRequest;

impl StreamRequest {
    /// All remaining records of the last query.
    pub fn all() -> Self {
        Self { n: -1, qid: None }
    }

    pub fn with_n(n: i64) -> Self {
        Self { n, qid: None }
    }

    pub fn with_qid(mut self, qid: Option<i64>) -> Self {
        self.qid = qid;
        self
    }

    fn to_structure(self, tag: u8) -> PackStreamStructure {
        let mut extra = ValueMap::with_capacity(2);
        extra.insert("n", self.n);
        if let Some(qid) = self.qid {
            extra.insert("qid", qid);
        }
        PackStreamStructure::new(tag, vec![extra.into()])
    }

    pub fn from_structure(s: &PackStreamStructure) -> Result<Self, PackStreamError> {
        let extra = map_field(s, 0, "PULL/DISCARD extra")?;
        Ok(Self {
            n: extra.get_int("n").unwrap_or(-1),
            qid: extra.get_int("qid"),
        })
    }
}

/// BEGIN message - Start a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct BeginMessage {
    /// Normalized transaction metadata
    pub metadata: ValueMap,
}

impl BeginMessage {
    /// Create a BEGIN message.
    ///
    /// `mode` defaults to write and is cut to one character. For backends
    /// that reject database selection the `db` key is removed; otherwise,
    /// when the caller supplied a mode but no database, the default database
    /// is filled in.
    pub fn new(mut metadata: ValueMap, support: &DatabaseSupport) -> Self {
        let mode_given = metadata.contains_key("mode");
        let mode = metadata
            .get_str("mode")
            .map(AccessMode::parse)
            .unwrap_or_default();
        metadata.insert("mode", mode.as_str());

        match support {
            DatabaseSupport::Rejected => {
                metadata.remove("db");
            }
            DatabaseSupport::Accepted { default } => {
                if mode_given && !metadata.contains_key("db") {
                    metadata.insert("db", default.as_str());
                }
            }
        }

        Self { metadata }
    }

    /// Build BEGIN metadata from typed parts.
    pub fn metadata(
        bookmarks: &[String],
        database: Option<&str>,
        mode: Option<AccessMode>,
        timeout: Option<Duration>,
        tx_metadata: Option<&ValueMap>,
    ) -> ValueMap {
        let mut extra = ValueMap::new();
        if !bookmarks.is_empty() {
            extra.insert("bookmarks", bookmarks.to_vec());
        }
        if let Some(db) = database {
            extra.insert("db", db);
        }
        if let Some(mode) = mode {
            extra.insert("mode", mode.as_str());
        }
        if let Some(timeout) = timeout {
            extra.insert("tx_timeout", timeout.as_millis() as i64);
        }
        if let Some(meta) = tx_metadata.filter(|m| !m.is_empty()) {
            extra.insert("tx_metadata", meta.clone());
        }
        extra
    }

    pub fn mode(&self) -> AccessMode {
        self.metadata.get_str("mode").map(AccessMode::parse).unwrap_or_default()
    }

    pub fn database(&self) -> Option<&str> {
        self.metadata.get_str("db")
    }

    pub fn bookmarks(&self) -> Vec<String> {
        string_list(self.metadata.get("bookmarks"))
    }

    pub fn tx_timeout(&self) -> Option<Duration> {
        self.metadata
            .get_int("tx_timeout")
            .map(|ms| Duration::from_millis(ms.max(0) as u64))
    }

    pub fn to_structure(&self) -> PackStreamStructure {
        PackStreamStructure::new(tag::BEGIN, vec![self.metadata.clone().into()])
    }

    /// Parse without normalizing; the wire form is taken as-is.
    pub fn from_structure(s: &PackStreamStructure) -> Result<Self, PackStreamError> {
        Ok(Self {
            metadata: map_field(s, 0, "BEGIN extra")?,
        })
    }
}

/// ROUTE message - Get routing information (Bolt 4.3+).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteMessage {
    /// Routing context
    pub routing: ValueMap,
    /// Bookmarks
    pub bookmarks: Vec<String>,
    /// Database name
    pub database: Option<String>,
}

impl RouteMessage {
    pub fn new(routing: ValueMap, bookmarks: Vec<String>, database: Option<String>) -> Self {
        Self {
            routing,
            bookmarks,
            database,
        }
    }

    /// Bolt 4.4+ carries the database inside an extra map.
    pub fn to_structure(&self) -> PackStreamStructure {
        let mut extra = ValueMap::new();
        if let Some(db) = &self.database {
            extra.insert("db", db.as_str());
        }
        PackStreamStructure::new(
            tag::ROUTE,
            vec![
                self.routing.clone().into(),
                self.bookmarks.clone().into(),
                extra.into(),
            ],
        )
    }

    pub fn from_structure(s: &PackStreamStructure) -> Result<Self, PackStreamError> {
        let database = match s.field(2) {
            Some(PackStreamValue::Map(extra)) => extra.get_str("db").map(str::to_string),
            Some(PackStreamValue::String(db)) => Some(db.clone()),
            _ => None,
        };
        Ok(Self {
            routing: map_field(s, 0, "ROUTE routing")?,
            bookmarks: string_list(s.field(1)),
            database,
        })
    }
}

/// TELEMETRY message - API usage hint (Bolt 5.4+).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryMessage {
    /// 0 managed tx, 1 explicit tx, 2 implicit tx, 3 driver-level query
    pub api: i64,
}

impl TelemetryMessage {
    pub fn new(api: i64) -> Self {
        Self { api }
    }

    pub fn to_structure(&self) -> PackStreamStructure {
        let extra: ValueMap = [("api", self.api)].into_iter().collect();
        PackStreamStructure::new(tag::TELEMETRY, vec![extra.into()])
    }

    pub fn from_structure(s: &PackStreamStructure) -> Result<Self, PackStreamError> {
        let extra = map_field(s, 0, "TELEMETRY extra")?;
        Ok(Self {
            api: extra.get_int("api").unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(entries: &[(&str, &str)]) -> ValueMap {
        entries.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_access_mode_parse() {
        assert_eq!(AccessMode::parse("read"), AccessMode::Read);
        assert_eq!(AccessMode::parse("r"), AccessMode::Read);
        assert_eq!(AccessMode::parse("write"), AccessMode::Write);
        assert_eq!(AccessMode::parse(""), AccessMode::Write);
    }

    #[test]
    fn test_run_truncates_mode() {
        let run = RunMessage::new("RETURN 1", ValueMap::new(), meta(&[("mode", "read")]));
        assert_eq!(run.mode(), Some("r"));

        let run = RunMessage::new("RETURN 1", ValueMap::new(), meta(&[("mode", "w")]));
        assert_eq!(run.mode(), Some("w"));

        let run = RunMessage::new("RETURN 1", ValueMap::new(), ValueMap::new());
        assert_eq!(run.mode(), None);
    }

    #[test]
    fn test_run_truncates_multibyte_mode() {
        let run = RunMessage::new("RETURN 1", ValueMap::new(), meta(&[("mode", "écrire")]));
        assert_eq!(run.mode(), Some("é"));
    }

    #[test]
    fn test_run_structure_layout() {
        let params: ValueMap = [("x", 1i64)].into_iter().collect();
        let run = RunMessage::new("RETURN $x", params, ValueMap::new());
        let s = run.to_structure();
        assert_eq!(s.tag, tag::RUN);
        assert_eq!(s.fields.len(), 3);
        assert_eq!(s.fields[0].as_str(), Some("RETURN $x"));
        assert_eq!(RunMessage::from_structure(&s).unwrap(), run);
    }

    #[test]
    fn test_begin_defaults_mode_to_write() {
        let begin = BeginMessage::new(ValueMap::new(), &DatabaseSupport::default());
        assert_eq!(begin.metadata.get_str("mode"), Some("w"));
        // No mode supplied, so no default database either.
        assert_eq!(begin.database(), None);
    }

    #[test]
    fn test_begin_fills_default_database_when_mode_given() {
        let begin = BeginMessage::new(meta(&[("mode", "read")]), &DatabaseSupport::default());
        assert_eq!(begin.metadata.get_str("mode"), Some("r"));
        assert_eq!(begin.database(), Some("neo4j"));

        let begin = BeginMessage::new(
            meta(&[("mode", "w"), ("db", "movies")]),
            &DatabaseSupport::default(),
        );
        assert_eq!(begin.database(), Some("movies"));
    }

    #[test]
    fn test_begin_strips_database_when_rejected() {
        let begin = BeginMessage::new(meta(&[("mode", "r"), ("db", "movies")]), &DatabaseSupport::Rejected);
        assert!(!begin.metadata.contains_key("db"));
        assert_eq!(begin.mode(), AccessMode::Read);
    }

    #[test]
    fn test_begin_metadata_builder() {
        let tx_meta: ValueMap = [("app", "test")].into_iter().collect();
        let extra = BeginMessage::metadata(
            &["bm:1".to_string()],
            Some("movies"),
            Some(AccessMode::Read),
            Some(Duration::from_secs(2)),
            Some(&tx_meta),
        );
        let begin = BeginMessage::new(extra, &DatabaseSupport::default());
        assert_eq!(begin.bookmarks(), vec!["bm:1".to_string()]);
        assert_eq!(begin.database(), Some("movies"));
        assert_eq!(begin.tx_timeout(), Some(Duration::from_secs(2)));
        assert!(begin.metadata.get("tx_metadata").is_some());
    }

    #[test]
    fn test_pull_structure() {
        let s = BoltRequest::Pull(PullMessage::all().with_qid(Some(3))).to_structure();
        assert_eq!(s.tag, tag::PULL);
        let extra = s.fields[0].as_map().unwrap();
        assert_eq!(extra.get_int("n"), Some(-1));
        assert_eq!(extra.get_int("qid"), Some(3));
    }

    #[test]
    fn test_hello_with_inline_auth() {
        let auth: ValueMap = [("scheme", "basic"), ("principal", "neo4j"), ("credentials", "pw")]
            .into_iter()
            .collect();
        let hello = HelloMessage::new("graphbolt/0.1").with_auth(&auth);
        assert_eq!(hello.user_agent(), Some("graphbolt/0.1"));
        assert_eq!(hello.scheme(), Some("basic"));
    }

    #[test]
    fn test_logon_debug_redacts_credentials() {
        let auth: ValueMap = [("scheme", "basic"), ("principal", "neo4j"), ("credentials", "s3cret")]
            .into_iter()
            .collect();
        let debug = format!("{:?}", LogonMessage::new(auth));
        assert!(debug.contains("neo4j"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_route_structure() {
        let route = RouteMessage::new(ValueMap::new(), vec!["bm".to_string()], Some("movies".to_string()));
        let parsed = RouteMessage::from_structure(&route.to_structure()).unwrap();
        assert_eq!(parsed, route);
    }
}
