//! Bolt protocol response messages.
//!
//! Response messages are sent from the server to the client.

use super::request::{map_field, string_list};
use super::tag;
use crate::bolt::packstream::{PackStreamError, PackStreamStructure, PackStreamValue, ValueMap};

/// All Bolt response messages.
#[derive(Debug, Clone, PartialEq)]
pub enum BoltResponse {
    /// SUCCESS - Operation completed successfully
    Success(SuccessMessage),
    /// RECORD - Query result record
    Record(RecordMessage),
    /// FAILURE - Operation failed
    Failure(FailureMessage),
    /// IGNORED - Message was ignored (connection in FAILED state)
    Ignored,
}

impl BoltResponse {
    /// Get the message tag.
    pub fn tag(&self) -> u8 {
        match self {
            BoltResponse::Success(_) => tag::SUCCESS,
            BoltResponse::Record(_) => tag::RECORD,
            BoltResponse::Failure(_) => tag::FAILURE,
            BoltResponse::Ignored => tag::IGNORED,
        }
    }

    /// Get message name for logging.
    pub fn name(&self) -> &'static str {
        super::registry::name_of(self.tag())
    }

    /// Whether this message ends a request/response exchange.
    pub fn is_summary(&self) -> bool {
        !matches!(self, BoltResponse::Record(_))
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> PackStreamStructure {
        match self {
            BoltResponse::Success(msg) => msg.to_structure(),
            BoltResponse::Record(msg) => msg.to_structure(),
            BoltResponse::Failure(msg) => msg.to_structure(),
            BoltResponse::Ignored => PackStreamStructure::new(tag::IGNORED, vec![]),
        }
    }
}

/// SUCCESS message - Operation completed successfully.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuccessMessage {
    /// Response metadata
    pub metadata: ValueMap,
}

impl SuccessMessage {
    pub fn new(metadata: ValueMap) -> Self {
        Self { metadata }
    }

    /// Get metadata entry.
    pub fn get(&self, key: &str) -> Option<&PackStreamValue> {
        self.metadata.get(key)
    }

    /// Server identity, e.g. `Neo4j/5.13.0` (HELLO).
    pub fn server(&self) -> Option<&str> {
        self.metadata.get_str("server")
    }

    /// Connection id assigned by the server (HELLO).
    pub fn connection_id(&self) -> Option<&str> {
        self.metadata.get_str("connection_id")
    }

    /// Field names (RUN).
    pub fn fields(&self) -> Vec<String> {
        string_list(self.metadata.get("fields"))
    }

    /// Query id inside an explicit transaction (RUN).
    pub fn qid(&self) -> Option<i64> {
        self.metadata.get_int("qid")
    }

    /// Query statistics (PULL/DISCARD).
    pub fn stats(&self) -> Option<&ValueMap> {
        self.metadata.get("stats").and_then(|v| v.as_map())
    }

    /// Whether more records are pending (PULL with n > 0).
    pub fn has_more(&self) -> bool {
        self.metadata.get("has_more").and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Bookmark (COMMIT, auto-commit PULL).
    pub fn bookmark(&self) -> Option<&str> {
        self.metadata.get_str("bookmark")
    }

    /// Database the query ran against.
    pub fn db(&self) -> Option<&str> {
        self.metadata.get_str("db")
    }

    pub fn to_structure(&self) -> PackStreamStructure {
        PackStreamStructure::new(tag::SUCCESS, vec![self.metadata.clone().into()])
    }

    pub fn from_structure(s: &PackStreamStructure) -> Result<Self, PackStreamError> {
        Ok(Self {
            metadata: map_field(s, 0, "SUCCESS metadata")?,
        })
    }
}

/// RECORD message - Query result record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordMessage {
    /// Field values, in the order of the RUN `fields`
    pub fields: Vec<PackStreamValue>,
}

impl RecordMessage {
    pub fn new(fields: Vec<PackStreamValue>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_structure(&self) -> PackStreamStructure {
        PackStreamStructure::new(tag::RECORD, vec![PackStreamValue::List(self.fields.clone())])
    }

    pub fn from_structure(s: &PackStreamStructure) -> Result<Self, PackStreamError> {
        match s.field(0) {
            None => Ok(Self::default()),
            Some(PackStreamValue::List(list)) => Ok(Self { fields: list.clone() }),
            Some(_) => Err(PackStreamError::InvalidStructure("RECORD fields must be list".to_string())),
        }
    }
}

/// FAILURE message - Operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMessage {
    /// Server error code, e.g. `Neo.ClientError.Statement.SyntaxError`
    pub code: String,
    /// Error message
    pub message: String,
}

impl FailureMessage {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Check if this is a transient error.
    pub fn is_transient(&self) -> bool {
        self.code.contains("TransientError")
    }

    /// Check if the server rejected the credentials.
    pub fn is_security_error(&self) -> bool {
        self.code.contains(".Security.")
    }

    pub fn to_structure(&self) -> PackStreamStructure {
        let metadata: ValueMap = [("code", self.code.as_str()), ("message", self.message.as_str())]
            .into_iter()
            .collect();
        PackStreamStructure::new(tag::FAILURE, vec![metadata.into()])
    }

    /// Missing keys fall back to placeholders; some servers send only a
    /// message.
    pub fn from_structure(s: &PackStreamStructure) -> Result<Self, PackStreamError> {
        let metadata = map_field(s, 0, "FAILURE metadata")?;
        Ok(Self {
            code: metadata
                .get_str("code")
                .or_else(|| metadata.get_str("neo4j_code"))
                .unwrap_or("Unknown")
                .to_string(),
            message: metadata.get_str("message").unwrap_or_default().to_string(),
        })
    }
}

impl std::fmt::Display for FailureMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
