//! Signature-to-message dispatch.
//!
//! Every known message is listed once in [`REGISTRY`]. Decoding looks up the
//! structure tag and calls the matching constructor; a tag that is not in the
//! table becomes [`BoltMessage::Unknown`] so newer server messages do not
//! break older clients.

use super::request::*;
use super::response::*;
use super::tag;
use crate::bolt::packstream::{PackStreamError, PackStreamStructure, PackStreamValue};

/// Any message that can appear on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum BoltMessage {
    /// Client to server
    Request(BoltRequest),
    /// Server to client
    Response(BoltResponse),
    /// Signature not present in the registry
    Unknown(UnknownMessage),
}

/// A structure whose signature is not registered.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownMessage {
    pub signature: u8,
    pub fields: Vec<PackStreamValue>,
}

impl BoltMessage {
    pub fn signature(&self) -> u8 {
        match self {
            BoltMessage::Request(r) => r.tag(),
            BoltMessage::Response(r) => r.tag(),
            BoltMessage::Unknown(u) => u.signature,
        }
    }

    pub fn name(&self) -> &'static str {
        name_of(self.signature())
    }

    pub fn to_structure(&self) -> PackStreamStructure {
        match self {
            BoltMessage::Request(r) => r.to_structure(),
            BoltMessage::Response(r) => r.to_structure(),
            BoltMessage::Unknown(u) => PackStreamStructure::new(u.signature, u.fields.clone()),
        }
    }
}

impl From<BoltRequest> for BoltMessage {
    fn from(r: BoltRequest) -> Self {
        BoltMessage::Request(r)
    }
}

impl From<BoltResponse> for BoltMessage {
    fn from(r: BoltResponse) -> Self {
        BoltMessage::Response(r)
    }
}

type Constructor = fn(&PackStreamStructure) -> Result<BoltMessage, PackStreamError>;

/// One registered message type.
pub struct MessageEntry {
    pub signature: u8,
    pub name: &'static str,
    pub construct: Constructor,
}

fn hello(s: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltRequest::Hello(HelloMessage::from_structure(s)?).into())
}

fn goodbye(_: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltRequest::Goodbye.into())
}

fn reset(_: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltRequest::Reset.into())
}

fn run(s: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltRequest::Run(RunMessage::from_structure(s)?).into())
}

fn begin(s: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltRequest::Begin(BeginMessage::from_structure(s)?).into())
}

fn commit(_: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltRequest::Commit.into())
}

fn rollback(_: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltRequest::Rollback.into())
}

fn discard(s: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltRequest::Discard(DiscardMessage::from_structure(s)?).into())
}

fn pull(s: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltRequest::Pull(PullMessage::from_structure(s)?).into())
}

fn route(s: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltRequest::Route(RouteMessage::from_structure(s)?).into())
}

fn logon(s: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltRequest::Logon(LogonMessage::from_structure(s)?).into())
}

fn logoff(_: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltRequest::Logoff.into())
}

fn telemetry(s: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltRequest::Telemetry(TelemetryMessage::from_structure(s)?).into())
}

fn success(s: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltResponse::Success(SuccessMessage::from_structure(s)?).into())
}

fn record(s: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltResponse::Record(RecordMessage::from_structure(s)?).into())
}

fn ignored(_: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltResponse::Ignored.into())
}

fn failure(s: &PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    Ok(BoltResponse::Failure(FailureMessage::from_structure(s)?).into())
}

macro_rules! entry {
    ($sig:expr, $name:literal, $ctor:ident) => {
        MessageEntry {
            signature: $sig,
            name: $name,
            construct: $ctor,
        }
    };
}

/// All known messages, requests first.
pub static REGISTRY: [MessageEntry; 17] = [
    entry!(tag::HELLO, "HELLO", hello),
    entry!(tag::GOODBYE, "GOODBYE", goodbye),
    entry!(tag::RESET, "RESET", reset),
    entry!(tag::RUN, "RUN", run),
    entry!(tag::BEGIN, "BEGIN", begin),
    entry!(tag::COMMIT, "COMMIT", commit),
    entry!(tag::ROLLBACK, "ROLLBACK", rollback),
    entry!(tag::DISCARD, "DISCARD", discard),
    entry!(tag::PULL, "PULL", pull),
    entry!(tag::ROUTE, "ROUTE", route),
    entry!(tag::LOGON, "LOGON", logon),
    entry!(tag::LOGOFF, "LOGOFF", logoff),
    entry!(tag::TELEMETRY, "TELEMETRY", telemetry),
    entry!(tag::SUCCESS, "SUCCESS", success),
    entry!(tag::RECORD, "RECORD", record),
    entry!(tag::IGNORED, "IGNORED", ignored),
    entry!(tag::FAILURE, "FAILURE", failure),
];

/// Find the registry entry for a signature.
pub fn lookup(signature: u8) -> Option<&'static MessageEntry> {
    REGISTRY.iter().find(|e| e.signature == signature)
}

/// Message name for logs; `UNKNOWN` for unregistered signatures.
pub fn name_of(signature: u8) -> &'static str {
    lookup(signature).map(|e| e.name).unwrap_or("UNKNOWN")
}

/// Resolve a decoded structure into a typed message.
pub fn decode_message(s: PackStreamStructure) -> Result<BoltMessage, PackStreamError> {
    match lookup(s.tag) {
        Some(entry) => (entry.construct)(&s),
        None => Ok(BoltMessage::Unknown(UnknownMessage {
            signature: s.tag,
            fields: s.fields,
        })),
    }
}

/// Resolve a decoded value; anything other than a structure is rejected.
pub fn decode_value(value: PackStreamValue) -> Result<BoltMessage, PackStreamError> {
    match value {
        PackStreamValue::Structure(s) => decode_message(s),
        other => Err(PackStreamError::InvalidStructure(format!(
            "Expected message structure, got {}",
            other.type_name()
        ))),
    }
}
