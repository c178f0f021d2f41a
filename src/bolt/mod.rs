//! # Bolt Protocol Implementation
//!
//! Low-level Bolt protocol pieces used by the driver.
//!
//! - **PackStream** - Binary serialization format for all values
//! - **Message Types** - Request/response messages and the signature registry
//! - **Handshake** - Protocol version negotiation
//! - **Codec** - Async message framing for Tokio
//!
//! ## Submodules
//!
//! - [`packstream`] - Binary serialization/deserialization
//! - [`message`] - Bolt message types (HELLO, RUN, PULL, etc.)
//! - [`handshake`] - Version negotiation
//! - [`codec`] - Tokio codec for async I/O
//! - [`error`] - Protocol error types
//!
//! Most users should use the high-level [`crate::driver`] module instead of
//! interacting with the Bolt protocol directly.

pub mod codec;
pub mod error;
pub mod handshake;
pub mod message;
pub mod packstream;

pub use codec::{BoltCodec, BoltMessageCodec};
pub use error::{BoltError, BoltResult, HandshakeError};
pub use handshake::{BoltVersion, Handshake, BOLT_MAGIC};
pub use message::{
    AccessMode, BeginMessage, BoltMessage, BoltRequest, BoltResponse, DatabaseSupport,
    FailureMessage, HelloMessage, LogonMessage, PullMessage, RecordMessage, RouteMessage,
    RunMessage, SuccessMessage, UnknownMessage,
};
pub use packstream::{PackStreamError, PackStreamStructure, PackStreamValue, ValueMap};
