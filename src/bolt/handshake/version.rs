//! Bolt protocol version definitions.

use std::fmt;
use std::str::FromStr;

/// A Bolt protocol version.
///
/// On the wire a version is four bytes `[0, 0, minor, major]`. Ordering
/// compares major first, then minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoltVersion {
    pub major: u8,
    pub minor: u8,
}

impl BoltVersion {
    pub const V4_4: BoltVersion = BoltVersion::new(4, 4);
    pub const V5_0: BoltVersion = BoltVersion::new(5, 0);
    pub const V5_1: BoltVersion = BoltVersion::new(5, 1);
    pub const V5_2: BoltVersion = BoltVersion::new(5, 2);
    pub const V5_3: BoltVersion = BoltVersion::new(5, 3);
    pub const V5_4: BoltVersion = BoltVersion::new(5, 4);

    /// Default proposals, newest first.
    pub const DEFAULT_PROPOSALS: [BoltVersion; 4] = [Self::V5_4, Self::V5_2, Self::V5_0, Self::V4_4];

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Wire form `[0, 0, minor, major]`.
    pub fn to_bytes(self) -> [u8; 4] {
        [0, 0, self.minor, self.major]
    }

    /// Parse the wire form. All-zero bytes mean "no version" and yield `None`.
    /// Range bytes (index 1) are ignored.
    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        if bytes == [0, 0, 0, 0] {
            return None;
        }
        Some(Self::new(bytes[3], bytes[2]))
    }

    /// ROUTE message (4.3+).
    pub fn supports_route(self) -> bool {
        self >= BoltVersion::new(4, 3)
    }

    /// Credentials travel in LOGON instead of HELLO (5.1+).
    pub fn supports_logon(self) -> bool {
        self >= Self::V5_1
    }

    /// HELLO carries a `bolt_agent` map (5.3+).
    pub fn supports_bolt_agent(self) -> bool {
        self >= Self::V5_3
    }

    /// TELEMETRY message (5.4+).
    pub fn supports_telemetry(self) -> bool {
        self >= Self::V5_4
    }
}

impl fmt::Display for BoltVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for BoltVersion {
    type Err = String;

    /// Parse `"5.2"` or `"5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.trim().split_once('.').unwrap_or((s.trim(), "0"));
        let major = major.parse::<u8>().map_err(|e| format!("invalid major version '{}': {}", major, e))?;
        let minor = minor.parse::<u8>().map_err(|e| format!("invalid minor version '{}': {}", minor, e))?;
        Ok(Self::new(major, minor))
    }
}
