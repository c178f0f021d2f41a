//! Backend detection and liveness probing.

use std::fmt;
use std::time::Duration;

use crate::bolt::DatabaseSupport;

/// Server product, detected from the identity string sent in the HELLO
/// SUCCESS (`Neo4j/5.13.0`, `Memgraph/2.14.0`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Neo4j,
    Memgraph,
    Unknown,
}

impl Vendor {
    pub fn detect(server_agent: Option<&str>) -> Self {
        let agent = match server_agent {
            Some(agent) => agent.to_ascii_lowercase(),
            None => return Vendor::Unknown,
        };
        if agent.starts_with("neo4j") {
            Vendor::Neo4j
        } else if agent.starts_with("memgraph") {
            Vendor::Memgraph
        } else {
            Vendor::Unknown
        }
    }

    /// Cheapest query that proves the server is answering.
    pub fn probe_query(self) -> &'static str {
        match self {
            Vendor::Neo4j => "CALL dbms.components() YIELD versions RETURN versions[0] AS version",
            Vendor::Memgraph => "SHOW VERSION",
            Vendor::Unknown => "RETURN 1 AS ok",
        }
    }

    /// Memgraph has a single database and refuses a `db` key in BEGIN.
    pub fn database_support(self) -> DatabaseSupport {
        match self {
            Vendor::Memgraph => DatabaseSupport::Rejected,
            Vendor::Neo4j | Vendor::Unknown => DatabaseSupport::default(),
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vendor::Neo4j => write!(f, "Neo4j"),
            Vendor::Memgraph => write!(f, "Memgraph"),
            Vendor::Unknown => write!(f, "unknown"),
        }
    }
}

/// Outcome of a health probe.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheck {
    pub healthy: bool,
    /// Round trip of the probe query
    pub latency: Duration,
    /// Probe answer when healthy, error text otherwise
    pub detail: String,
}

impl HealthCheck {
    pub(crate) fn healthy(latency: Duration, detail: impl Into<String>) -> Self {
        Self {
            healthy: true,
            latency,
            detail: detail.into(),
        }
    }

    pub(crate) fn unhealthy(latency: Duration, detail: impl Into<String>) -> Self {
        Self {
            healthy: false,
            latency,
            detail: detail.into(),
        }
    }
}
