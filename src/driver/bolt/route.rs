//! Routing table returned by ROUTE.

use crate::bolt::{SuccessMessage, ValueMap};

/// Server roles advertised by a ROUTE response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingInfo {
    /// Time-to-live in seconds
    pub ttl: i64,
    /// Database the table belongs to
    pub db: Option<String>,
    pub routers: Vec<String>,
    pub readers: Vec<String>,
    pub writers: Vec<String>,
}

impl RoutingInfo {
    /// Parse the `rt` map of a ROUTE SUCCESS. Unknown roles are ignored.
    pub fn from_success(success: &SuccessMessage) -> Option<Self> {
        let rt = success.get("rt")?.as_map()?;
        Self::from_table(rt)
    }

    fn from_table(rt: &ValueMap) -> Option<Self> {
        let mut info = Self {
            ttl: rt.get_int("ttl").unwrap_or(300),
            db: rt.get_str("db").map(str::to_string),
            routers: Vec::new(),
            readers: Vec::new(),
            writers: Vec::new(),
        };

        for server in rt.get("servers")?.as_list()? {
            let Some(server) = server.as_map() else {
                continue;
            };
            let addresses = server
                .get("addresses")
                .and_then(|v| v.as_list())
                .map(|list| list.iter().filter_map(|a| a.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            match server.get_str("role") {
                Some("ROUTE") => info.routers = addresses,
                Some("READ") => info.readers = addresses,
                Some("WRITE") => info.writers = addresses,
                _ => {}
            }
        }

        Some(info)
    }
}
