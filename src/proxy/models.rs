//! Proxy data models

use serde::{Deserialize, Serialize};
use std::fmt;

/// A candidate proxy endpoint harvested from a listing source.
///
/// Identity is the (host, port) pair: two endpoints with the same pair are
/// the same candidate no matter which source produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
}

impl ProxyEndpoint {
    /// Create a new endpoint
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Proxy URL used when routing requests through this endpoint
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Terminal result of probing one candidate.
///
/// Every candidate handed to the checker yields exactly one of these per run;
/// a failed probe is a data point, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub endpoint: ProxyEndpoint,
    pub passed: bool,
}

impl ProbeOutcome {
    pub fn passed(endpoint: ProxyEndpoint) -> Self {
        Self {
            endpoint,
            passed: true,
        }
    }

    pub fn failed(endpoint: ProxyEndpoint) -> Self {
        Self {
            endpoint,
            passed: false,
        }
    }
}
