//! Per-request header rotation for probe attempts

use crate::Result;
use rand::seq::IndexedRandom;
use std::fs;
use std::path::Path;

/// Built-in user agents used when no pool file is supplied
const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0",
];

/// Supplies one header value per outgoing probe attempt.
///
/// The selection policy is up to the implementation; the checker only calls
/// `next_value` once per attempt.
pub trait HeaderProvider: Send + Sync {
    fn next_value(&self) -> String;
}

/// Fixed pool of user-agent strings with uniform random selection
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    agents: Vec<String>,
}

impl UserAgentPool {
    /// Create a pool from the given agents, falling back to the built-in
    /// pool when the list is empty.
    pub fn new(agents: Vec<String>) -> Self {
        let agents: Vec<String> = agents
            .into_iter()
            .map(|agent| agent.trim().to_string())
            .filter(|agent| !agent.is_empty())
            .collect();

        if agents.is_empty() {
            Self::default()
        } else {
            Self { agents }
        }
    }

    /// Load a pool from a file with one user-agent string per line
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::new(content.lines().map(str::to_string).collect()))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self {
            agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl HeaderProvider for UserAgentPool {
    fn next_value(&self) -> String {
        // Construction guarantees at least one agent in the pool
        self.agents
            .choose(&mut rand::rng())
            .expect("user-agent pool is never empty")
            .clone()
    }
}
