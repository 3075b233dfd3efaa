//! Proxy module for harvesting and checking proxies
//!
//! This module provides functionality for:
//! - Fetching candidate proxies from public listing sources
//! - Merging per-source results into one deduplicated candidate set
//! - Checking candidates concurrently under a concurrency ceiling
//! - Parsing and saving `host:port` proxy lists

pub mod agents;
pub mod aggregate;
pub mod checker;
pub mod error;
pub mod models;
pub mod parser;
pub mod sources;

pub use agents::{HeaderProvider, UserAgentPool};
pub use aggregate::aggregate;
pub use checker::{run_probes, CheckerConfig, ProxyChecker};
pub use error::{ConfigError, SourceError};
pub use models::{ProbeOutcome, ProxyEndpoint};
pub use parser::ProxyParser;
pub use sources::{
    default_sources, harvest, sources_by_name, CandidateSource, GatherProxySource,
    HtmlTableSource, PlainTextSource, SourceReport,
};
