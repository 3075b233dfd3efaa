//! Proxy Harvester
//!
//! Harvests candidate proxies from public listing sites, deduplicates them
//! and checks which ones actually relay traffic, with a hard ceiling on
//! concurrent probe attempts.

pub mod proxy;

pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
