//! Merging of per-source candidate batches into one deduplicated set

use crate::proxy::models::ProxyEndpoint;
use std::collections::HashSet;

/// Merge candidate batches into a single set with no duplicate endpoints.
///
/// Duplicates are decided by (host, port) identity; the first occurrence
/// wins and insertion order is preserved. Empty batches contribute nothing,
/// so a run where every source failed produces an empty set.
pub fn aggregate<I>(batches: I) -> Vec<ProxyEndpoint>
where
    I: IntoIterator<Item = Vec<ProxyEndpoint>>,
{
    let mut seen: HashSet<ProxyEndpoint> = HashSet::new();
    let mut merged = Vec::new();

    for batch in batches {
        for endpoint in batch {
            if seen.insert(endpoint.clone()) {
                merged.push(endpoint);
            }
        }
    }

    merged
}
