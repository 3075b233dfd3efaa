//! Parsing and writing of `host:port` proxy lists

use crate::proxy::models::ProxyEndpoint;
use crate::Result;
use std::fs;
use std::path::Path;

/// Parser for plain-text proxy lists
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single `host:port` line.
    ///
    /// Blank lines and `#` comments yield `None`, as does any line that is
    /// not exactly a host and a non-zero port joined by one colon.
    pub fn parse_line(line: &str) -> Option<ProxyEndpoint> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (host, port) = line.split_once(':')?;
        if host.is_empty() || port.contains(':') {
            return None;
        }
        let port: u16 = port.parse().ok()?;
        if port == 0 {
            return None;
        }

        Some(ProxyEndpoint::new(host, port))
    }

    /// Parse endpoints from a string, one per line
    pub fn parse_string(content: &str) -> Vec<ProxyEndpoint> {
        content.lines().filter_map(Self::parse_line).collect()
    }

    /// Parse endpoints from a file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<ProxyEndpoint>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse_string(&content))
    }

    /// Save endpoints to a file, one `host:port` line each.
    ///
    /// The file is replaced in full on every call; an empty slice writes an
    /// empty file rather than skipping the write.
    pub fn save_to_file<P: AsRef<Path>>(endpoints: &[ProxyEndpoint], path: P) -> Result<()> {
        let content: String = endpoints
            .iter()
            .map(|endpoint| endpoint.to_string())
            .collect::<Vec<_>>()
            .join("\n");

        fs::write(path, content)?;
        Ok(())
    }
}
