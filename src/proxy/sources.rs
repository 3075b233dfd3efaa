//! Candidate sources that scrape public proxy listing providers
//!
//! Each provider is a `CandidateSource` behind a common interface, so
//! sources can be added, removed or replaced without touching the
//! aggregator or the checker. A failing source is isolated by `harvest`
//! and contributes nothing to the run.

use crate::proxy::error::SourceError;
use crate::proxy::models::ProxyEndpoint;
use crate::proxy::parser::ProxyParser;
use crate::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

/// Default timeout for listing-site requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for listing-site requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Number of result pages requested from gatherproxy
const DEFAULT_GATHER_PAGES: usize = 20;

const GATHER_URL: &str = "http://gatherproxy.com/proxylist/anonymity/?t=Elite";

/// Matches an `<td>ip</td><td>port</td>` cell pair in a listing table
static TABLE_ROW_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<td>(\d{1,3}(?:\.\d{1,3}){3})</td>\s*<td>(\d{1,5})</td>")
        .expect("Invalid table row regex")
});

/// Matches the IP field of a gatherproxy script entry
static GATHER_IP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""PROXY_IP":"(\d{1,3}(?:\.\d{1,3}){3})""#).expect("Invalid gatherproxy IP regex")
});

/// Matches the hex-encoded port field of a gatherproxy script entry
static GATHER_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""PROXY_PORT":"([0-9A-Fa-f]{1,4})""#).expect("Invalid gatherproxy port regex")
});

/// A provider of raw candidate endpoints.
///
/// `fetch` returns zero or more candidates, or a `SourceError` when the
/// provider cannot be reached or its payload cannot be read. One source
/// failing must never stop the others from being queried.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Short provider name used in logs and reports
    fn name(&self) -> &str;

    /// Fetch raw candidates from the provider
    async fn fetch(&self) -> std::result::Result<Vec<ProxyEndpoint>, SourceError>;
}

/// Outcome of querying a single source during a harvest
#[derive(Debug, Clone)]
pub struct SourceReport {
    /// The source that was queried
    pub source: String,
    /// Candidates the source contributed
    pub endpoints: Vec<ProxyEndpoint>,
    /// Error message if the source failed
    pub error: Option<String>,
}

impl SourceReport {
    /// Create a successful report
    pub fn success(source: String, endpoints: Vec<ProxyEndpoint>) -> Self {
        Self {
            source,
            endpoints,
            error: None,
        }
    }

    /// Create a failed report
    pub fn failure(source: String, error: String) -> Self {
        Self {
            source,
            endpoints: Vec::new(),
            error: Some(error),
        }
    }

    /// Check if the source was queried successfully
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Query every source in turn, isolating per-source failures.
///
/// A failing source is logged and reported with an empty contribution; the
/// remaining sources are still queried.
pub async fn harvest(sources: &[Box<dyn CandidateSource>]) -> Vec<SourceReport> {
    let mut reports = Vec::new();

    for source in sources {
        let report = match source.fetch().await {
            Ok(endpoints) => SourceReport::success(source.name().to_string(), endpoints),
            Err(e) => {
                log::warn!("source {} failed: {}", source.name(), e);
                SourceReport::failure(source.name().to_string(), e.to_string())
            }
        };
        reports.push(report);
    }

    reports
}

fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(DEFAULT_USER_AGENT)
        .build()?;
    Ok(client)
}

/// Validate an extracted (host, port) pair into an endpoint
fn endpoint_from_parts(host: &str, port: u16) -> Option<ProxyEndpoint> {
    if port == 0 {
        return None;
    }
    for part in host.split('.') {
        let octet: u32 = part.parse().ok()?;
        if octet > 255 {
            return None;
        }
    }
    Some(ProxyEndpoint::new(host, port))
}

fn extract_table_rows(content: &str) -> Vec<ProxyEndpoint> {
    TABLE_ROW_REGEX
        .captures_iter(content)
        .filter_map(|cap| {
            let host = cap.get(1)?.as_str();
            let port: u16 = cap.get(2)?.as_str().parse().ok()?;
            endpoint_from_parts(host, port)
        })
        .collect()
}

fn extract_gather_entries(content: &str) -> Vec<ProxyEndpoint> {
    let ips = GATHER_IP_REGEX
        .captures_iter(content)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str());
    let ports = GATHER_PORT_REGEX
        .captures_iter(content)
        .filter_map(|cap| u16::from_str_radix(cap.get(1)?.as_str(), 16).ok());

    ips.zip(ports)
        .filter_map(|(host, port)| endpoint_from_parts(host, port))
        .collect()
}

/// Listing site that publishes proxies in an HTML table of IP/port cells
pub struct HtmlTableSource {
    name: String,
    url: String,
    client: Client,
}

impl HtmlTableSource {
    pub fn new(name: &str, url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl CandidateSource for HtmlTableSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> std::result::Result<Vec<ProxyEndpoint>, SourceError> {
        let response = self.client.get(&self.url).send().await?;
        let content = response.text().await?;

        let endpoints = extract_table_rows(&content);
        if endpoints.is_empty() {
            // A listing page without a single table row means the layout
            // changed, not that the provider has no proxies today.
            return Err(SourceError::Parse(format!(
                "no proxy table rows at {}",
                self.url
            )));
        }

        Ok(endpoints)
    }
}

/// gatherproxy.com source, paged through its anonymity listing form.
///
/// Ports come back hex-encoded in a script blob. A page failure after at
/// least one successful page keeps the partial harvest.
pub struct GatherProxySource {
    client: Client,
    pages: usize,
}

impl GatherProxySource {
    pub fn new(pages: usize, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            pages,
        })
    }
}

#[async_trait]
impl CandidateSource for GatherProxySource {
    fn name(&self) -> &str {
        "gatherproxy"
    }

    async fn fetch(&self) -> std::result::Result<Vec<ProxyEndpoint>, SourceError> {
        let mut endpoints = Vec::new();
        let mut first_error: Option<SourceError> = None;

        for page in 0..self.pages {
            let request = self
                .client
                .post(GATHER_URL)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(format!("Type=elite&PageIdx={page}&Uptime=0"));

            let content = match request.send().await {
                Ok(response) => match response.text().await {
                    Ok(content) => content,
                    Err(e) => {
                        first_error = Some(e.into());
                        break;
                    }
                },
                Err(e) => {
                    first_error = Some(e.into());
                    break;
                }
            };

            endpoints.extend(extract_gather_entries(&content));
        }

        match first_error {
            Some(error) if endpoints.is_empty() => Err(error),
            Some(error) => {
                log::debug!("gatherproxy paging stopped early: {error}");
                Ok(endpoints)
            }
            None => Ok(endpoints),
        }
    }
}

/// Source serving a raw list with one `ip:port` per line
pub struct PlainTextSource {
    name: String,
    url: String,
    client: Client,
}

impl PlainTextSource {
    pub fn new(name: &str, url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl CandidateSource for PlainTextSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> std::result::Result<Vec<ProxyEndpoint>, SourceError> {
        let response = self.client.get(&self.url).send().await?;
        let content = response.text().await?;
        // An empty list is a valid harvest for raw text lists
        Ok(ProxyParser::parse_string(&content))
    }
}

/// Build the default set of bundled sources
pub fn default_sources() -> Result<Vec<Box<dyn CandidateSource>>> {
    sources_by_name(&[
        "gatherproxy".to_string(),
        "free-proxy-list".to_string(),
        "socks-proxy".to_string(),
        "sslproxies".to_string(),
        "us-proxy".to_string(),
    ])
}

/// Build sources by name, failing on names no bundled source answers to
pub fn sources_by_name(names: &[String]) -> Result<Vec<Box<dyn CandidateSource>>> {
    let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);

    names
        .iter()
        .map(|name| -> Result<Box<dyn CandidateSource>> {
            let source: Box<dyn CandidateSource> = match name.as_str() {
                "gatherproxy" => Box::new(GatherProxySource::new(DEFAULT_GATHER_PAGES, timeout)?),
                "free-proxy-list" => Box::new(HtmlTableSource::new(
                    "free-proxy-list",
                    "https://free-proxy-list.net",
                    timeout,
                )?),
                "socks-proxy" => Box::new(HtmlTableSource::new(
                    "socks-proxy",
                    "https://www.socks-proxy.net",
                    timeout,
                )?),
                "sslproxies" => Box::new(HtmlTableSource::new(
                    "sslproxies",
                    "https://www.sslproxies.org",
                    timeout,
                )?),
                "us-proxy" => Box::new(HtmlTableSource::new(
                    "us-proxy",
                    "https://www.us-proxy.org",
                    timeout,
                )?),
                other => anyhow::bail!(
                    "unknown source `{}`. Use: gatherproxy, free-proxy-list, socks-proxy, sslproxies, us-proxy",
                    other
                ),
            };
            Ok(source)
        })
        .collect()
}
