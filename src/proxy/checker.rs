//! Proxy checker module for validating candidates with bounded concurrency

use crate::proxy::agents::HeaderProvider;
use crate::proxy::error::ConfigError;
use crate::proxy::models::{ProbeOutcome, ProxyEndpoint};
use futures::stream::{self, StreamExt};
use reqwest::header::USER_AGENT;
use reqwest::{Client, Proxy as ReqwestProxy, Url};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default timeout for a single probe attempt in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default ceiling on simultaneously in-flight probes
const DEFAULT_CONCURRENCY: usize = 400;

/// Default URL requested through each candidate
const DEFAULT_PROBE_URL: &str = "http://check.zennolab.com";

/// Configuration for the proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each probe attempt
    pub timeout: Duration,
    /// Ceiling on simultaneously in-flight probes
    pub concurrency: usize,
    /// URL requested through each candidate
    pub probe_url: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            probe_url: DEFAULT_PROBE_URL.to_string(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_probe_url(mut self, url: String) -> Self {
        self.probe_url = url;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if let Err(e) = Url::parse(&self.probe_url) {
            return Err(ConfigError::InvalidProbeUrl {
                url: self.probe_url.clone(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }
}

/// Run one probe task per endpoint under a concurrency ceiling.
///
/// At most `limit` probes are in flight at any instant; admission is in
/// input order as permits free up. Returns only after every endpoint has
/// reached a terminal outcome, exactly one outcome per endpoint, in
/// completion order.
pub async fn run_probes<F, Fut>(
    endpoints: Vec<ProxyEndpoint>,
    limit: usize,
    probe: F,
) -> Vec<ProbeOutcome>
where
    F: Fn(ProxyEndpoint) -> Fut,
    Fut: Future<Output = bool>,
{
    let semaphore = Arc::new(Semaphore::new(limit));
    let probe = &probe;

    stream::iter(endpoints)
        .map(|endpoint| {
            let sem = Arc::clone(&semaphore);
            async move {
                // Semaphore acquire only fails if the semaphore is closed,
                // which won't happen here since we own the Arc and keep it
                // alive for the duration of the run.
                let _permit = sem
                    .acquire()
                    .await
                    .expect("Semaphore closed unexpectedly");
                let passed = probe(endpoint.clone()).await;
                ProbeOutcome { endpoint, passed }
            }
        })
        .buffer_unordered(limit)
        .collect::<Vec<_>>()
        .await
}

/// Checker that probes candidates through a known-reachable target
pub struct ProxyChecker {
    config: CheckerConfig,
    headers: Option<Arc<dyn HeaderProvider>>,
}

impl ProxyChecker {
    /// Create a checker with the default configuration
    pub fn new() -> Self {
        Self {
            config: CheckerConfig::default(),
            headers: None,
        }
    }

    /// Create a checker with a custom configuration.
    ///
    /// Rejects configurations under which a run would be meaningless: a
    /// zero concurrency ceiling, a zero timeout or a malformed probe URL.
    pub fn with_config(config: CheckerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            headers: None,
        })
    }

    /// Attach a provider of per-attempt user-agent headers
    pub fn with_header_provider(mut self, provider: Arc<dyn HeaderProvider>) -> Self {
        self.headers = Some(provider);
        self
    }

    /// Probe a single candidate.
    ///
    /// Any received response passes, whatever its status code: the probe
    /// measures whether the candidate relays traffic, not whether the
    /// relayed response is useful. Timeouts and transport errors fail.
    pub async fn probe_endpoint(&self, endpoint: &ProxyEndpoint) -> bool {
        let client = match self.build_client(endpoint) {
            Ok(client) => client,
            Err(e) => {
                log::debug!("client for {} rejected: {}", endpoint, e);
                return false;
            }
        };

        let mut request = client.get(&self.config.probe_url);
        if let Some(provider) = &self.headers {
            request = request.header(USER_AGENT, provider.next_value());
        }

        match tokio::time::timeout(self.config.timeout, request.send()).await {
            Ok(Ok(_response)) => true,
            Ok(Err(e)) => {
                log::debug!("probe through {} failed: {}", endpoint, e);
                false
            }
            Err(_) => {
                log::debug!("probe through {} timed out", endpoint);
                false
            }
        }
    }

    /// Probe every candidate, one outcome per candidate.
    ///
    /// A candidate's failure is local to its own outcome and never aborts
    /// sibling probes; there is no retry within a run.
    pub async fn check_endpoints(&self, endpoints: Vec<ProxyEndpoint>) -> Vec<ProbeOutcome> {
        run_probes(endpoints, self.config.concurrency, |endpoint| {
            let checker = self.clone();
            async move { checker.probe_endpoint(&endpoint).await }
        })
        .await
    }

    /// Probe every candidate and separate the passing from the failing
    pub async fn check_and_separate(
        &self,
        endpoints: Vec<ProxyEndpoint>,
    ) -> (Vec<ProxyEndpoint>, Vec<ProxyEndpoint>) {
        let outcomes = self.check_endpoints(endpoints).await;

        let (good, bad): (Vec<_>, Vec<_>) = outcomes.into_iter().partition(|o| o.passed);

        (
            good.into_iter().map(|o| o.endpoint).collect(),
            bad.into_iter().map(|o| o.endpoint).collect(),
        )
    }

    /// Create a reqwest client routing through the candidate
    fn build_client(&self, endpoint: &ProxyEndpoint) -> Result<Client, reqwest::Error> {
        let client = Client::builder()
            .proxy(ReqwestProxy::all(endpoint.proxy_url())?)
            .timeout(self.config.timeout)
            .build()?;

        Ok(client)
    }
}

impl Clone for ProxyChecker {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            headers: self.headers.clone(),
        }
    }
}

impl Default for ProxyChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::aggregate::aggregate;
    use crate::proxy::parser::ProxyParser;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Instant};

    fn endpoints(n: usize) -> Vec<ProxyEndpoint> {
        (0..n)
            .map(|i| ProxyEndpoint::new(format!("10.0.0.{}", i + 1), 8080))
            .collect()
    }

    #[test]
    fn test_checker_config_default() {
        let config = CheckerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.probe_url, DEFAULT_PROBE_URL);
    }

    #[test]
    fn test_checker_config_builder() {
        let config = CheckerConfig::new()
            .with_timeout(Duration::from_secs(30))
            .with_concurrency(20)
            .with_probe_url("http://example.com".to_string());

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.concurrency, 20);
        assert_eq!(config.probe_url, "http://example.com");
    }

    #[test]
    fn test_with_config_rejects_zero_concurrency() {
        let config = CheckerConfig::new().with_concurrency(0);
        assert!(matches!(
            ProxyChecker::with_config(config),
            Err(ConfigError::ZeroConcurrency)
        ));
    }

    #[test]
    fn test_with_config_rejects_zero_timeout() {
        let config = CheckerConfig::new().with_timeout(Duration::ZERO);
        assert!(matches!(
            ProxyChecker::with_config(config),
            Err(ConfigError::ZeroTimeout)
        ));
    }

    #[test]
    fn test_with_config_rejects_malformed_probe_url() {
        let config = CheckerConfig::new().with_probe_url("not a url".to_string());
        assert!(matches!(
            ProxyChecker::with_config(config),
            Err(ConfigError::InvalidProbeUrl { .. })
        ));
    }

    #[test]
    fn test_with_config_accepts_valid() {
        let config = CheckerConfig::new()
            .with_concurrency(50)
            .with_probe_url("http://httpbin.org/ip".to_string());
        assert!(ProxyChecker::with_config(config).is_ok());
    }

    #[tokio::test]
    async fn test_run_probes_one_outcome_per_endpoint() {
        let input = endpoints(25);
        let expected: HashSet<_> = input.iter().cloned().collect();

        // Pass only hosts ending in 3 so outcomes are mixed
        let outcomes = run_probes(input, 4, |endpoint| async move {
            endpoint.host.ends_with('3')
        })
        .await;

        assert_eq!(outcomes.len(), 25);
        let seen: HashSet<_> = outcomes.iter().map(|o| o.endpoint.clone()).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_run_probes_empty_input() {
        let outcomes = run_probes(Vec::new(), 4, |_| async { true }).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_run_probes_always_pass() {
        let outcomes = run_probes(endpoints(5), 2, |_| async { true }).await;
        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(|o| o.passed));
    }

    #[tokio::test]
    async fn test_run_probes_always_fail() {
        let outcomes = run_probes(endpoints(5), 2, |_| async { false }).await;
        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(|o| !o.passed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_probes_respects_concurrency_ceiling() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let limit = 3;

        let outcomes = {
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            run_probes(endpoints(10), limit, move |_| {
                let active = Arc::clone(&active);
                let max_active = Arc::clone(&max_active);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(50)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    true
                }
            })
            .await
        };

        assert_eq!(outcomes.len(), 10);
        assert_eq!(max_active.load(Ordering::SeqCst), limit);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_probes_serializes_with_limit_one() {
        let delay = Duration::from_millis(30);
        let start = Instant::now();

        let outcomes = run_probes(endpoints(5), 1, |_| async move {
            sleep(delay).await;
            true
        })
        .await;

        assert_eq!(outcomes.len(), 5);
        let elapsed = start.elapsed();
        assert!(elapsed >= delay * 5, "elapsed {:?}", elapsed);
        assert!(elapsed < delay * 6, "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_probes_hung_probe_does_not_block_others() {
        let hang = Duration::from_secs(10);
        let start = Instant::now();

        let outcomes = run_probes(endpoints(5), 2, |endpoint| async move {
            if endpoint.host == "10.0.0.1" {
                // Simulated hang bounded by its own timeout
                sleep(hang).await;
                false
            } else {
                sleep(Duration::from_millis(10)).await;
                true
            }
        })
        .await;

        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes.iter().filter(|o| o.passed).count(), 4);

        // Total time is bounded by the hung probe alone, not by the sum
        // of every probe behind it.
        let elapsed = start.elapsed();
        assert!(elapsed >= hang, "elapsed {:?}", elapsed);
        assert!(elapsed < hang + Duration::from_secs(1), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_pipeline_duplicates_collapse_and_survivors_are_saved() {
        let batches = vec![vec![
            ProxyEndpoint::new("1.2.3.4", 80),
            ProxyEndpoint::new("1.2.3.4", 80),
            ProxyEndpoint::new("5.6.7.8", 8080),
        ]];

        let merged = aggregate(batches);
        assert_eq!(merged.len(), 2);

        let outcomes = run_probes(merged, 4, |_| async { true }).await;
        assert_eq!(outcomes.len(), 2);
        let good: Vec<_> = outcomes
            .into_iter()
            .filter(|o| o.passed)
            .map(|o| o.endpoint)
            .collect();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxies.txt");
        ProxyParser::save_to_file(&good, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: HashSet<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.contains("1.2.3.4:80"));
        assert!(lines.contains("5.6.7.8:8080"));
    }

    #[tokio::test]
    async fn test_pipeline_all_failures_still_write_empty_output() {
        let candidates = vec![ProxyEndpoint::new("9.9.9.9", 3128)];

        let outcomes = run_probes(candidates, 4, |_| async { false }).await;
        let good: Vec<_> = outcomes
            .into_iter()
            .filter(|o| o.passed)
            .map(|o| o.endpoint)
            .collect();
        assert!(good.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxies.txt");
        ProxyParser::save_to_file(&good, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_probes_total_time_batches_by_ceiling() {
        let delay = Duration::from_millis(100);
        let start = Instant::now();

        // 10 probes at a ceiling of 5 is two full batches
        let outcomes = run_probes(endpoints(10), 5, |_| async move {
            sleep(delay).await;
            true
        })
        .await;

        assert_eq!(outcomes.len(), 10);
        let elapsed = start.elapsed();
        assert!(elapsed >= delay * 2, "elapsed {:?}", elapsed);
        assert!(elapsed < delay * 3, "elapsed {:?}", elapsed);
    }
}
