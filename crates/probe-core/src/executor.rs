use rand::seq::SliceRandom;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

use crate::proxy::ProxyEndpoint;
use crate::token::AuthToken;

pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.101 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/91.0.864.59 Safari/537.36",
];

/// Standard top-level navigation headers sent with every request.
pub const NAVIGATION_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.5"),
    ("accept-encoding", "gzip, deflate, br"),
    ("dnt", "1"),
    ("connection", "keep-alive"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("cache-control", "max-age=0"),
];

/// Result of one dispatched request. `elapsed` and `status` are both absent
/// when the request failed at the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub proxy: String,
    pub elapsed: Option<Duration>,
    pub status: Option<u16>,
}

impl RequestOutcome {
    pub fn success(proxy: impl Into<String>, elapsed: Duration, status: u16) -> Self {
        Self {
            proxy: proxy.into(),
            elapsed: Some(elapsed),
            status: Some(status),
        }
    }

    pub fn failure(proxy: impl Into<String>) -> Self {
        Self {
            proxy: proxy.into(),
            elapsed: None,
            status: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.elapsed.is_some()
    }
}

/// Sends one request through one proxy. Implementations never fail: every
/// error is folded into a failed [`RequestOutcome`].
pub trait RequestExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute<'a>(
        &'a self,
        proxy: &'a ProxyEndpoint,
        token: &'a AuthToken,
    ) -> Pin<Box<dyn Future<Output = RequestOutcome> + Send + 'a>>;
}

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// GET against a fixed target, routed through the given proxy.
pub struct HttpExecutor {
    target: url::Url,
    timeout: Duration,
    cookie_name: String,
}

impl HttpExecutor {
    pub fn new(target: url::Url, timeout: Duration, cookie_name: impl Into<String>) -> Self {
        Self {
            target,
            timeout,
            cookie_name: cookie_name.into(),
        }
    }

    pub fn target(&self) -> &url::Url {
        &self.target
    }

    fn headers(&self, token: &AuthToken) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in NAVIGATION_HEADERS {
            headers.insert(*name, HeaderValue::from_static(*value));
        }
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(random_user_agent()),
        );
        let cookie = format!("{}={}", self.cookie_name, token.as_str());
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie)?);
        Ok(headers)
    }

    async fn send(&self, proxy: &ProxyEndpoint, token: &AuthToken) -> anyhow::Result<(Duration, u16)> {
        // One client per request: no connection reuse across proxies.
        let client = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(proxy.transport_uri())?)
            .timeout(self.timeout)
            .build()?;
        let request = client
            .get(self.target.clone())
            .headers(self.headers(token)?);

        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status().as_u16();
        response.bytes().await?;
        Ok((start.elapsed(), status))
    }
}

impl RequestExecutor for HttpExecutor {
    fn name(&self) -> &'static str {
        "http"
    }

    fn execute<'a>(
        &'a self,
        proxy: &'a ProxyEndpoint,
        token: &'a AuthToken,
    ) -> Pin<Box<dyn Future<Output = RequestOutcome> + Send + 'a>> {
        Box::pin(async move {
            match self.send(proxy, token).await {
                Ok((elapsed, status)) => RequestOutcome::success(proxy.uri(), elapsed, status),
                Err(e) => {
                    debug!("Request via {} failed: {:#}", proxy, e);
                    RequestOutcome::failure(proxy.uri())
                }
            }
        })
    }
}

/// In-process executor for dry runs and tests: answers after a fixed delay,
/// and fails for malformed proxies or hosts marked as dead.
pub struct MockExecutor {
    delay: Duration,
    status: u16,
    dead_hosts: HashSet<String>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockExecutor {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            status: 200,
            dead_hosts: HashSet::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_dead_host(mut self, host: impl Into<String>) -> Self {
        self.dead_hosts.insert(host.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of requests observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl RequestExecutor for MockExecutor {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn execute<'a>(
        &'a self,
        proxy: &'a ProxyEndpoint,
        _token: &'a AuthToken,
    ) -> Pin<Box<dyn Future<Output = RequestOutcome> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

            let start = Instant::now();
            sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let dead = match proxy.host() {
                Some(host) => self.dead_hosts.contains(host),
                None => true,
            };
            if dead {
                RequestOutcome::failure(proxy.uri())
            } else {
                RequestOutcome::success(proxy.uri(), start.elapsed(), self.status)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::forge;

    #[tokio::test]
    async fn test_mock_success_and_dead_hosts() {
        let executor = MockExecutor::new(1).with_dead_host("dead.test");
        let token = forge("u", "r", 4);

        let good = ProxyEndpoint::parse("http://alive.test:8080");
        let outcome = executor.execute(&good, &token).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.proxy, "http://alive.test:8080");

        let dead = ProxyEndpoint::parse("http://dead.test:8080");
        let outcome = executor.execute(&dead, &token).await;
        assert_eq!(outcome, RequestOutcome::failure("http://dead.test:8080"));

        let malformed = ProxyEndpoint::parse("garbage");
        assert!(!executor.execute(&malformed, &token).await.is_success());
        assert_eq!(executor.calls(), 3);
    }

    #[tokio::test]
    async fn test_http_executor_unusable_proxy_is_failure() {
        let target = url::Url::parse("http://127.0.0.1:9/").unwrap();
        let executor = HttpExecutor::new(target, Duration::from_millis(200), "jwt");
        let token = forge("u", "r", 4);

        let malformed = ProxyEndpoint::parse("::not a uri::");
        let outcome = executor.execute(&malformed, &token).await;
        assert_eq!(outcome.elapsed, None);
        assert_eq!(outcome.status, None);
    }

    #[tokio::test]
    async fn test_http_executor_unreachable_proxy_is_failure() {
        // Bind then drop to get a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = url::Url::parse("http://service.test/").unwrap();
        let executor = HttpExecutor::new(target, Duration::from_millis(500), "jwt");
        let proxy = ProxyEndpoint::parse(&format!("http://127.0.0.1:{port}"));
        let outcome = executor.execute(&proxy, &forge("u", "r", 4)).await;
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_headers_carry_cookie_and_agent() {
        let target = url::Url::parse("https://service.test/").unwrap();
        let executor = HttpExecutor::new(target, Duration::from_secs(1), "jwt");
        let token = forge("u", "r", 8);
        let headers = executor.headers(&token).unwrap();

        assert_eq!(
            headers.get(header::COOKIE).unwrap().to_str().unwrap(),
            format!("jwt={}", token.as_str())
        );
        let agent = headers.get(header::USER_AGENT).unwrap().to_str().unwrap();
        assert!(USER_AGENTS.contains(&agent));
        assert_eq!(headers.get("sec-fetch-mode").unwrap(), "navigate");
    }
}
