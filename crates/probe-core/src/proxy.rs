use anyhow::Context;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Selection from a pool with nothing in it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("proxy pool is empty: no routing target for the burst")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    Http,
    Https,
    Socks4,
    Socks4h,
    Socks5,
    Socks5h,
}

impl ProxyScheme {
    pub fn parse(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "socks4" => Some(Self::Socks4),
            "socks4h" => Some(Self::Socks4h),
            "socks5" => Some(Self::Socks5),
            "socks5h" => Some(Self::Socks5h),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Socks4 => "socks4",
            Self::Socks4h => "socks4h",
            Self::Socks5 => "socks5",
            Self::Socks5h => "socks5h",
        }
    }

    /// Scheme name understood by the HTTP client. SOCKS4 with proxy-side
    /// resolution is spelled `socks4a` there.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Self::Socks4h => "socks4a",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// Parsed connection descriptor of a well-formed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
}

/// One entry of the pool. Malformed entries keep their raw URI and carry no
/// parsed target; they fail later, at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    uri: String,
    target: Option<ProxyTarget>,
}

impl ProxyEndpoint {
    pub fn parse(raw: &str) -> Self {
        let uri = normalize(raw.trim());
        let target = parse_target(&uri);
        Self { uri, target }
    }

    /// Normalized URI as it will be handed to the transport.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn target(&self) -> Option<&ProxyTarget> {
        self.target.as_ref()
    }

    pub fn scheme(&self) -> Option<ProxyScheme> {
        self.target.as_ref().map(|t| t.scheme)
    }

    pub fn host(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.host.as_str())
    }

    pub fn is_malformed(&self) -> bool {
        self.target.is_none()
    }

    /// URI rewritten to the client's scheme spelling.
    pub fn transport_uri(&self) -> String {
        match self.scheme() {
            Some(scheme) if scheme.transport_name() != scheme.as_str() => {
                let rest = &self.uri[scheme.as_str().len()..];
                format!("{}{}", scheme.transport_name(), rest)
            }
            _ => self.uri.clone(),
        }
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Rewrite bare SOCKS schemes to their proxy-side DNS variants.
pub fn normalize(raw: &str) -> String {
    if let Some(rest) = strip_scheme(raw, "socks4://") {
        format!("socks4h://{rest}")
    } else if let Some(rest) = strip_scheme(raw, "socks5://") {
        format!("socks5h://{rest}")
    } else {
        raw.to_string()
    }
}

fn strip_scheme<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
    let head = raw.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &raw[prefix.len()..])
}

fn parse_target(uri: &str) -> Option<ProxyTarget> {
    let url = url::Url::parse(uri).ok()?;
    let scheme = ProxyScheme::parse(url.scheme())?;
    let host = url.host_str().filter(|h| !h.is_empty())?.to_string();
    let port = url.port_or_known_default()?;

    let credentials = if url.username().is_empty() {
        None
    } else {
        Some(Credentials {
            username: url.username().to_string(),
            password: url.password().map(str::to_string),
        })
    };

    Some(ProxyTarget {
        scheme,
        host,
        port,
        credentials,
    })
}

/// Immutable set of endpoints shared by every request of every burst.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Self {
        Self { endpoints }
    }

    /// Load from a line-oriented file; the first comma-separated field of each
    /// line is the proxy URI.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read proxy list {}", path.display()))?;
        let pool = Self::from_lines(contents.lines());

        for endpoint in pool.iter().filter(|e| e.is_malformed()) {
            warn!("Malformed proxy entry kept as-is: {}", endpoint.uri());
        }
        Ok(pool)
    }

    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let endpoints = lines
            .into_iter()
            .filter_map(|line| {
                let field = line.split(',').next().unwrap_or_default().trim();
                if field.is_empty() || field.starts_with('#') {
                    None
                } else {
                    Some(ProxyEndpoint::parse(field))
                }
            })
            .collect();
        Self { endpoints }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProxyEndpoint> {
        self.endpoints.iter()
    }

    pub fn malformed_count(&self) -> usize {
        self.endpoints.iter().filter(|e| e.is_malformed()).count()
    }

    /// Uniformly random endpoint, drawn independently on every call.
    pub fn select(&self) -> Result<&ProxyEndpoint, PoolError> {
        self.select_with(&mut rand::thread_rng())
    }

    pub fn select_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&ProxyEndpoint, PoolError> {
        self.endpoints.choose(rng).ok_or(PoolError::Empty)
    }
}
