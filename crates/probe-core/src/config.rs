use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ramp::PayloadRamp;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub burst: BurstConfig,
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub proxies: ProxiesConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Check every value the run depends on before any request is sent.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.target_url()?;

        if self.target.timeout_ms == 0 {
            anyhow::bail!("target.timeout_ms must be non-zero");
        }
        if self.burst.threads == 0 {
            anyhow::bail!("burst.threads must be at least 1");
        }
        if self.burst.requests == 0 {
            anyhow::bail!("burst.requests must be at least 1");
        }
        if self.payload.iterations == 0 {
            anyhow::bail!("payload.iterations must be at least 1");
        }
        if self.payload.growth_factor == 0 {
            anyhow::bail!("payload.growth_factor must be at least 1");
        }
        if self.ramp().largest().is_none() {
            anyhow::bail!(
                "payload schedule overflows: initial_size={} growth_factor={} iterations={}",
                self.payload.initial_size,
                self.payload.growth_factor,
                self.payload.iterations
            );
        }
        Ok(())
    }

    pub fn target_url(&self) -> anyhow::Result<url::Url> {
        let raw = self.target.url.trim();
        if raw.is_empty() {
            anyhow::bail!("target.url is required");
        }
        let url = url::Url::parse(raw).map_err(|e| anyhow::anyhow!("Invalid target URL {raw}: {e}"))?;
        match url.scheme() {
            "http" | "https" => {}
            other => anyhow::bail!("target URL must be http:// or https:// (got {other}://)"),
        }
        if url.host_str().is_none() {
            anyhow::bail!("target URL must include a hostname (got {raw})");
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.target.timeout_ms)
    }

    pub fn ramp(&self) -> PayloadRamp {
        PayloadRamp::new(&self.payload)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// URL every request is sent to
    #[serde(default)]
    pub url: String,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstConfig {
    /// Maximum concurrent requests within one burst
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Requests dispatched per iteration
    #[serde(default = "default_requests")]
    pub requests: usize,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            requests: default_requests(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadConfig {
    /// Filler length for the first iteration
    #[serde(default = "default_initial_size")]
    pub initial_size: usize,
    /// Multiplier applied between consecutive iterations
    #[serde(default = "default_growth_factor")]
    pub growth_factor: usize,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            initial_size: default_initial_size(),
            growth_factor: default_growth_factor(),
            iterations: default_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_role")]
    pub role: String,
    /// Cookie the token is attached under
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            role: default_role(),
            cookie_name: default_cookie_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxiesConfig {
    /// Line-oriented proxy list; first comma-separated field of each line is the URI
    #[serde(default = "default_proxies_path")]
    pub path: PathBuf,
}

impl Default for ProxiesConfig {
    fn default() -> Self {
        Self {
            path: default_proxies_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for the JSON run summary; nothing is written when unset
    #[serde(default)]
    pub results_dir: Option<PathBuf>,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_threads() -> usize {
    10
}

fn default_requests() -> usize {
    50
}

fn default_initial_size() -> usize {
    20
}

fn default_growth_factor() -> usize {
    2
}

fn default_iterations() -> u32 {
    10
}

fn default_subject() -> String {
    "example_user".to_string()
}

fn default_role() -> String {
    "admin".to_string()
}

fn default_cookie_name() -> String {
    "jwt".to_string()
}

fn default_proxies_path() -> PathBuf {
    PathBuf::from("proxies.csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serde() {
        let config_str = r#"
[target]
url = "https://staging.example.test/"
timeout_ms = 5000

[burst]
threads = 4
requests = 20

[payload]
initial_size = 32
growth_factor = 3
iterations = 5

[token]
subject = "probe"
role = "viewer"

[proxies]
path = "lists/proxies.csv"

[output]
results_dir = "results"
        "#;

        let config: Config = toml::from_str(config_str).unwrap();
        assert_eq!(config.target.url, "https://staging.example.test/");
        assert_eq!(config.target.timeout_ms, 5000);
        assert_eq!(config.burst.threads, 4);
        assert_eq!(config.burst.requests, 20);
        assert_eq!(config.payload.initial_size, 32);
        assert_eq!(config.payload.growth_factor, 3);
        assert_eq!(config.payload.iterations, 5);
        assert_eq!(config.token.subject, "probe");
        assert_eq!(config.token.role, "viewer");
        assert_eq!(config.token.cookie_name, "jwt");
        assert_eq!(config.proxies.path, PathBuf::from("lists/proxies.csv"));
        assert_eq!(config.output.results_dir, Some(PathBuf::from("results")));
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: Config = toml::from_str(
            r#"
[target]
url = "https://staging.example.test/"
        "#,
        )
        .unwrap();

        assert_eq!(config.target.timeout_ms, 10_000);
        assert_eq!(config.burst.threads, 10);
        assert_eq!(config.burst.requests, 50);
        assert_eq!(config.payload.initial_size, 20);
        assert_eq!(config.payload.growth_factor, 2);
        assert_eq!(config.payload.iterations, 10);
        assert_eq!(config.token.subject, "example_user");
        assert_eq!(config.token.role, "admin");
        assert_eq!(config.proxies.path, PathBuf::from("proxies.csv"));
        assert!(config.output.results_dir.is_none());
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.validate().is_err(), "missing target must fail");

        config.target.url = "ftp://files.example.test/".to_string();
        assert!(config.validate().is_err(), "non-http scheme must fail");

        config.target.url = "https://staging.example.test/".to_string();
        config.validate().unwrap();

        config.burst.threads = 0;
        assert!(config.validate().is_err());
        config.burst.threads = 10;

        config.burst.requests = 0;
        assert!(config.validate().is_err());
        config.burst.requests = 50;

        config.payload.growth_factor = 0;
        assert!(config.validate().is_err());
        config.payload.growth_factor = 2;

        config.payload.iterations = 200;
        assert!(config.validate().is_err(), "schedule overflow must fail");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.toml");
        std::fs::write(
            &path,
            "[target]\nurl = \"http://127.0.0.1:8080/\"\n[burst]\nthreads = 2\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.burst.threads, 2);
        assert_eq!(config.target_url().unwrap().port(), Some(8080));
    }
}
