use anyhow::{Context, Result};
use clap::Parser;
use probe_core::{Config, ProxyPool, ProxyScheme};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "preflight")]
#[command(about = "Offline checks of the probe config and proxy list (no traffic is sent)")]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config/example.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    info!("Validating config...");
    cfg.validate().context("Invalid configuration")?;
    let target = cfg.target_url()?;

    println!();
    println!("=== Preflight ===");
    println!("Target: {target}");
    println!("Timeout: {}ms", cfg.target.timeout_ms);
    println!(
        "Burst: {} requests over {} workers",
        cfg.burst.requests, cfg.burst.threads
    );

    println!();
    println!("Payload schedule:");
    for (iteration, size) in cfg.ramp().sizes() {
        println!("  Iteration {iteration}: {size} chars");
    }

    let pool = ProxyPool::load(&cfg.proxies.path)
        .with_context(|| format!("Failed to load proxies from {:?}", cfg.proxies.path))?;

    let mut by_scheme: BTreeMap<&'static str, usize> = BTreeMap::new();
    for scheme in pool.iter().filter_map(|e| e.scheme()) {
        *by_scheme.entry(scheme_label(scheme)).or_default() += 1;
    }

    println!();
    println!("Proxies: {} from {:?}", pool.len(), cfg.proxies.path);
    for (scheme, count) in &by_scheme {
        println!("  {scheme}: {count}");
    }

    let malformed: Vec<&str> = pool
        .iter()
        .filter(|e| e.is_malformed())
        .map(|e| e.uri())
        .collect();
    if !malformed.is_empty() {
        warn!("{} malformed entries will fail at request time", malformed.len());
        println!("  malformed: {}", malformed.len());
        for uri in malformed {
            println!("    {uri}");
        }
    }

    if pool.is_empty() {
        anyhow::bail!("Preflight failed: proxy list {:?} is empty", cfg.proxies.path);
    }

    println!();
    println!("Preflight OK.");
    Ok(())
}

fn scheme_label(scheme: ProxyScheme) -> &'static str {
    match scheme {
        ProxyScheme::Socks4h => "socks4h (proxy-side DNS)",
        ProxyScheme::Socks5h => "socks5h (proxy-side DNS)",
        other => other.as_str(),
    }
}
