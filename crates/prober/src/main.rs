use anyhow::{Context, Result};
use clap::Parser;
use probe_core::{
    report, Config, HttpExecutor, MockExecutor, Orchestrator, ProxyPool, RequestExecutor,
    RunSummary,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "prober")]
#[command(about = "Sends bursts carrying a growing unsigned token through a proxy pool and reports per-iteration latency")]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target URL (overrides config)
    #[arg(long)]
    target: Option<String>,

    /// Proxy list file (overrides config)
    #[arg(long)]
    proxies: Option<PathBuf>,

    /// Number of iterations (overrides config)
    #[arg(long)]
    iterations: Option<u32>,

    /// Concurrent workers per burst (overrides config)
    #[arg(long)]
    threads: Option<usize>,

    /// Requests per burst (overrides config)
    #[arg(long)]
    requests: Option<usize>,

    /// Filler length of the first iteration (overrides config)
    #[arg(long)]
    initial_size: Option<usize>,

    /// Per-request timeout in milliseconds (overrides config)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Directory for the JSON run summary (overrides config)
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Answer requests in-process instead of sending them
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    let target = config.target_url()?;
    let pool = ProxyPool::load(&config.proxies.path).with_context(|| {
        format!("Failed to load proxies from {:?}", config.proxies.path)
    })?;
    info!(
        "Loaded {} proxies ({} malformed) from {:?}",
        pool.len(),
        pool.malformed_count(),
        config.proxies.path
    );

    let executor: Arc<dyn RequestExecutor> = if args.mock {
        Arc::new(MockExecutor::new(5))
    } else {
        Arc::new(HttpExecutor::new(
            target.clone(),
            config.timeout(),
            config.token.cookie_name.clone(),
        ))
    };
    info!("Using executor: {} against {}", executor.name(), target);

    let executor_name = executor.name().to_string();
    let proxies = pool.len();
    let results_dir = config.output.results_dir.clone();
    let orchestrator = Orchestrator::new(config, Arc::new(pool), executor);
    let iterations = orchestrator.run(report).await?;

    if let Some(dir) = results_dir {
        let summary = RunSummary {
            timestamp: chrono::Utc::now().to_rfc3339(),
            target: target.to_string(),
            executor: executor_name,
            proxies,
            iterations,
        };
        let path = summary.write_to_dir(&dir)?;
        info!("Results written to {}", path.display());
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(target) = &args.target {
        config.target.url = target.clone();
    }
    if let Some(path) = &args.proxies {
        config.proxies.path = path.clone();
    }
    if let Some(iterations) = args.iterations {
        config.payload.iterations = iterations;
    }
    if let Some(threads) = args.threads {
        config.burst.threads = threads;
    }
    if let Some(requests) = args.requests {
        config.burst.requests = requests;
    }
    if let Some(size) = args.initial_size {
        config.payload.initial_size = size;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.target.timeout_ms = timeout_ms;
    }
    if let Some(dir) = &args.results_dir {
        config.output.results_dir = Some(dir.clone());
    }
}
