use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::dispatcher::run_burst;
use crate::executor::RequestExecutor;
use crate::proxy::ProxyPool;
use crate::stats::{summarize, IterationParams, IterationStatistics};
use crate::token::forge;

/// Runs the iterations strictly in sequence: forge a token for the
/// iteration's payload size, drain one burst, summarize it.
pub struct Orchestrator {
    config: Config,
    pool: Arc<ProxyPool>,
    executor: Arc<dyn RequestExecutor>,
}

impl Orchestrator {
    pub fn new(config: Config, pool: Arc<ProxyPool>, executor: Arc<dyn RequestExecutor>) -> Self {
        Self {
            config,
            pool,
            executor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every iteration, handing each summary to `on_iteration` before the
    /// next burst starts. An empty proxy pool stops the run at the first
    /// iteration with no statistics produced for it.
    pub async fn run<F>(&self, mut on_iteration: F) -> anyhow::Result<Vec<IterationStatistics>>
    where
        F: FnMut(&IterationStatistics),
    {
        let ramp = self.config.ramp();
        let threads = self.config.burst.threads;
        let requests = self.config.burst.requests;
        let mut results = Vec::with_capacity(ramp.iterations() as usize);

        for iteration in 1..=ramp.iterations() {
            let payload_size = ramp.size_for(iteration).with_context(|| {
                format!("payload size for iteration {iteration} overflows")
            })?;

            info!(
                "Starting iteration {}: payload {} chars, {} requests over {} workers",
                iteration, payload_size, requests, threads
            );

            let token = Arc::new(forge(
                &self.config.token.subject,
                &self.config.token.role,
                payload_size,
            ));

            let started = Instant::now();
            let outcomes = run_burst(
                &self.pool,
                self.executor.clone(),
                token,
                requests,
                threads,
            )
            .await
            .with_context(|| format!("Iteration {iteration} aborted"))?;

            let stats = summarize(
                &outcomes,
                IterationParams {
                    iteration,
                    threads,
                    requests,
                    payload_size,
                },
            );
            info!(
                "Iteration {} drained in {}ms: {}/{} succeeded",
                iteration,
                started.elapsed().as_millis(),
                stats.successful,
                stats.total
            );

            on_iteration(&stats);
            results.push(stats);
        }

        Ok(results)
    }
}
