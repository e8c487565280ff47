use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

use crate::executor::{RequestExecutor, RequestOutcome};
use crate::proxy::{PoolError, ProxyPool};
use crate::token::AuthToken;

#[derive(Debug, thiserror::Error)]
pub enum BurstError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("burst concurrency limit must be at least 1")]
    ZeroConcurrency,
    #[error("worker pool closed before the burst was dispatched")]
    WorkerPoolClosed,
}

/// Fan `request_count` requests out over at most `concurrency` concurrent
/// workers, each through a freshly selected proxy, and fan every outcome back
/// in. Returns only once all of them have finished; outcomes are in
/// completion order.
pub async fn run_burst(
    pool: &ProxyPool,
    executor: Arc<dyn RequestExecutor>,
    token: Arc<AuthToken>,
    request_count: usize,
    concurrency: usize,
) -> Result<Vec<RequestOutcome>, BurstError> {
    if pool.is_empty() {
        return Err(PoolError::Empty.into());
    }
    if concurrency == 0 {
        return Err(BurstError::ZeroConcurrency);
    }

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let (result_tx, mut result_rx) = mpsc::channel::<RequestOutcome>(request_count.max(1));

    let collector = tokio::spawn(async move {
        let mut outcomes = Vec::with_capacity(request_count);
        while let Some(outcome) = result_rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    });

    let mut handles = Vec::with_capacity(request_count);
    for _ in 0..request_count {
        let proxy = pool.select()?.clone();

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BurstError::WorkerPoolClosed)?;
        let executor = executor.clone();
        let token = token.clone();
        let result_tx = result_tx.clone();
        let proxy_uri = proxy.uri().to_string();

        let handle = tokio::spawn(async move {
            let outcome = executor.execute(&proxy, &token).await;
            let _ = result_tx.send(outcome).await;
            drop(permit);
        });
        handles.push((proxy_uri, handle));
    }
    drop(result_tx);

    // A unit that panicked never reported; count it as a failure for its proxy.
    let mut lost = Vec::new();
    for (proxy_uri, handle) in handles {
        if let Err(e) = handle.await {
            warn!("Request task via {} did not complete: {}", proxy_uri, e);
            lost.push(RequestOutcome::failure(proxy_uri));
        }
    }

    let mut outcomes = collector.await.unwrap_or_default();
    outcomes.extend(lost);
    debug!("Burst drained: {} outcomes", outcomes.len());
    Ok(outcomes)
}
