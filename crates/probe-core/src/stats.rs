use serde::{Deserialize, Serialize};

use crate::executor::RequestOutcome;

/// Burst parameters the statistics are attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationParams {
    pub iteration: u32,
    pub threads: usize,
    pub requests: usize,
    pub payload_size: usize,
}

/// Response time distribution over successful requests, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub max_s: f64,
    pub mean_s: f64,
    pub median_s: f64,
    /// Sample standard deviation; needs at least two samples.
    pub std_dev_s: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: u16,
    pub count: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationStatistics {
    pub iteration: u32,
    pub threads: usize,
    pub requests: usize,
    pub payload_size: usize,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Absent when there were no successful requests
    pub latency: Option<LatencySummary>,
    /// Absent when there were no requests at all
    pub success_rate: Option<f64>,
    /// Status codes in first-seen order
    pub status_codes: Vec<StatusCount>,
}

/// Summarize one burst. Order of `outcomes` only affects the order of the
/// status histogram.
pub fn summarize(outcomes: &[RequestOutcome], params: IterationParams) -> IterationStatistics {
    let total = outcomes.len() as u64;
    let samples: Vec<f64> = outcomes
        .iter()
        .filter_map(|o| o.elapsed.map(|d| d.as_secs_f64()))
        .collect();
    let successful = samples.len() as u64;

    let success_rate = (total > 0).then(|| successful as f64 * 100.0 / total as f64);

    let mut status_codes: Vec<StatusCount> = Vec::new();
    for status in outcomes.iter().filter_map(|o| o.status) {
        match status_codes.iter_mut().find(|s| s.status == status) {
            Some(entry) => entry.count += 1,
            None => status_codes.push(StatusCount {
                status,
                count: 1,
                percent: 0.0,
            }),
        }
    }
    for entry in &mut status_codes {
        entry.percent = entry.count as f64 * 100.0 / total as f64;
    }

    IterationStatistics {
        iteration: params.iteration,
        threads: params.threads,
        requests: params.requests,
        payload_size: params.payload_size,
        total,
        successful,
        failed: total - successful,
        latency: latency_summary(&samples),
        success_rate,
        status_codes,
    }
}

fn latency_summary(samples: &[f64]) -> Option<LatencySummary> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let max = samples.iter().copied().fold(f64::MIN, f64::max);

    Some(LatencySummary {
        max_s: max,
        mean_s: mean,
        median_s: median(samples),
        std_dev_s: sample_std_dev(samples, mean),
    })
}

fn median(samples: &[f64]) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let len = sorted.len();
    if len % 2 == 0 {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    } else {
        sorted[len / 2]
    }
}

fn sample_std_dev(samples: &[f64], mean: f64) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let variance =
        samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
    Some(variance.sqrt())
}
