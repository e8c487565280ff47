use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::stats::IterationStatistics;

impl fmt::Display for IterationStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Iteration {} Statistics ---", self.iteration)?;
        writeln!(f, "Threads: {}, Requests: {}", self.threads, self.requests)?;
        writeln!(f, "Total Requests: {}", self.total)?;
        writeln!(f, "Successful Requests: {}", self.successful)?;
        writeln!(f, "Failed Requests: {}", self.failed)?;
        writeln!(f, "Payload size: {}", self.payload_size)?;

        if let Some(latency) = &self.latency {
            writeln!(f, "Maximum Response Time: {:.2}s", latency.max_s)?;
            writeln!(f, "Average Response Time: {:.2}s", latency.mean_s)?;
            writeln!(f, "Median Response Time: {:.2}s", latency.median_s)?;
            match latency.std_dev_s {
                Some(sd) => writeln!(f, "Standard Deviation: {:.2}s", sd)?,
                None => writeln!(f, "Standard Deviation: n/a (fewer than 2 samples)")?,
            }
        }

        if let Some(rate) = self.success_rate {
            writeln!(f, "Success Rate: {:.2}%", rate)?;
        }

        if self.latency.is_none() {
            return writeln!(f, "No successful requests to analyze.");
        }

        writeln!(f, "Response Code Distribution:")?;
        for entry in &self.status_codes {
            writeln!(
                f,
                "Status {}: {} ({:.2}%)",
                entry.status, entry.count, entry.percent
            )?;
        }
        Ok(())
    }
}

/// Print one iteration's report to stdout.
pub fn report(stats: &IterationStatistics) {
    println!();
    print!("{stats}");
}

/// Everything a finished run produced, as written to the results directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: String,
    pub target: String,
    pub executor: String,
    pub proxies: usize,
    pub iterations: Vec<IterationStatistics>,
}

impl RunSummary {
    /// Write as pretty JSON to `<dir>/run_<YYYYmmdd_HHMMSS>.json`.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create results dir {}", dir.display()))?;

        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("run_{stamp}.json"));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RequestOutcome;
    use crate::stats::{summarize, IterationParams};
    use std::time::Duration;

    fn params(iteration: u32) -> IterationParams {
        IterationParams {
            iteration,
            threads: 5,
            requests: 4,
            payload_size: 40,
        }
    }

    #[test]
    fn test_full_report_layout() {
        let outcomes = vec![
            RequestOutcome::success("http://a.test:1", Duration::from_millis(500), 200),
            RequestOutcome::success("http://a.test:1", Duration::from_millis(1500), 200),
            RequestOutcome::success("http://b.test:1", Duration::from_millis(1000), 431),
            RequestOutcome::failure("http://c.test:1"),
        ];
        let text = summarize(&outcomes, params(2)).to_string();
        let expected = "\
--- Iteration 2 Statistics ---
Threads: 5, Requests: 4
Total Requests: 4
Successful Requests: 3
Failed Requests: 1
Payload size: 40
Maximum Response Time: 1.50s
Average Response Time: 1.00s
Median Response Time: 1.00s
Standard Deviation: 0.50s
Success Rate: 75.00%
Response Code Distribution:
Status 200: 2 (50.00%)
Status 431: 1 (25.00%)
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_all_failed_report() {
        let outcomes = vec![RequestOutcome::failure("http://c.test:1"); 4];
        let text = summarize(&outcomes, params(1)).to_string();

        assert!(text.contains("Failed Requests: 4"));
        assert!(text.contains("Success Rate: 0.00%"));
        assert!(text.ends_with("No successful requests to analyze.\n"));
        assert!(!text.contains("Maximum Response Time"));
        assert!(!text.contains("Response Code Distribution"));
    }

    #[test]
    fn test_single_sample_std_dev_not_available() {
        let outcomes = vec![RequestOutcome::success(
            "http://a.test:1",
            Duration::from_millis(300),
            200,
        )];
        let text = summarize(&outcomes, params(1)).to_string();
        assert!(text.contains("Standard Deviation: n/a"));
        assert!(text.contains("Status 200: 1 (100.00%)"));
    }

    #[test]
    fn test_run_summary_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let summary = RunSummary {
            timestamp: "2024-05-01T12:00:00Z".to_string(),
            target: "https://service.test/".to_string(),
            executor: "mock".to_string(),
            proxies: 3,
            iterations: vec![summarize(
                &[RequestOutcome::failure("http://c.test:1")],
                params(1),
            )],
        };

        let path = summary.write_to_dir(dir.path().join("results")).unwrap();
        let parsed: RunSummary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.iterations.len(), 1);
        assert_eq!(parsed.iterations[0].failed, 1);
        assert_eq!(parsed.proxies, 3);
    }
}
