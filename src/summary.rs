use fleetstats_core::domain::{ProcessingResult, ProcessingStatus};
use std::fmt;
use std::time::Duration;

/// Exit status when every repository was processed or skipped
pub const EXIT_OK: u8 = 0;
/// Exit status when at least one repository failed
pub const EXIT_REPOSITORY_FAILED: u8 = 1;
/// Exit status for errors that stopped the run before processing
pub const EXIT_FATAL: u8 = 2;

/// Aggregated outcome of one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    results: Vec<ProcessingResult>,
    discovered: usize,
    elapsed: Duration,
}

impl RunSummary {
    pub fn new(results: Vec<ProcessingResult>, discovered: usize, elapsed: Duration) -> Self {
        Self {
            results,
            discovered,
            elapsed,
        }
    }

    pub fn results(&self) -> &[ProcessingResult] {
        &self.results
    }

    pub fn discovered(&self) -> usize {
        self.discovered
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn count(&self, status: ProcessingStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(ProcessingStatus::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(ProcessingStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(ProcessingStatus::Skipped)
    }

    /// (repository, error message) for every failed repository, by name
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.messages(ProcessingStatus::Failed)
    }

    /// (repository, reason) for every skipped repository, by name
    pub fn skipped_reasons(&self) -> Vec<(&str, &str)> {
        self.messages(ProcessingStatus::Skipped)
    }

    fn messages(&self, status: ProcessingStatus) -> Vec<(&str, &str)> {
        self.sorted_results()
            .into_iter()
            .filter(|r| r.status == status)
            .map(|r| (r.repo_name.as_str(), r.error_message.as_deref().unwrap_or("")))
            .collect()
    }

    pub fn sorted_results(&self) -> Vec<&ProcessingResult> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by(|a, b| a.repo_name.cmp(&b.repo_name));
        sorted
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn exit_code(&self) -> u8 {
        if self.has_failures() {
            EXIT_REPOSITORY_FAILED
        } else {
            EXIT_OK
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Processed {} repositories in {:.1}s: {} succeeded, {} failed, {} skipped",
            self.discovered,
            self.elapsed.as_secs_f64(),
            self.succeeded(),
            self.failed(),
            self.skipped()
        )?;
        for (name, message) in self.failures() {
            writeln!(f, "  FAILED  {}: {}", name, message)?;
        }
        for (name, reason) in self.skipped_reasons() {
            writeln!(f, "  SKIPPED {}: {}", name, reason)?;
        }
        Ok(())
    }
}
