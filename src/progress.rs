use fleetstats_core::domain::{ProcessingResult, ProcessingStatus};
use std::fmt;
use std::time::{Duration, Instant};

/// Completions needed before an ETA is estimated
pub const ETA_MIN_SAMPLES: usize = 5;

/// Progress line emitted while a run is in flight
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub processed: usize,
    pub total: usize,
    pub eta: Option<Duration>,
}

impl ProgressReport {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.processed as f64 * 100.0 / self.total as f64
        }
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Progress: {}/{} repositories completed ({:.1}%)",
            self.processed,
            self.total,
            self.percent()
        )?;
        if let Some(eta) = self.eta {
            // Whole seconds, rounded up so a short wait never shows as 0s
            let secs = eta.as_secs() + u64::from(eta.subsec_nanos() > 0);
            write!(f, ", ETA: {}m {}s", secs / 60, secs % 60)?;
        }
        Ok(())
    }
}

/// Counters shared by every task of a run; always used behind one mutex.
#[derive(Debug)]
pub struct BatchProgressState {
    processed: usize,
    succeeded: usize,
    failed: Vec<(String, String)>,
    skipped: usize,
    total: usize,
    started_at: Instant,
    completion_times: Vec<Instant>,
    last_report_at: Instant,
    interval: Duration,
}

impl BatchProgressState {
    pub fn new(total: usize, interval: Duration, started_at: Instant) -> Self {
        Self {
            processed: 0,
            succeeded: 0,
            failed: Vec::new(),
            skipped: 0,
            total,
            started_at,
            completion_times: Vec::new(),
            last_report_at: started_at,
            interval,
        }
    }

    /// Count one finished repository. Returns a report when one is due:
    /// the interval elapsed since the last one, or this was the final repository.
    pub fn record(&mut self, result: &ProcessingResult, now: Instant) -> Option<ProgressReport> {
        self.processed += 1;
        self.completion_times.push(now);
        match result.status {
            ProcessingStatus::Success => self.succeeded += 1,
            ProcessingStatus::Failed => self.failed.push((
                result.repo_name.clone(),
                result.error_message.clone().unwrap_or_default(),
            )),
            ProcessingStatus::Skipped => self.skipped += 1,
        }

        let due = now.saturating_duration_since(self.last_report_at) >= self.interval || self.processed == self.total;
        if !due {
            return None;
        }
        self.last_report_at = now;
        Some(ProgressReport {
            processed: self.processed,
            total: self.total,
            eta: self.eta(now),
        })
    }

    /// remaining * mean time per completed repository
    fn eta(&self, now: Instant) -> Option<Duration> {
        if self.completion_times.len() < ETA_MIN_SAMPLES || self.processed == 0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.processed);
        let per_repo = now.saturating_duration_since(self.started_at) / self.processed as u32;
        let eta = per_repo * remaining as u32;
        (!eta.is_zero()).then_some(eta)
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> &[(String, String)] {
        &self.failed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetstats_core::domain::RepositoryKind;
    use std::path::PathBuf;

    fn ok(name: &str) -> ProcessingResult {
        ProcessingResult::success(name, RepositoryKind::Normal, Duration::from_secs(1), PathBuf::from("/out"))
    }

    #[test]
    fn test_report_only_after_interval_or_on_last() {
        let start = Instant::now();
        let mut state = BatchProgressState::new(3, Duration::from_secs(5), start);

        assert!(state.record(&ok("a"), start + Duration::from_secs(1)).is_none());
        let report = state.record(&ok("b"), start + Duration::from_secs(6)).expect("interval elapsed");
        assert_eq!(report.processed, 2);
        assert!(report.eta.is_none());

        let last = state.record(&ok("c"), start + Duration::from_secs(7)).expect("final item");
        assert_eq!(last.processed, 3);
        assert_eq!(last.to_string(), "Progress: 3/3 repositories completed (100.0%)");
    }

    #[test]
    fn test_eta_after_enough_samples() {
        let start = Instant::now();
        let mut state = BatchProgressState::new(10, Duration::ZERO, start);
        let mut last = None;
        for i in 1..=5 {
            last = state.record(&ok(&format!("r{}", i)), start + Duration::from_secs(12 * i));
        }

        // 60s for 5 repositories, 5 remaining
        let report = last.expect("zero interval reports every item");
        assert_eq!(report.eta, Some(Duration::from_secs(60)));
        assert_eq!(report.to_string(), "Progress: 5/10 repositories completed (50.0%), ETA: 1m 0s");
    }

    #[test]
    fn test_sub_second_eta_rounds_up() {
        let report = ProgressReport {
            processed: 5,
            total: 7,
            eta: Some(Duration::from_millis(40)),
        };
        assert_eq!(report.to_string(), "Progress: 5/7 repositories completed (71.4%), ETA: 0m 1s");

        let report = ProgressReport {
            eta: Some(Duration::from_millis(59_500)),
            ..report
        };
        assert!(report.to_string().ends_with("ETA: 1m 0s"));
    }

    #[test]
    fn test_tracks_outcomes() {
        let start = Instant::now();
        let mut state = BatchProgressState::new(3, Duration::from_secs(60), start);
        state.record(&ok("a"), start);
        state.record(&ProcessingResult::failed("b", RepositoryKind::Normal, Duration::ZERO, "boom"), start);
        state.record(&ProcessingResult::skipped("c", RepositoryKind::Normal, "gone"), start);

        assert_eq!(state.processed(), 3);
        assert_eq!(state.succeeded(), 1);
        assert_eq!(state.failed(), &[("b".to_string(), "boom".to_string())]);
        assert_eq!(state.skipped(), 1);
    }
}
