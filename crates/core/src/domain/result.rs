use super::repo::RepositoryKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Terminal outcome for one repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Success,
    Failed,
    Skipped,
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStatus::Success => f.write_str("Success"),
            ProcessingStatus::Failed => f.write_str("Failed"),
            ProcessingStatus::Skipped => f.write_str("Skipped"),
        }
    }
}

/// What happened to one repository during a run. Created exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub repo_name: String,
    pub kind: RepositoryKind,
    pub status: ProcessingStatus,
    pub duration: Duration,
    pub error_message: Option<String>,
    /// Report directory, only set on success
    pub report_dir: Option<PathBuf>,
}

impl ProcessingResult {
    pub fn success(repo_name: impl Into<String>, kind: RepositoryKind, duration: Duration, report_dir: PathBuf) -> Self {
        Self {
            repo_name: repo_name.into(),
            kind,
            status: ProcessingStatus::Success,
            duration,
            error_message: None,
            report_dir: Some(report_dir),
        }
    }

    pub fn failed(repo_name: impl Into<String>, kind: RepositoryKind, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            repo_name: repo_name.into(),
            kind,
            status: ProcessingStatus::Failed,
            duration,
            error_message: Some(error.into()),
            report_dir: None,
        }
    }

    pub fn skipped(repo_name: impl Into<String>, kind: RepositoryKind, reason: impl Into<String>) -> Self {
        Self {
            repo_name: repo_name.into(),
            kind,
            status: ProcessingStatus::Skipped,
            duration: Duration::ZERO,
            error_message: Some(reason.into()),
            report_dir: None,
        }
    }

    pub fn duration_ms(&self) -> u128 {
        self.duration.as_millis()
    }

    pub fn is_success(&self) -> bool {
        self.status == ProcessingStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_status_and_message() {
        let ok = ProcessingResult::success("a", RepositoryKind::Normal, Duration::from_millis(1500), PathBuf::from("/out/a_report"));
        assert!(ok.is_success());
        assert_eq!(ok.duration_ms(), 1500);
        assert!(ok.error_message.is_none());

        let failed = ProcessingResult::failed("b", RepositoryKind::Bare, Duration::ZERO, "boom");
        assert_eq!(failed.status, ProcessingStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("boom"));
        assert!(failed.report_dir.is_none());

        let skipped = ProcessingResult::skipped("c", RepositoryKind::Normal, "gone");
        assert_eq!(skipped.status, ProcessingStatus::Skipped);
        assert_eq!(skipped.duration, Duration::ZERO);
    }
}
