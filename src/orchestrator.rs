//! Batch-parallel processing of a repository fleet.
//!
//! Repositories are processed in fixed-size batches on one rayon pool per run.
//! Each task sends its [`ProcessingResult`] back over a channel; the calling
//! thread records results in completion order and prints progress. A batch is
//! finished only once every one of its results has arrived.

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;
use fleetstats_core::domain::{CancellationFlag, ProcessingResult, RepoState, RepositoryDescriptor};
use fleetstats_core::error::ProcessingError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::processor::{assign_output_dirs, cleanup_output, RepositoryProcessor};
use crate::progress::BatchProgressState;

pub const CANCELLED_REASON: &str = "cancelled before processing started";

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub batch_size: usize,
    pub max_workers: usize,
    pub progress_interval: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.processing.batch_size,
            max_workers: config.processing.max_workers,
            progress_interval: config.progress_interval(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct BatchOrchestrator {
    processor: RepositoryProcessor,
    settings: OrchestratorSettings,
    cancel: CancellationFlag,
}

impl BatchOrchestrator {
    pub fn new(processor: RepositoryProcessor, settings: OrchestratorSettings, cancel: CancellationFlag) -> Self {
        Self {
            processor,
            settings,
            cancel,
        }
    }

    /// Process every repository, writing reports under `output_base`.
    ///
    /// Returns exactly one result per repository, in completion order.
    pub fn run(&self, repositories: &[RepositoryDescriptor], output_base: &Path) -> Result<Vec<ProcessingResult>> {
        let total = repositories.len();
        let batch_size = self.settings.batch_size.max(1);
        let workers = self.settings.max_workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("fleetstats-worker-{}", i))
            .build()
            .context("Failed to start worker pool")?;

        info!("Processing {} repositories with {} workers, batch size {}", total, workers, batch_size);

        let output_dirs = assign_output_dirs(output_base, repositories);
        let jobs: Vec<(&RepositoryDescriptor, PathBuf)> = repositories.iter().zip(output_dirs).collect();
        let progress = Mutex::new(BatchProgressState::new(total, self.settings.progress_interval, Instant::now()));
        let mut results = Vec::with_capacity(total);
        let batch_count = total.div_ceil(batch_size);

        for (index, batch) in jobs.chunks(batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Processing interrupted; skipping {} remaining repositories", total - results.len());
                for (repo, _) in jobs.iter().skip(index * batch_size) {
                    let result = ProcessingResult::skipped(repo.name.clone(), repo.kind, CANCELLED_REASON);
                    self.record(&progress, &result);
                    results.push(result);
                }
                break;
            }

            let first = index * batch_size + 1;
            debug!(
                "Processing batch {}/{}: repositories {}-{}",
                index + 1,
                batch_count,
                first,
                first + batch.len() - 1
            );

            let (tx, rx) = unbounded();
            pool.in_place_scope(|scope| {
                for (repo, output_dir) in batch {
                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        let _ = tx.send(self.process_one(repo, output_dir));
                    });
                }
                drop(tx);

                for result in rx.iter() {
                    self.record(&progress, &result);
                    results.push(result);
                }
            });
        }

        Ok(results)
    }

    fn record(&self, progress: &Mutex<BatchProgressState>, result: &ProcessingResult) {
        if result.is_success() {
            info!("{} completed in {:.2}s", result.repo_name, result.duration.as_secs_f64());
        }

        let report = progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(result, Instant::now());
        if let Some(report) = report {
            println!("{}", report);
        }
    }

    /// Drive one repository through its states to a terminal result.
    fn process_one(&self, repo: &RepositoryDescriptor, output_dir: &Path) -> ProcessingResult {
        let mut state = RepoState::Discovered;

        if self.cancel.is_cancelled() {
            enter(&mut state, RepoState::Skipped, repo);
            return ProcessingResult::skipped(repo.name.clone(), repo.kind, CANCELLED_REASON);
        }

        enter(&mut state, RepoState::Validating, repo);
        if let Err(e) = self.processor.validate(repo) {
            enter(&mut state, RepoState::Skipped, repo);
            warn!("Skipping {}: {}", repo.name, e);
            return ProcessingResult::skipped(repo.name.clone(), repo.kind, e.to_string());
        }

        enter(&mut state, RepoState::Processing, repo);
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.processor.process(repo, output_dir)))
            .unwrap_or_else(|payload| {
                if self.processor.settings().cleanup_on_error {
                    cleanup_output(output_dir);
                }
                Err(ProcessingError::Panicked {
                    repo: repo.name.clone(),
                    message: panic_message(payload.as_ref()),
                })
            });
        let duration = started.elapsed();

        match outcome {
            Ok(_) => {
                enter(&mut state, RepoState::Success, repo);
                ProcessingResult::success(repo.name.clone(), repo.kind, duration, output_dir.to_path_buf())
            }
            Err(e) => {
                enter(&mut state, RepoState::Failed, repo);
                error!("Failed to process {}: {}", repo.name, e);
                ProcessingResult::failed(repo.name.clone(), repo.kind, duration, e.to_string())
            }
        }
    }
}

fn enter(state: &mut RepoState, next: RepoState, repo: &RepositoryDescriptor) {
    if let Err(e) = state.advance(next) {
        error!("{}: {}", repo.name, e);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");
    }
}
