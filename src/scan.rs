use crossbeam_channel::{Receiver, Sender};
use fleetstats_core::domain::{RepositoryDescriptor, ScanTask};
use fleetstats_core::error::{DiscoveryError, FatalError};
use glob::Pattern;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::classify::PathClassifier;
use crate::config::Config;

/// Limits and filters for one discovery run
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub max_depth: usize,
    pub include: Vec<Pattern>,
    pub exclude: Vec<Pattern>,
    pub workers: usize,
}

impl ScanOptions {
    pub fn from_config(config: &Config) -> Result<Self, FatalError> {
        Ok(Self {
            max_depth: config.discovery.max_depth,
            include: compile_patterns(&config.discovery.include_patterns)?,
            exclude: compile_patterns(&config.discovery.exclude_patterns)?,
            workers: config.discovery_workers(),
        })
    }

    /// Name-based filter applied to every child directory before it is queued.
    pub fn allows(&self, dir_name: &str) -> bool {
        if self.exclude.iter().any(|p| p.matches(dir_name)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| p.matches(dir_name))
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_config(&Config::default()).unwrap_or(Self {
            max_depth: 10,
            include: Vec::new(),
            exclude: Vec::new(),
            workers: 4,
        })
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, FatalError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| FatalError::InvalidConfig {
                reason: format!("bad glob pattern {:?}: {}", p, e),
            })
        })
        .collect()
}

enum WorkItem {
    Scan(ScanTask),
    Shutdown,
}

/// State shared by the discovery workers of one run
struct ScanState {
    root_real: PathBuf,
    tx: Sender<WorkItem>,
    /// Tasks queued or being processed
    pending: AtomicUsize,
    seen: Mutex<HashSet<PathBuf>>,
    found: Mutex<Vec<RepositoryDescriptor>>,
    workers: usize,
}

impl ScanState {
    fn enqueue(&self, task: ScanTask) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(WorkItem::Scan(task)).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Atomic test-and-set on the seen set
    fn mark_seen(&self, real_path: PathBuf) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(real_path)
    }

    fn finish_task(&self) {
        // Last task out: nothing queued, nothing in flight, so nothing can be enqueued again.
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            for _ in 0..self.workers {
                let _ = self.tx.send(WorkItem::Shutdown);
            }
        }
    }
}

/// Decrements the pending count even if task processing unwinds
struct TaskGuard<'a>(&'a ScanState);

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.0.finish_task();
    }
}

/// Finds repositories below a root with a bounded pool of worker threads
pub struct RepoScanner {
    classifier: PathClassifier,
    options: ScanOptions,
}

impl RepoScanner {
    pub fn new(classifier: PathClassifier, options: ScanOptions) -> Self {
        Self { classifier, options }
    }

    /// Walk `root` and return every repository found, sorted by name.
    ///
    /// Unreadable directories are logged and skipped; only an unusable root is an error.
    pub fn discover(&self, root: &Path) -> Result<Vec<RepositoryDescriptor>, FatalError> {
        if !root.exists() {
            return Err(FatalError::RootNotFound { path: root.to_path_buf() });
        }
        if !root.is_dir() {
            return Err(FatalError::RootNotDirectory { path: root.to_path_buf() });
        }
        let root_real = fs::canonicalize(root).map_err(|_| FatalError::RootNotFound { path: root.to_path_buf() })?;

        let workers = self.options.workers.max(1);
        info!(
            "Scanning for repositories in {} (max depth {}, {} workers)",
            root.display(),
            self.options.max_depth,
            workers
        );

        let (tx, rx) = crossbeam_channel::unbounded();
        let state = ScanState {
            root_real: root_real.clone(),
            tx,
            pending: AtomicUsize::new(0),
            seen: Mutex::new(HashSet::new()),
            found: Mutex::new(Vec::new()),
            workers,
        };
        state.mark_seen(root_real.clone());
        state.enqueue(ScanTask::root(root_real));

        let state_ref = &state;
        thread::scope(|s| {
            for _ in 0..workers {
                let rx = rx.clone();
                s.spawn(move || self.run_worker(state_ref, rx));
            }
        });

        let mut repositories = state.found.into_inner().unwrap_or_else(PoisonError::into_inner);
        sort_for_display(&mut repositories);
        info!("Repository discovery complete. Found {} repositories.", repositories.len());
        Ok(repositories)
    }

    fn run_worker(&self, state: &ScanState, rx: Receiver<WorkItem>) {
        for item in rx.iter() {
            match item {
                WorkItem::Scan(task) => {
                    let _guard = TaskGuard(state);
                    self.process_task(state, task);
                }
                WorkItem::Shutdown => break,
            }
        }
    }

    fn process_task(&self, state: &ScanState, task: ScanTask) {
        if task.depth > self.options.max_depth {
            debug!("Depth limit reached at {}", task.path.display());
            return;
        }

        if let Some(kind) = self.classifier.classify(&task.path) {
            let real = fs::canonicalize(&task.path).unwrap_or_else(|_| task.path.clone());
            let repo = RepositoryDescriptor::new(real, kind);
            debug!("Found {} repository: {}", kind, repo.path.display());
            state.found.lock().unwrap_or_else(PoisonError::into_inner).push(repo);
            // Repositories are leaves: no nested checkouts, no metadata internals.
            return;
        }

        for child in child_directories(&task.path) {
            let Some(name) = child.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            if !self.options.allows(&name) {
                debug!("Excluding directory: {}", child.display());
                continue;
            }

            let real = match fs::canonicalize(&child) {
                Ok(real) => real,
                Err(source) => {
                    debug!("{}", DiscoveryError::Canonicalize { path: child, source });
                    continue;
                }
            };
            if !real.starts_with(&state.root_real) {
                debug!("Skipping link pointing outside scan root: {}", child.display());
                continue;
            }
            if !state.mark_seen(real) {
                debug!("Skipping already visited directory: {}", child.display());
                continue;
            }

            state.enqueue(task.child(child));
        }
    }
}

/// Immediate subdirectories of `dir`, including symlinks that resolve to directories.
/// Listing errors are logged and leave the result empty or partial.
fn child_directories(dir: &Path) -> Vec<PathBuf> {
    let mut children = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
        match entry {
            Ok(entry) => {
                let file_type = entry.file_type();
                let is_dir = file_type.is_dir() || (file_type.is_symlink() && entry.path().is_dir());
                if is_dir {
                    children.push(entry.into_path());
                }
            }
            Err(e) => {
                let path = e.path().unwrap_or(dir).to_path_buf();
                warn!("{}", DiscoveryError::ReadDir { path, source: e.into() });
            }
        }
    }

    children
}

/// Name order for display, path as a tie-breaker
pub fn sort_for_display(repositories: &mut [RepositoryDescriptor]) {
    repositories.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
}
