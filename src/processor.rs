use fleetstats_core::domain::{Deadline, EvictionPolicy, RepoStatistics, RepositoryDescriptor};
use fleetstats_core::error::{ProcessingError, ValidationError};
use fleetstats_core::ports::{RenderPort, VcsPort};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::CacheFile;
use crate::config::Config;

const REPORT_SUFFIX: &str = "_report";
const UNNAMED: &str = "unnamed_repo";

/// Per-run knobs for the repository pipeline
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub cleanup_on_error: bool,
    pub eviction: EvictionPolicy,
    pub timeout: Option<Duration>,
    pub cache_file_name: String,
}

impl ProcessorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cleanup_on_error: config.processing.cleanup_on_error,
            eviction: config.eviction_policy(),
            timeout: config.repository_timeout(),
            cache_file_name: config.cache.file_name.clone(),
        }
    }
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Runs the validate, collect, cache and render pipeline for one repository
#[derive(Clone)]
pub struct RepositoryProcessor {
    vcs: Arc<dyn VcsPort>,
    renderer: Arc<dyn RenderPort>,
    settings: ProcessorSettings,
}

impl RepositoryProcessor {
    pub fn new(vcs: Arc<dyn VcsPort>, renderer: Arc<dyn RenderPort>, settings: ProcessorSettings) -> Self {
        Self { vcs, renderer, settings }
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Check that the repository is still there and still a repository.
    pub fn validate(&self, repo: &RepositoryDescriptor) -> Result<(), ValidationError> {
        let path = &repo.path;
        let meta = fs::metadata(path).map_err(|_| ValidationError::Missing { path: path.clone() })?;
        if !meta.is_dir() {
            return Err(ValidationError::NotADirectory { path: path.clone() });
        }
        fs::read_dir(path).map_err(|source| ValidationError::Unreadable {
            path: path.clone(),
            source,
        })?;
        if !self.vcs.is_repository(path) {
            return Err(ValidationError::NotARepository { path: path.clone() });
        }
        Ok(())
    }

    /// Produce the report for `repo` in `output_dir`. On error the partial
    /// output directory is removed when cleanup is enabled.
    pub fn process(&self, repo: &RepositoryDescriptor, output_dir: &Path) -> Result<RepoStatistics, ProcessingError> {
        fs::create_dir_all(output_dir).map_err(|source| ProcessingError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let result = self.run_pipeline(repo, output_dir);
        if result.is_err() && self.settings.cleanup_on_error {
            cleanup_output(output_dir);
        }
        result
    }

    fn run_pipeline(&self, repo: &RepositoryDescriptor, output_dir: &Path) -> Result<RepoStatistics, ProcessingError> {
        let cache_file = CacheFile::new(output_dir.join(&self.settings.cache_file_name), self.settings.eviction);
        let mut cache = cache_file.load();

        let deadline = Deadline::from_limit(self.settings.timeout);
        let stats = self
            .vcs
            .collect(repo, &mut cache, &deadline)
            .map_err(|source| ProcessingError::Collect {
                repo: repo.name.clone(),
                source,
            })?;

        if let Err(e) = cache_file.save(&mut cache) {
            warn!("Failed to save cache for {}: {:#}", repo.name, e);
        }

        self.renderer
            .render(&stats, output_dir)
            .map_err(|source| ProcessingError::Render {
                repo: repo.name.clone(),
                source,
            })?;

        debug!("Report for {} written to {}", repo.name, output_dir.display());
        Ok(stats)
    }
}

pub(crate) fn cleanup_output(output_dir: &Path) {
    match fs::remove_dir_all(output_dir) {
        Ok(()) => debug!("Removed partial output {}", output_dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to clean up {}: {}", output_dir.display(), e),
    }
}

/// Make a repository name safe to use as a directory name.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        UNNAMED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// One distinct `<name>_report` directory per repository, in input order.
/// Colliding names get `-2`, `-3`, ... suffixes.
pub fn assign_output_dirs(base: &Path, repositories: &[RepositoryDescriptor]) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    repositories
        .iter()
        .map(|repo| {
            let stem = sanitize_filename(&repo.name);
            let mut candidate = format!("{}{}", stem, REPORT_SUFFIX);
            let mut n = 2;
            while !taken.insert(candidate.clone()) {
                candidate = format!("{}-{}{}", stem, n, REPORT_SUFFIX);
                n += 1;
            }
            base.join(candidate)
        })
        .collect()
}
