use anyhow::Result;
use fleetstats_core::domain::{CancellationFlag, RepositoryDescriptor};
use fleetstats_core::error::FatalError;
use fleetstats_core::ports::{RenderPort, VcsPort};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::classify::PathClassifier;
use crate::config::Config;
use crate::extensions::ExtensionFilter;
use crate::git::GitAdapter;
use crate::orchestrator::{BatchOrchestrator, OrchestratorSettings};
use crate::processor::{ProcessorSettings, RepositoryProcessor};
use crate::render::{write_summary_page, HtmlReport};
use crate::scan::{RepoScanner, ScanOptions};
use crate::summary::RunSummary;

/// Wires configuration and ports together for one run
pub struct FleetApp {
    config: Config,
    vcs: Arc<dyn VcsPort>,
    renderer: Arc<dyn RenderPort>,
    cancel: CancellationFlag,
}

impl FleetApp {
    /// Application backed by libgit2 and the HTML renderer
    pub fn new(config: Config, cancel: CancellationFlag) -> Self {
        let vcs = Arc::new(GitAdapter::new(ExtensionFilter::from_config(&config.collection)));
        Self::with_ports(config, vcs, Arc::new(HtmlReport), cancel)
    }

    pub fn with_ports(config: Config, vcs: Arc<dyn VcsPort>, renderer: Arc<dyn RenderPort>, cancel: CancellationFlag) -> Self {
        Self {
            config,
            vcs,
            renderer,
            cancel,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// All repositories below `root`, sorted by name.
    pub fn discover(&self, root: &Path) -> Result<Vec<RepositoryDescriptor>, FatalError> {
        let scanner = RepoScanner::new(PathClassifier::new(self.vcs.clone()), ScanOptions::from_config(&self.config)?);
        scanner.discover(root)
    }

    /// Discover, process every repository and write the summary page.
    ///
    /// Errors are fatal to the run; per-repository problems end up in the summary.
    pub fn run(&self, root: &Path, output: &Path) -> Result<RunSummary> {
        let started = Instant::now();
        let repositories = self.discover(root)?;
        if repositories.is_empty() {
            return Err(FatalError::NoRepositories { root: root.to_path_buf() }.into());
        }
        prepare_output_dir(output)?;

        let processor = RepositoryProcessor::new(
            self.vcs.clone(),
            self.renderer.clone(),
            ProcessorSettings::from_config(&self.config),
        );
        let orchestrator = BatchOrchestrator::new(
            processor,
            OrchestratorSettings::from_config(&self.config),
            self.cancel.clone(),
        );
        let results = orchestrator.run(&repositories, output)?;

        let summary = RunSummary::new(results, repositories.len(), started.elapsed());
        match write_summary_page(&summary, output) {
            Ok(path) => info!("Summary report written to {}", path.display()),
            Err(e) => warn!("Failed to write summary report: {:#}", e),
        }
        Ok(summary)
    }
}

fn prepare_output_dir(output: &Path) -> Result<(), FatalError> {
    let to_fatal = |source| FatalError::OutputDir {
        path: output.to_path_buf(),
        source,
    };
    fs::create_dir_all(output).map_err(to_fatal)?;
    let meta = fs::metadata(output).map_err(to_fatal)?;
    if meta.permissions().readonly() {
        return Err(to_fatal(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "directory is read-only",
        )));
    }
    Ok(())
}
