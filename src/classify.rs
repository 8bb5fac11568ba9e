use fleetstats_core::domain::RepositoryKind;
use fleetstats_core::ports::VcsPort;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Decides whether a directory is a repository and which layout it uses.
///
/// Never fails: anything unreadable or broken is simply not a repository.
#[derive(Clone)]
pub struct PathClassifier {
    vcs: Arc<dyn VcsPort>,
}

impl PathClassifier {
    pub fn new(vcs: Arc<dyn VcsPort>) -> Self {
        Self { vcs }
    }

    /// `None` means the path is not a repository.
    pub fn classify(&self, path: &Path) -> Option<RepositoryKind> {
        let dot_git = path.join(".git");
        if let Ok(meta) = dot_git.metadata() {
            if meta.is_dir() {
                return Some(RepositoryKind::Normal);
            }
            if meta.is_file() {
                return Some(RepositoryKind::WorktreeLink);
            }
        }

        if !has_bare_layout(path) {
            return None;
        }

        match self.vcs.repository_kind(path) {
            Ok(Some(RepositoryKind::Bare)) => Some(RepositoryKind::Bare),
            Ok(Some(other)) => {
                debug!("{} has a bare layout but the VCS reports {}", path.display(), other);
                Some(RepositoryKind::Unknown)
            }
            Ok(None) => None,
            Err(e) => {
                debug!("Could not confirm bare repository at {}: {:#}", path.display(), e);
                None
            }
        }
    }

    pub fn is_repository(&self, path: &Path) -> bool {
        self.classify(path).is_some()
    }
}

fn has_bare_layout(path: &Path) -> bool {
    path.join("objects").is_dir() && path.join("refs").is_dir() && path.join("HEAD").is_file()
}
