use crate::domain::{Deadline, RepoStatistics, RepositoryDescriptor, RepositoryKind, StatsCache};
use anyhow::Result;
use std::path::Path;

/// Port for version-control queries
pub trait VcsPort: Send + Sync {
    /// Whether `path` itself (not a parent) is a repository
    fn is_repository(&self, path: &Path) -> bool;

    /// Layout of the repository at `path`, `None` when it is not one.
    /// Must be read-only and return quickly.
    fn repository_kind(&self, path: &Path) -> Result<Option<RepositoryKind>>;

    /// Gather statistics for one repository.
    /// Known blob/revision facts are read from `cache` and new ones written to it.
    /// Implementations check `deadline` regularly and fail once it expires.
    fn collect(
        &self,
        repo: &RepositoryDescriptor,
        cache: &mut StatsCache,
        deadline: &Deadline,
    ) -> Result<RepoStatistics>;
}
