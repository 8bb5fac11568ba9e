use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Layout of a discovered repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryKind {
    /// Working tree with a `.git` directory
    Normal,
    /// Metadata store without a working tree
    Bare,
    /// Working tree whose `.git` is a file pointing at metadata elsewhere
    WorktreeLink,
    /// Recognised by the VCS but not matching any known layout
    Unknown,
}

impl RepositoryKind {
    pub fn label(&self) -> &'static str {
        match self {
            RepositoryKind::Normal => "regular",
            RepositoryKind::Bare => "bare",
            RepositoryKind::WorktreeLink => "worktree",
            RepositoryKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A repository found during discovery.
///
/// Identity is the canonical path: two descriptors are equal exactly when
/// they point at the same real directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub kind: RepositoryKind,
}

impl RepositoryDescriptor {
    /// Build a descriptor from an already canonicalized path.
    pub fn new(path: PathBuf, kind: RepositoryKind) -> Self {
        let name = name_from_path(&path);
        Self { name, path, kind }
    }
}

impl std::fmt::Display for RepositoryDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.kind, self.path.display())
    }
}

/// A directory waiting to be classified or expanded during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTask {
    pub path: PathBuf,
    pub depth: usize,
}

impl ScanTask {
    pub fn root(path: PathBuf) -> Self {
        Self { path, depth: 0 }
    }

    pub fn child(&self, path: PathBuf) -> Self {
        Self {
            path,
            depth: self.depth + 1,
        }
    }
}

fn name_from_path(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_name_from_path() {
        let repo = RepositoryDescriptor::new(PathBuf::from("/base/work/acme-api"), RepositoryKind::Normal);
        assert_eq!(repo.name, "acme-api");
        assert_eq!(repo.kind, RepositoryKind::Normal);
    }

    #[test]
    fn test_descriptor_name_for_root_path() {
        let repo = RepositoryDescriptor::new(PathBuf::from("/"), RepositoryKind::Bare);
        assert_eq!(repo.name, "/");
    }

    #[test]
    fn test_descriptor_display() {
        let repo = RepositoryDescriptor::new(PathBuf::from("/path/to/repo"), RepositoryKind::WorktreeLink);
        let display_str = format!("{}", repo);
        assert!(display_str.contains("repo"));
        assert!(display_str.contains("worktree"));
        assert!(display_str.contains("/path/to/repo"));
    }

    #[test]
    fn test_scan_task_child_depth() {
        let root = ScanTask::root(PathBuf::from("/base"));
        let child = root.child(PathBuf::from("/base/work"));
        let grandchild = child.child(PathBuf::from("/base/work/api"));
        assert_eq!(root.depth, 0);
        assert_eq!(child.depth, 1);
        assert_eq!(grandchild.depth, 2);
    }
}
