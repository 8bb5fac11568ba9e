use anyhow::{Context, Result};
use fleetstats_core::domain::{CacheKind, Deadline, RepoStatistics, RepositoryDescriptor, RepositoryKind, StatsCache};
use fleetstats_core::ports::VcsPort;
use git2::{ErrorCode, ObjectType, Oid, Repository as GitRepository, RepositoryOpenFlags, Sort, Tree, TreeWalkMode, TreeWalkResult};
use std::ffi::OsStr;
use std::path::Path;
use tracing::debug;

use crate::extensions::{extension_of, ExtensionFilter};

/// VCS adapter that implements VcsPort using libgit2
pub struct GitAdapter {
    filter: ExtensionFilter,
}

impl GitAdapter {
    pub fn new(filter: ExtensionFilter) -> Self {
        Self { filter }
    }

    /// Open exactly `path`, never a repository found by searching parents
    fn open_exact(path: &Path) -> Result<GitRepository, git2::Error> {
        GitRepository::open_ext(path, RepositoryOpenFlags::NO_SEARCH, std::iter::empty::<&OsStr>())
    }
}

impl Default for GitAdapter {
    fn default() -> Self {
        Self::new(ExtensionFilter::default())
    }
}

impl VcsPort for GitAdapter {
    fn is_repository(&self, path: &Path) -> bool {
        Self::open_exact(path).is_ok()
    }

    fn repository_kind(&self, path: &Path) -> Result<Option<RepositoryKind>> {
        match Self::open_exact(path) {
            Ok(repo) if repo.is_bare() => Ok(Some(RepositoryKind::Bare)),
            Ok(repo) if repo.is_worktree() => Ok(Some(RepositoryKind::WorktreeLink)),
            Ok(_) => Ok(Some(RepositoryKind::Normal)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to open git repository at {}", path.display())),
        }
    }

    fn collect(&self, descriptor: &RepositoryDescriptor, cache: &mut StatsCache, deadline: &Deadline) -> Result<RepoStatistics> {
        let git_repo = GitRepository::open(&descriptor.path)
            .with_context(|| format!("Failed to open git repository at {}", descriptor.path.display()))?;

        let mut stats = RepoStatistics::new(descriptor.name.clone());

        let head = match git_repo.head() {
            Ok(head) => head,
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                debug!("{} has no commits", descriptor.name);
                return Ok(stats);
            }
            Err(e) => return Err(e).context("Failed to resolve HEAD"),
        };

        // Commit history, newest first
        let mut revwalk = git_repo.revwalk().context("Failed to start revision walk")?;
        revwalk.push_head()?;
        revwalk.set_sorting(Sort::TIME)?;

        for oid in revwalk {
            deadline.check()?;
            let oid = oid.context("Failed to walk revisions")?;
            let commit = git_repo.find_commit(oid)?;
            let author = commit.author();
            let timestamp = commit.time().seconds();
            stats.record_commit(author.name().unwrap_or("unknown"), timestamp);

            let key = oid.to_string();
            let files = match cache.get(CacheKind::FilesInTree, &key) {
                Some(count) => {
                    stats.cache_hits += 1;
                    count
                }
                None => {
                    stats.cache_misses += 1;
                    let count = count_tree_files(&commit.tree()?)?;
                    cache.put(CacheKind::FilesInTree, key, count);
                    count
                }
            };
            stats.files_over_time.push((timestamp, files));
        }

        // Line counts for the files in HEAD
        let tree = head.peel_to_tree().context("Failed to read HEAD tree")?;
        for (path, blob_id) in tree_blobs(&tree)? {
            deadline.check()?;
            if !self.filter.should_include(&path) {
                continue;
            }

            let key = blob_id.to_string();
            let lines = match cache.get(CacheKind::LinesInBlob, &key) {
                Some(lines) => {
                    stats.cache_hits += 1;
                    lines
                }
                None => {
                    stats.cache_misses += 1;
                    let blob = git_repo.find_blob(blob_id)?;
                    let lines = count_lines(blob.content());
                    cache.put(CacheKind::LinesInBlob, key, lines);
                    lines
                }
            };
            stats.record_file(&extension_of(&path), lines);
        }

        debug!(
            "Collected {} commits for {} ({} cache hits, {} misses)",
            stats.total_commits, descriptor.name, stats.cache_hits, stats.cache_misses
        );
        Ok(stats)
    }
}

fn count_tree_files(tree: &Tree<'_>) -> Result<u64> {
    let mut count = 0u64;
    tree.walk(TreeWalkMode::PreOrder, |_, entry| {
        if entry.kind() == Some(ObjectType::Blob) {
            count += 1;
        }
        TreeWalkResult::Ok
    })?;
    Ok(count)
}

/// (path relative to the root, blob id) for every file in `tree`
fn tree_blobs(tree: &Tree<'_>) -> Result<Vec<(String, Oid)>> {
    let mut blobs = Vec::new();
    tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
        if entry.kind() == Some(ObjectType::Blob) {
            let name = String::from_utf8_lossy(entry.name_bytes());
            blobs.push((format!("{}{}", dir, name), entry.id()));
        }
        TreeWalkResult::Ok
    })?;
    Ok(blobs)
}

/// Binary content counts as zero lines; a trailing partial line counts as one.
fn count_lines(content: &[u8]) -> u64 {
    if content.is_empty() || content.contains(&0) {
        return 0;
    }
    let newlines = content.iter().filter(|b| **b == b'\n').count() as u64;
    if content.ends_with(b"\n") {
        newlines
    } else {
        newlines + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn commit_files(repo: &GitRepository, files: &[(&str, &str)], message: &str) -> Result<Oid> {
        let workdir = repo.workdir().context("bare repository")?.to_path_buf();
        let mut index = repo.index()?;
        for (name, content) in files {
            let path = workdir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, content)?;
            index.add_path(Path::new(name))?;
        }
        index.write()?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let signature = git2::Signature::now("Test User", "test@example.com")?;
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit()?],
            Err(_) => Vec::new(),
        };
        let parent_refs: Vec<_> = parents.iter().collect();
        Ok(repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)?)
    }

    fn descriptor(path: &Path) -> RepositoryDescriptor {
        RepositoryDescriptor::new(path.to_path_buf(), RepositoryKind::Normal)
    }

    #[test]
    fn test_count_lines() {
        assert_eq!(count_lines(b""), 0);
        assert_eq!(count_lines(b"one\ntwo\n"), 2);
        assert_eq!(count_lines(b"one\ntwo"), 2);
        assert_eq!(count_lines(b"\x00\x01\n"), 0);
    }

    #[test]
    fn test_repository_kind() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let normal = temp_dir.path().join("normal");
        let bare = temp_dir.path().join("bare.git");
        GitRepository::init(&normal)?;
        GitRepository::init_bare(&bare)?;

        let adapter = GitAdapter::default();
        assert_eq!(adapter.repository_kind(&normal)?, Some(RepositoryKind::Normal));
        assert_eq!(adapter.repository_kind(&bare)?, Some(RepositoryKind::Bare));
        assert_eq!(adapter.repository_kind(temp_dir.path())?, None);
        assert!(adapter.is_repository(&normal));
        assert!(!adapter.is_repository(&normal.join("src")));
        Ok(())
    }

    #[test]
    fn test_collect_empty_repository() -> Result<()> {
        let temp_dir = TempDir::new()?;
        GitRepository::init(temp_dir.path())?;

        let stats = GitAdapter::default().collect(&descriptor(temp_dir.path()), &mut StatsCache::default(), &Deadline::unbounded())?;
        assert_eq!(stats.total_commits, 0);
        assert!(stats.extensions.is_empty());
        Ok(())
    }

    #[test]
    fn test_collect_uses_and_fills_cache() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let repo = GitRepository::init(temp_dir.path())?;
        commit_files(&repo, &[("src/main.rs", "fn main() {}\n"), ("README.md", "# demo\n")], "first")?;
        commit_files(&repo, &[("src/lib.rs", "pub fn a() {}\npub fn b() {}\n")], "second")?;

        let adapter = GitAdapter::default();
        let mut cache = StatsCache::default();
        let first = adapter.collect(&descriptor(temp_dir.path()), &mut cache, &Deadline::unbounded())?;

        assert_eq!(first.total_commits, 2);
        assert_eq!(first.authors["Test User"], 2);
        assert_eq!(first.extensions[".rs"].files, 2);
        assert_eq!(first.extensions[".rs"].lines, 3);
        assert!(!first.extensions.contains_key(".md"));
        assert_eq!(first.files_over_time.iter().map(|(_, n)| *n).max(), Some(3));
        assert_eq!(first.cache_hits, 0);
        assert_eq!(cache.files_in_tree.len(), 2);
        assert_eq!(cache.lines_in_blob.len(), 2);

        let second = adapter.collect(&descriptor(temp_dir.path()), &mut cache, &Deadline::unbounded())?;
        assert_eq!(second.cache_misses, 0);
        assert_eq!(second.cache_hits, 4);
        assert_eq!(second.extensions, first.extensions);
        Ok(())
    }

    #[test]
    fn test_collect_respects_deadline() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let repo = GitRepository::init(temp_dir.path())?;
        commit_files(&repo, &[("a.rs", "x\n")], "first")?;

        let deadline = Deadline::after(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        let err = GitAdapter::default()
            .collect(&descriptor(temp_dir.path()), &mut StatsCache::default(), &deadline)
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        Ok(())
    }
}
