use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File and line totals for one extension in the HEAD tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionStats {
    pub files: u64,
    pub lines: u64,
}

/// Statistics gathered for a single repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoStatistics {
    pub name: String,
    pub total_commits: usize,
    /// Commits per author name
    pub authors: BTreeMap<String, usize>,
    /// Unix timestamp of the oldest commit
    pub first_commit: Option<i64>,
    /// Unix timestamp of the newest commit
    pub last_commit: Option<i64>,
    /// (commit timestamp, files in that commit's tree), newest first
    pub files_over_time: Vec<(i64, u64)>,
    /// Keyed by lower-case extension including the dot, "" when there is none
    pub extensions: BTreeMap<String, ExtensionStats>,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

impl RepoStatistics {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn record_commit(&mut self, author: &str, timestamp: i64) {
        self.total_commits += 1;
        *self.authors.entry(author.to_string()).or_insert(0) += 1;
        self.first_commit = Some(self.first_commit.map_or(timestamp, |t| t.min(timestamp)));
        self.last_commit = Some(self.last_commit.map_or(timestamp, |t| t.max(timestamp)));
    }

    pub fn record_file(&mut self, extension: &str, lines: u64) {
        let entry = self.extensions.entry(extension.to_string()).or_default();
        entry.files += 1;
        entry.lines += lines;
    }

    pub fn total_files(&self) -> u64 {
        self.extensions.values().map(|e| e.files).sum()
    }

    pub fn total_lines(&self) -> u64 {
        self.extensions.values().map(|e| e.lines).sum()
    }

    /// Authors ordered by commit count, most active first
    pub fn top_authors(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut authors: Vec<_> = self.authors.iter().map(|(a, c)| (a.as_str(), *c)).collect();
        authors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        authors.truncate(limit);
        authors
    }
}
