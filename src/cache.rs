//! On-disk persistence for the incremental statistics cache.
//!
//! A cache file is zlib-compressed JSON. Files written before compression was
//! introduced are plain JSON and are still read. Saving goes through a
//! temporary sibling file that is renamed over the target, so a reader sees
//! either the old or the new snapshot and never a torn one.

use anyhow::{Context, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use fleetstats_core::domain::{EvictionPolicy, StatsCache};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The cache file belonging to one repository's report directory
#[derive(Debug, Clone)]
pub struct CacheFile {
    path: PathBuf,
    policy: EvictionPolicy,
}

impl CacheFile {
    pub fn new(path: impl Into<PathBuf>, policy: EvictionPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the cache. Missing or unreadable caches yield an empty one.
    pub fn load(&self) -> StatsCache {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache file at {}", self.path.display());
                return StatsCache::default();
            }
            Err(e) => {
                warn!("Could not open cache file {}: {}", self.path.display(), e);
                return StatsCache::default();
            }
        };

        match decode(&bytes) {
            Ok(cache) => {
                debug!("Loaded {} cache entries from {}", cache.len(), self.path.display());
                cache
            }
            Err(e) => {
                warn!("Failed to load cache file {}: {:#}", self.path.display(), e);
                StatsCache::default()
            }
        }
    }

    /// Prune `cache` per the eviction policy, then atomically replace the file.
    pub fn save(&self, cache: &mut StatsCache) -> Result<()> {
        let evicted = cache.prune(&self.policy);
        if evicted > 0 {
            debug!("Evicted {} old cache entries for {}", evicted, self.path.display());
        }

        let data = encode(cache)?;
        let temp_path = self.temp_path();
        write_synced(&temp_path, &data)
            .with_context(|| format!("Failed to write temporary cache file {}", temp_path.display()))?;

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!("Failed to move {} over {}", temp_path.display(), self.path.display())
        })?;
        Ok(())
    }
}

fn decode(bytes: &[u8]) -> Result<StatsCache> {
    let mut json = Vec::new();
    match ZlibDecoder::new(bytes).read_to_end(&mut json) {
        Ok(_) => match serde_json::from_slice(&json) {
            Ok(cache) => return Ok(cache),
            Err(e) => debug!("Compressed cache did not parse ({}), trying legacy format", e),
        },
        Err(e) => debug!("Cache is not zlib data ({}), trying legacy format", e),
    }

    serde_json::from_slice(bytes).context("Cache is neither compressed nor plain JSON")
}

/// Compressed bytes of `cache`, exactly as `save` writes them
pub fn encode(cache: &StatsCache) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(cache).context("Failed to serialize cache")?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    encoder.finish().context("Failed to compress cache")
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetstats_core::domain::CacheKind;
    use tempfile::TempDir;

    fn cache_with(entries: &[(&str, u64)]) -> StatsCache {
        let mut cache = StatsCache::default();
        for (key, value) in entries {
            cache.put(CacheKind::LinesInBlob, *key, *value);
        }
        cache
    }

    #[test]
    fn test_missing_file_loads_empty() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let file = CacheFile::new(temp_dir.path().join("none.cache"), EvictionPolicy::default());
        assert!(file.load().is_empty());
        Ok(())
    }

    #[test]
    fn test_save_then_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let file = CacheFile::new(temp_dir.path().join("stats.cache"), EvictionPolicy::default());

        let mut cache = cache_with(&[("blob1", 12), ("blob2", 40)]);
        cache.put(CacheKind::FilesInTree, "rev1", 3);
        file.save(&mut cache)?;

        let loaded = file.load();
        assert_eq!(loaded, cache);
        assert!(!file.temp_path().exists());
        Ok(())
    }

    #[test]
    fn test_saved_file_is_compressed() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let file = CacheFile::new(temp_dir.path().join("stats.cache"), EvictionPolicy::default());
        file.save(&mut cache_with(&[("blob1", 12)]))?;

        let raw = fs::read(file.path())?;
        assert!(serde_json::from_slice::<StatsCache>(&raw).is_err());
        Ok(())
    }

    #[test]
    fn test_legacy_plain_json_is_migrated() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("stats.cache");
        fs::write(&path, r#"{"lines_in_blob": {"b1": 5}, "files_in_tree": [["r1", 2]]}"#)?;

        let file = CacheFile::new(&path, EvictionPolicy::default());
        let mut cache = file.load();
        assert_eq!(cache.get(CacheKind::LinesInBlob, "b1"), Some(5));
        assert_eq!(cache.get(CacheKind::FilesInTree, "r1"), Some(2));

        // Re-saving upgrades it to the compressed format
        file.save(&mut cache)?;
        let raw = fs::read(&path)?;
        assert!(serde_json::from_slice::<StatsCache>(&raw).is_err());
        assert_eq!(file.load(), cache);
        Ok(())
    }

    #[test]
    fn test_corrupt_file_loads_empty() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("stats.cache");
        fs::write(&path, b"\x00\x01garbage")?;
        assert!(CacheFile::new(&path, EvictionPolicy::default()).load().is_empty());
        Ok(())
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let file = CacheFile::new("/out/repo_report/fleetstats.cache", EvictionPolicy::default());
        assert_eq!(file.temp_path(), PathBuf::from("/out/repo_report/fleetstats.cache.tmp"));
    }
}
