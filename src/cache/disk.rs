use crate::cache::{CacheKey, CacheStore};
use crate::types::{ArtiscopeError, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use tracing::debug;

/// Cache stored as one text file per entry:
/// `<root>/<encoded registry>/<category>/<encoded key>`.
///
/// The file's modification time is the TTL clock. Entries are a few bytes,
/// so the filesystem calls run inline on the calling task.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
    ttl: Duration,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            root: root.into(),
            ttl,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `key`. Both registry and key are percent-encoded.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.registry_dir(&key.registry)
            .join(key.category.dir_name())
            .join(encode_segment(&key.key))
    }

    pub fn registry_dir(&self, registry: &str) -> PathBuf {
        self.root.join(encode_segment(registry))
    }

    /// Remove every entry, or every entry of one registry.
    pub fn clear(&self, registry: Option<&str>) -> Result<()> {
        let dir = match registry {
            Some(registry) => self.registry_dir(registry),
            None => self.root.clone(),
        };
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                debug!("Removed cache directory {:?}", dir);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ArtiscopeError::CacheIo { path: dir, source }),
        }
    }

    fn is_stale(&self, modified: SystemTime) -> bool {
        // A timestamp in the future counts as fresh.
        SystemTime::now()
            .duration_since(modified)
            .map(|age| age >= self.ttl)
            .unwrap_or(false)
    }
}

impl CacheStore for DiskCache {
    fn get(&self, key: &CacheKey) -> Result<Option<String>> {
        let path = self.entry_path(key);

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ArtiscopeError::CacheIo { path, source }),
        };

        let modified = metadata
            .modified()
            .map_err(|source| ArtiscopeError::CacheIo {
                path: path.clone(),
                source,
            })?;
        if self.is_stale(modified) {
            debug!("Cache entry expired: {}", key);
            return Ok(None);
        }

        fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| ArtiscopeError::CacheIo { path, source })
    }

    fn put(&self, key: &CacheKey, value: &str) -> Result<()> {
        let path = self.entry_path(key);
        let Some(dir) = path.parent() else {
            return Err(ArtiscopeError::CacheError(format!(
                "no parent directory for {:?}",
                path
            )));
        };

        // create_dir_all treats an existing directory as success, so racing
        // workers creating the same parent are fine.
        fs::create_dir_all(dir).map_err(|source| ArtiscopeError::CacheIo {
            path: dir.to_path_buf(),
            source,
        })?;

        // Write to a sibling temp file and rename so readers never observe a
        // half-written entry.
        let mut tmp = NamedTempFile::new_in(dir).map_err(|source| ArtiscopeError::CacheIo {
            path: dir.to_path_buf(),
            source,
        })?;
        tmp.write_all(value.as_bytes())
            .and_then(|_| tmp.flush())
            .map_err(|source| ArtiscopeError::CacheIo {
                path: tmp.path().to_path_buf(),
                source,
            })?;
        tmp.persist(&path).map_err(|e| ArtiscopeError::CacheIo {
            path: path.clone(),
            source: e.error,
        })?;

        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<bool> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ArtiscopeError::CacheIo { path, source }),
        }
    }
}

/// Percent-encode one path segment. `.` and `..` are escaped too, since the
/// encoder leaves dots alone.
fn encode_segment(raw: &str) -> String {
    match raw {
        "" => "%00".to_string(),
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => urlencoding::encode(raw).into_owned(),
    }
}
