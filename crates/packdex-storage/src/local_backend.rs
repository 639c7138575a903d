use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use packdex_types::error::{PackdexError, Result};

use crate::StorageBackend;

/// Repository stored as plain files below a root directory. Keys map to
/// relative paths, one directory level per `/`.
pub struct LocalBackend {
    root: PathBuf,
}

/// `Ok(None)` for a missing file, the io error otherwise.
fn missing_as_none<T>(res: io::Result<T>) -> Result<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl LocalBackend {
    pub fn new(root: &str) -> Result<Self> {
        let path = PathBuf::from(root);
        // Symlinked roots break strip_prefix during listing.
        let root = match missing_as_none(fs::canonicalize(&path))? {
            Some(canonical) => canonical,
            None => path,
        };
        debug!("local repository at {}", root.display());
        Ok(Self { root })
    }

    /// Keys are relative, `/`-separated, and may not climb out of the root.
    fn check_key(key: &str) -> Result<()> {
        let bad = |why: &str| {
            Err(PackdexError::InvalidFormat(format!(
                "bad storage key '{key}': {why}"
            )))
        };
        if key.is_empty() {
            return bad("empty");
        }
        if key.contains('\\') {
            return bad("backslash");
        }
        if key.starts_with('/') {
            return bad("absolute");
        }
        if key.split('/').any(|segment| segment == "..") {
            return bad("parent segment");
        }
        Ok(())
    }

    fn path_of(&self, key: &str) -> Result<PathBuf> {
        Self::check_key(key)?;
        Ok(self.root.join(key))
    }

    fn key_of(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let segments: Vec<_> = rel
            .iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        Some(segments.join("/"))
    }

    /// Write next to `path` and rename over it, so an object is either
    /// complete or absent.
    fn write_then_rename(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let dir = path.parent().unwrap_or(&self.root);
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(data)?;
        staged.as_file().sync_all()?;
        staged.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl StorageBackend for LocalBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        missing_as_none(fs::read(self.path_of(key)?))
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_of(key)?;
        match self.write_then_rename(&path, data) {
            // Shard directories are created on first use.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                Ok(self.write_then_rename(&path, data)?)
            }
            res => Ok(res?),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        missing_as_none(fs::remove_file(self.path_of(key)?))?;
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let meta = missing_as_none(fs::metadata(self.path_of(key)?))?;
        Ok(meta.is_some_and(|m| m.is_file()))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let start = match prefix.trim_end_matches('/') {
            "" => self.root.clone(),
            dir => self.path_of(dir)?,
        };
        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let Some(entries) = missing_as_none(fs::read_dir(&dir))? else {
                continue;
            };
            for entry in entries {
                let entry = entry?;
                let kind = entry.file_type()?;
                if kind.is_dir() {
                    pending.push(entry.path());
                } else if kind.is_file() {
                    keys.extend(self.key_of(&entry.path()));
                }
            }
        }
        Ok(keys)
    }

    fn get_range(&self, key: &str, offset: u64, length: u64) -> Result<Option<Vec<u8>>> {
        let Some(mut file) = missing_as_none(File::open(self.path_of(key)?))? else {
            return Ok(None);
        };
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(length as usize);
        file.take(length).read_to_end(&mut buf)?;
        if buf.len() as u64 != length {
            return Err(PackdexError::Storage(format!(
                "{key}: wanted {length} bytes at {offset}, file has only {}",
                buf.len()
            )));
        }
        Ok(Some(buf))
    }

    fn size(&self, key: &str) -> Result<Option<u64>> {
        let meta = missing_as_none(fs::metadata(self.path_of(key)?))?;
        Ok(meta.filter(|m| m.is_file()).map(|m| m.len()))
    }
}
