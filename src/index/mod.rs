use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Torrent ID to the folder's last known path, relative to the library root.
pub type PathIndex = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to read index {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("index {0} is not a JSON object of strings: {1}")]
    Malformed(PathBuf, #[source] serde_json::Error),
    #[error("failed to write index {0}: {1}")]
    Write(PathBuf, #[source] std::io::Error),
    #[error("failed to serialize index: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Owns the persisted [`PathIndex`]. Every mutation is a full load, mutate, save cycle.
#[derive(Debug)]
pub struct PathIndexStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PathIndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the persisted index, or an empty one if nothing has been saved yet.
    pub fn load(&self) -> Result<PathIndex, IndexError> {
        let _guard = self.lock();
        self.load_unlocked()
    }

    /// Replaces the persisted index with `index`.
    pub fn save(&self, index: &PathIndex) -> Result<(), IndexError> {
        let _guard = self.lock();
        self.save_unlocked(index)
    }

    /// Loads the index, hands it to `f`, then saves it back. The store stays locked for the
    /// whole cycle, so concurrent callers cannot lose each other's updates. The index is saved
    /// even if `f` left it unchanged.
    pub fn update<R>(&self, f: impl FnOnce(&mut PathIndex) -> R) -> Result<R, IndexError> {
        let _guard = self.lock();
        let mut index = self.load_unlocked()?;
        let result = f(&mut index);
        self.save_unlocked(&index)?;
        Ok(result)
    }

    /// Like [`Self::update`] but never writes; used for dry runs.
    pub fn inspect<R>(&self, f: impl FnOnce(&mut PathIndex) -> R) -> Result<R, IndexError> {
        let _guard = self.lock();
        let mut index = self.load_unlocked()?;
        Ok(f(&mut index))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded data is (), so a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load_unlocked(&self) -> Result<PathIndex, IndexError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no index yet; starting empty");
                return Ok(PathIndex::new());
            }
            Err(e) => return Err(IndexError::Read(self.path.clone(), e)),
        };
        serde_json::from_str(&contents).map_err(|e| IndexError::Malformed(self.path.clone(), e))
    }

    fn save_unlocked(&self, index: &PathIndex) -> Result<(), IndexError> {
        let json = serde_json::to_string_pretty(index)?;

        // The temporary file must live on the same filesystem for the final rename to be atomic.
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let write_err = |e| IndexError::Write(self.path.clone(), e);
        std::fs::create_dir_all(dir).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        tracing::debug!(path = %self.path.display(), entries = index.len(), "saved index");
        Ok(())
    }
}
