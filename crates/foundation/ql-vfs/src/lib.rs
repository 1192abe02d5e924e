//! Source unit storage
//!
//! Tracks the compilation units handed to the driver: on-disk files and
//! in-memory buffers, keyed by [`FileId`]. Shared read-mostly across unit
//! workers; contents are cached after the first load.

use anyhow::Result;
use rustc_hash::FxHashMap;
use ql_span::FileId;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Source unit store, cheap to clone and share across workers
pub struct SourceMap {
    inner: Arc<RwLock<SourceMapInner>>,
}

struct SourceMapInner {
    units: FxHashMap<FileId, UnitData>,
    paths: FxHashMap<PathBuf, FileId>,
    next_id: u32,
}

/// Data associated with one unit
#[derive(Clone, Debug)]
pub struct UnitData {
    /// Display name: the path for on-disk units, a synthetic name otherwise
    pub name: String,
    /// Path for on-disk units
    pub path: Option<PathBuf>,
    /// Contents (cached after first load for on-disk units)
    pub contents: Option<String>,
}

impl SourceMap {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SourceMapInner {
                units: FxHashMap::default(),
                paths: FxHashMap::default(),
                next_id: 0,
            })),
        }
    }

    /// Registers an on-disk unit, returning its ID; re-registering a path
    /// returns the existing ID
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned
    pub fn register_path(&self, path: impl AsRef<Path>) -> Result<FileId> {
        let path = path.as_ref().to_path_buf();
        let mut inner = self.write()?;

        if let Some(&existing) = inner.paths.get(&path) {
            return Ok(existing);
        }

        let id = FileId::new(inner.next_id);
        inner.next_id += 1;
        inner.units.insert(
            id,
            UnitData {
                name: path.display().to_string(),
                path: Some(path.clone()),
                contents: None,
            },
        );
        inner.paths.insert(path, id);
        Ok(id)
    }

    /// Registers an in-memory unit with the given display name and contents
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned
    pub fn add_memory_unit(&self, name: impl Into<String>, contents: String) -> Result<FileId> {
        let mut inner = self.write()?;
        let id = FileId::new(inner.next_id);
        inner.next_id += 1;
        inner.units.insert(
            id,
            UnitData {
                name: name.into(),
                path: None,
                contents: Some(contents),
            },
        );
        Ok(id)
    }

    /// Returns the unit's contents, reading from disk on first access
    ///
    /// # Errors
    ///
    /// Returns an error if the unit is unknown, the file cannot be read, or
    /// the lock is poisoned
    pub fn contents(&self, id: FileId) -> Result<String> {
        let path = {
            let inner = self.read()?;
            let unit = inner
                .units
                .get(&id)
                .ok_or_else(|| anyhow::anyhow!("unknown unit: {id:?}"))?;
            if let Some(contents) = &unit.contents {
                return Ok(contents.clone());
            }
            unit.path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("in-memory unit {id:?} has no contents"))?
        };

        let contents = std::fs::read_to_string(&path)?;
        let mut inner = self.write()?;
        if let Some(unit) = inner.units.get_mut(&id) {
            unit.contents = Some(contents.clone());
        }
        Ok(contents)
    }

    /// Display name for diagnostics
    ///
    /// # Errors
    ///
    /// Returns an error if the unit is unknown or the lock is poisoned
    pub fn name(&self, id: FileId) -> Result<String> {
        let inner = self.read()?;
        Ok(inner
            .units
            .get(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown unit: {id:?}"))?
            .name
            .clone())
    }

    /// IDs of every registered unit, in registration order
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned
    pub fn unit_ids(&self) -> Result<Vec<FileId>> {
        let inner = self.read()?;
        let mut ids: Vec<FileId> = inner.units.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, SourceMapInner>> {
        self.inner
            .read()
            .map_err(|_| anyhow::anyhow!("source map lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, SourceMapInner>> {
        self.inner
            .write()
            .map_err(|_| anyhow::anyhow!("source map lock poisoned"))
    }
}

impl Default for SourceMap {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SourceMap {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_path_registration() {
        let sources = SourceMap::new();
        let first = sources.register_path("unit.ql").unwrap();
        let second = sources.register_path("unit.ql").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_memory_units_get_distinct_ids() {
        let sources = SourceMap::new();
        let first = sources
            .add_memory_unit("<a>", "1 + 1".to_string())
            .unwrap();
        let second = sources
            .add_memory_unit("<b>", "2 + 2".to_string())
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(sources.contents(first).unwrap(), "1 + 1");
        assert_eq!(sources.name(second).unwrap(), "<b>");
        assert_eq!(sources.unit_ids().unwrap(), vec![first, second]);
    }
}
