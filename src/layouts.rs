//! Layout Store - Named, Reusable Arrangements
//!
//! A layout is an ordered list of rectangles with a name. Loading one gives
//! the session empty slots to drop photos into; it never binds files.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::geometry::Position;
use crate::hashing::layout_storage_key;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLayout {
    pub name: String,
    pub positions: Vec<Position>,
}

impl TemplateLayout {
    pub fn new(name: impl Into<String>, positions: Vec<Position>) -> Self {
        Self {
            name: name.into(),
            positions,
        }
    }
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Layout name must not be empty")]
    EmptyName,

    #[error("Layout '{0}' not found")]
    NotFound(String),

    #[error("Layout store I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Layout serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> LayoutError + '_ {
    move |source| LayoutError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// One JSON document per layout in a single directory
#[derive(Debug, Clone)]
pub struct LayoutStore {
    dir: PathBuf,
}

impl LayoutStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, LayoutError> {
        if name.is_empty() {
            return Err(LayoutError::EmptyName);
        }
        Ok(self.dir.join(format!("{}.json", layout_storage_key(name))))
    }

    /// Write atomically; a layout with the same name is replaced.
    pub fn save(&self, layout: &TemplateLayout) -> Result<PathBuf, LayoutError> {
        let path = self.path_for(&layout.name)?;
        fs::create_dir_all(&self.dir).map_err(io_at(&self.dir))?;

        let body = serde_json::to_string_pretty(layout)?;
        let mut staged = NamedTempFile::new_in(&self.dir).map_err(io_at(&self.dir))?;
        staged.write_all(body.as_bytes()).map_err(io_at(staged.path()))?;
        staged
            .persist(&path)
            .map_err(|e| LayoutError::Io {
                path: path.clone(),
                source: e.error,
            })?;

        log::info!("Saved layout '{}' to {}", layout.name, path.display());
        Ok(path)
    }

    pub fn get(&self, name: &str) -> Result<TemplateLayout, LayoutError> {
        let path = self.path_for(name)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LayoutError::NotFound(name.to_string()))
            }
            Err(e) => return Err(io_at(&path)(e)),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Every readable layout, sorted by name.
    pub fn load_all(&self) -> Result<Vec<TemplateLayout>, LayoutError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(io_at(&self.dir)(e)),
        };

        let mut layouts = vec![];
        for entry in entries {
            let path = entry.map_err(io_at(&self.dir))?.path();
            if path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|c| serde_json::from_str::<TemplateLayout>(&c).map_err(|e| e.to_string()));
            match parsed {
                Ok(layout) => layouts.push(layout),
                Err(e) => log::warn!("Skipping layout file {}: {e}", path.display()),
            }
        }
        layouts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(layouts)
    }

    /// Returns whether a file was removed; a missing layout is not an error.
    pub fn delete(&self, name: &str) -> Result<bool, LayoutError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Deleted layout '{name}'");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_at(&path)(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> TemplateLayout {
        TemplateLayout::new(
            name,
            vec![
                Position::new(10.0, 10.0, 200.0, 150.0),
                Position::new(220.0, 10.0, 200.0, 150.0),
            ],
        )
    }

    #[test]
    fn test_save_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::new(dir.path());
        store.save(&sample("two up")).unwrap();
        assert_eq!(store.get("two up").unwrap(), sample("two up"));
    }

    #[test]
    fn test_long_name_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::new(dir.path());
        let name = "Wedding ".repeat(40);
        let path = store.save(&sample(&name)).unwrap();
        assert!(path.file_name().unwrap().len() < 255);
        assert_eq!(store.get(&name).unwrap(), sample(&name));
    }

    #[test]
    fn test_save_overwrites_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::new(dir.path());
        store.save(&sample("grid")).unwrap();
        let mut changed = sample("grid");
        changed.positions.pop();
        store.save(&changed).unwrap();
        let all = store.load_all().unwrap();
        assert_eq!(all, vec![changed]);
    }

    #[test]
    fn test_load_all_skips_garbage_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::new(dir.path());
        store.save(&sample("zeta")).unwrap();
        store.save(&sample("alpha")).unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("readme.txt"), "ignored").unwrap();
        let names: Vec<_> = store.load_all().unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }

    #[test]
    fn test_missing_dir_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::new(dir.path().join("absent"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::new(dir.path());
        assert!(!store.delete("nothing").unwrap());
        store.save(&sample("x")).unwrap();
        assert!(store.delete("x").unwrap());
        assert!(matches!(store.get("x"), Err(LayoutError::NotFound(_))));
    }

    #[test]
    fn test_empty_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::new(dir.path());
        assert!(matches!(store.save(&sample("")), Err(LayoutError::EmptyName)));
    }
}
