//! Image library - the photos available for dropping onto the canvas

use std::fs;
use std::path::{Path, PathBuf};

pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Case-insensitive extension check.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Default)]
pub struct ImageLibrary {
    images: Vec<PathBuf>,
}

impl ImageLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every image file directly inside `dir`, sorted by path.
    pub fn scan_dir(dir: &Path) -> std::io::Result<Self> {
        let mut images = vec![];
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_image_file(&path) {
                images.push(path);
            }
        }
        images.sort();
        Ok(Self { images })
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Returns `false` for duplicates and non-images.
    pub fn insert(&mut self, path: PathBuf) -> bool {
        if !is_image_file(&path) || self.images.contains(&path) {
            return false;
        }
        self.images.push(path);
        true
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.images.len();
        self.images.retain(|p| p != path);
        self.images.len() != before
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Path> {
        self.images
            .iter()
            .find(|p| p.file_name().and_then(|n| n.to_str()) == Some(name))
            .map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extensions() {
        assert!(is_image_file(Path::new("a.JPG")));
        assert!(is_image_file(Path::new("dir/b.jpeg")));
        assert!(is_image_file(Path::new("c.png")));
        assert!(!is_image_file(Path::new("d.gif")));
        assert!(!is_image_file(Path::new("png")));
    }

    #[test]
    fn test_scan_dir_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.jpg", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.png")).unwrap();
        let lib = ImageLibrary::scan_dir(dir.path()).unwrap();
        let names: Vec<_> = lib
            .images()
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a.jpg", "b.png"]);
    }

    #[test]
    fn test_insert_dedupes() {
        let mut lib = ImageLibrary::new();
        assert!(lib.insert(PathBuf::from("x/a.png")));
        assert!(!lib.insert(PathBuf::from("x/a.png")));
        assert!(!lib.insert(PathBuf::from("x/a.txt")));
        assert_eq!(lib.find_by_name("a.png"), Some(Path::new("x/a.png")));
        assert!(lib.remove(Path::new("x/a.png")));
        assert!(lib.is_empty());
    }
}
