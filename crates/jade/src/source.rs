//! Template file access.
//!
//! The parser never touches the file system directly; everything goes through
//! a [`FileSource`], so templates can be served from disk, from memory or from
//! anything else that can hand back UTF-8 text.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

pub trait FileSource: fmt::Debug {
    /// Reads the template stored under `path` (separator-joined).
    fn read(&self, path: &str, separator: char) -> io::Result<String>;

    /// Lists the files below `dir` as paths relative to `dir`, joined with
    /// `separator`, in sorted order.
    fn list(&self, dir: &str, separator: char, recursive: bool) -> io::Result<Vec<String>>;
}

/// Files on disk, resolved against a root directory.
#[derive(Debug, Clone)]
pub struct DiskSource {
    root: PathBuf,
}

impl DiskSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str, separator: char) -> PathBuf {
        let mut resolved = if path.starts_with(separator) {
            PathBuf::from(std::path::MAIN_SEPARATOR_STR)
        } else {
            self.root.clone()
        };
        for segment in path.split(separator).filter(|s| !s.is_empty() && *s != ".") {
            resolved.push(segment);
        }
        resolved
    }
}

impl Default for DiskSource {
    fn default() -> Self {
        Self::new(".")
    }
}

impl FileSource for DiskSource {
    fn read(&self, path: &str, separator: char) -> io::Result<String> {
        std::fs::read_to_string(self.resolve(path, separator))
    }

    fn list(&self, dir: &str, separator: char, recursive: bool) -> io::Result<Vec<String>> {
        let base = self.resolve(dir, separator);
        if !base.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", base.display()),
            ));
        }
        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();
        for entry in WalkDir::new(&base).min_depth(1).max_depth(max_depth) {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(relative) = relative_name(&base, entry.path(), separator) {
                files.push(relative);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn relative_name(base: &Path, path: &Path, separator: char) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(segments.join(&separator.to_string()))
}

/// Templates held in memory, keyed by their separator-joined path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: &str, contents: &str) {
        self.files.insert(path.to_string(), contents.to_string());
    }
}

impl FileSource for MemorySource {
    fn read(&self, path: &str, separator: char) -> io::Result<String> {
        let key = crate::path::clean(separator, path);
        self.files
            .get(&key)
            .or_else(|| self.files.get(path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no template at {path}")))
    }

    fn list(&self, dir: &str, separator: char, recursive: bool) -> io::Result<Vec<String>> {
        let dir = crate::path::clean(separator, dir);
        let prefix = if dir == "." {
            String::new()
        } else {
            format!("{dir}{separator}")
        };
        let files: Vec<String> = self
            .files
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|relative| recursive || !relative.contains(separator))
            .map(str::to_string)
            .collect();
        if files.is_empty() && !prefix.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no templates under {dir}"),
            ));
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_reads_cleaned_paths() {
        let source = MemorySource::new().with_file("views/a.jade", "p");
        assert_eq!(source.read("views/./a.jade", '/').expect("read"), "p");
        assert_eq!(
            source.read("views/b.jade", '/').expect_err("missing").kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn memory_source_lists_relative_names() {
        let source = MemorySource::new()
            .with_file("views/a.jade", "")
            .with_file("views/sub/b.jade", "")
            .with_file("other/c.jade", "");
        assert_eq!(
            source.list("views", '/', true).expect("list"),
            vec!["a.jade".to_string(), "sub/b.jade".to_string()]
        );
        assert_eq!(
            source.list("views", '/', false).expect("list"),
            vec!["a.jade".to_string()]
        );
    }

    #[test]
    fn disk_source_walks_directories() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(tmp.path().join("sub")).expect("mkdir");
        std::fs::write(tmp.path().join("index.jade"), "p").expect("write");
        std::fs::write(tmp.path().join("sub").join("nested.jade"), "p").expect("write");

        let source = DiskSource::new(tmp.path());
        assert_eq!(
            source.list(".", '/', true).expect("list"),
            vec!["index.jade".to_string(), "sub/nested.jade".to_string()]
        );
        assert_eq!(
            source.list(".", '/', false).expect("list"),
            vec!["index.jade".to_string()]
        );
        assert_eq!(source.read("sub/nested.jade", '/').expect("read"), "p");
    }
}
