//! File lookup inside the user's codebase directory.

use std::path::{Path, PathBuf};

use dockmod_common::error::{DockmodError, Result};

/// Locates descriptor files and mount origins under a root directory.
#[derive(Debug, Clone)]
pub struct Finder {
    root: PathBuf,
    entries: Vec<String>,
}

impl Finder {
    /// Reads the entries of `root`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be listed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let dir = std::fs::read_dir(&root).map_err(|source| DockmodError::Io {
            path: root.clone(),
            source,
        })?;

        let mut entries: Vec<String> = dir
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();

        Ok(Self { root, entries })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the first entry matching any of `patterns`.
    ///
    /// Patterns are either literal names or `*<suffix>` globs. Patterns are
    /// tried in order so earlier ones take precedence.
    pub fn find_file_from_pattern(&self, patterns: &[&str]) -> Option<PathBuf> {
        patterns.iter().find_map(|pattern| {
            self.entries
                .iter()
                .find(|name| matches_pattern(pattern, name))
                .map(|name| self.root.join(name))
        })
    }

    /// Returns whether a project-relative path is a directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the path does not exist or cannot be read.
    pub fn is_path_directory(&self, path: &str) -> Result<bool> {
        let full = self.root.join(path);
        let meta = std::fs::metadata(&full).map_err(|source| DockmodError::Io {
            path: full.clone(),
            source,
        })?;
        Ok(meta.is_dir())
    }
}

fn matches_pattern(pattern: &str, name: &str) -> bool {
    pattern.strip_prefix('*').map_or_else(
        || pattern == name,
        |suffix| name.len() > suffix.len() && name.ends_with(suffix),
    )
}
