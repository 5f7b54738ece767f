//! Host-backed volumes and engine-managed caches.

use serde::{Deserialize, Serialize};

/// A bind mount whose origin exists in the codebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    name: String,
    origin: String,
    target: String,
    is_dir: bool,
}

impl Volume {
    /// Creates a volume from a project-relative origin.
    ///
    /// The volume is named after the origin's base name; the codebase root
    /// itself (`.`) is named `current-directory`.
    pub fn new(origin: impl Into<String>, target: impl Into<String>, is_dir: bool) -> Self {
        let origin = origin.into();
        Self {
            name: base_name(&origin),
            origin,
            target: target.into(),
            is_dir,
        }
    }

    /// Renames the volume after its whole origin path, `./a/config`
    /// becoming `a-config`.
    #[must_use]
    pub fn with_path_name(mut self) -> Self {
        let path = self.origin.trim_start_matches("./").trim_matches('/');
        if !path.is_empty() && path != "." {
            self.name = path.replace('/', "-");
        }
        self
    }

    /// Returns the argument name the volume is read from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the origin path on the host.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns the mount path inside the container.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns whether the origin is a directory (otherwise a file).
    pub const fn is_dir(&self) -> bool {
        self.is_dir
    }
}

/// Returns the last component of `path`, or `current-directory` for the
/// codebase root.
pub(crate) fn base_name(path: &str) -> String {
    let base = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    if base.is_empty() || base == "." {
        "current-directory".to_string()
    } else {
        base.to_string()
    }
}

/// A persistent mount managed by the engine, without host source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {
    name: String,
    path: String,
}

impl Cache {
    /// Creates a cache volume.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Returns the cache volume name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the mount path inside the container.
    pub fn path(&self) -> &str {
        &self.path
    }
}
