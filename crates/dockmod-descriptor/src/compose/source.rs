//! Where a service's container comes from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Source of a service container: a published image or a local build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Source {
    /// Pull an image by reference.
    Image {
        /// Image reference.
        reference: String,
    },
    /// Build from a Dockerfile.
    Dockerfile {
        /// Project-relative build context.
        context: String,
        /// Dockerfile path relative to the context.
        dockerfile: String,
        /// Build arguments; `None` means declared without value.
        build_args: BTreeMap<String, Option<String>>,
        /// Target stage.
        target: Option<String>,
    },
}

impl Source {
    /// Returns the image reference for image-based sources.
    pub fn image(&self) -> Option<&str> {
        match self {
            Self::Image { reference } => Some(reference),
            Self::Dockerfile { .. } => None,
        }
    }
}
